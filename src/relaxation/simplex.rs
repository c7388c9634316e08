//! Dense two-phase tableau simplex
//!
//! Solves `max c·x  s.t.  A x ≤ b,  0 ≤ x ≤ u`. Finite upper bounds become
//! explicit rows. Rows with a negative right-hand side get an artificial
//! variable and are made feasible in a first phase that minimizes the sum of
//! artificials; the second phase then optimizes the real objective from the
//! feasible basis.
//!
//! Pricing is Dantzig's most-negative reduced cost. After a run of degenerate
//! pivots the solver switches to Bland's rule until the objective moves again,
//! which rules out cycling on the highly degenerate reconciliation rows.

/// One `Σ a_j x_j ≤ rhs` row
#[derive(Debug, Clone, PartialEq)]
pub struct LpRow {
    pub terms: Vec<(usize, f64)>,
    pub rhs: f64,
    /// Caller-side identifier used in error reports
    pub origin: Option<usize>,
}

/// A linear program in `max c·x, A x ≤ b, 0 ≤ x ≤ u` form
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinearProgram {
    pub objective: Vec<f64>,
    pub upper_bounds: Vec<f64>,
    pub rows: Vec<LpRow>,
}

impl LinearProgram {
    /// Create a program over `objective.len()` columns without rows or
    /// upper bounds
    pub fn new(objective: Vec<f64>) -> Self {
        let upper_bounds = vec![f64::INFINITY; objective.len()];
        Self {
            objective,
            upper_bounds,
            rows: Vec::new(),
        }
    }

    pub fn num_columns(&self) -> usize {
        self.objective.len()
    }

    pub fn add_row(&mut self, terms: Vec<(usize, f64)>, rhs: f64, origin: Option<usize>) {
        self.rows.push(LpRow { terms, rhs, origin });
    }

    pub fn set_upper_bound(&mut self, column: usize, upper: f64) {
        self.upper_bounds[column] = upper;
    }
}

/// Numerical settings of the simplex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplexOptions {
    /// Smallest magnitude accepted as a pivot or a non-zero reduced cost
    pub tolerance: f64,
    /// Largest phase one objective still accepted as feasible
    pub feasibility_tolerance: f64,
    pub max_iterations: usize,
    /// Consecutive degenerate pivots before switching to Bland's rule
    pub bland_after: usize,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            feasibility_tolerance: 1e-7,
            max_iterations: 50_000,
            bland_after: 50,
        }
    }
}

/// Optimal primal solution
#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    pub objective: f64,
    pub values: Vec<f64>,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LpStatus {
    Optimal(LpSolution),
    Infeasible { iterations: usize },
}

/// Failures of the simplex itself
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LpError {
    #[error("simplex iteration limit of {limit} reached")]
    IterationLimit { limit: usize },
    #[error("objective is unbounded along column {column}")]
    Unbounded { column: usize },
    #[error("non-finite value after pivoting on row {row:?}, column {column}")]
    NumericalFailure { row: Option<usize>, column: usize },
}

impl LpError {
    /// Whether the failure breaks an invariant of the whole program rather
    /// than a single solve
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LpError::IterationLimit { .. })
    }
}

/// Solve `lp` to optimality
pub fn solve(lp: &LinearProgram, options: &SimplexOptions) -> Result<LpStatus, LpError> {
    let mut tableau = Tableau::from_program(lp);

    if tableau.num_artificials > 0 {
        tableau.load_phase_one_objective();
        tableau.run(options, tableau.width)?;

        let infeasibility = -tableau.objective_rhs();
        if infeasibility > options.feasibility_tolerance {
            return Ok(LpStatus::Infeasible {
                iterations: tableau.iterations,
            });
        }

        tableau.drive_out_artificials(options)?;
    }

    tableau.load_phase_two_objective(&lp.objective);
    tableau.run(options, tableau.structural_and_slack())?;

    let values = tableau.primal_values(&lp.upper_bounds);
    let objective = values
        .iter()
        .zip(lp.objective.iter())
        .map(|(x, c)| x * c)
        .sum();

    Ok(LpStatus::Optimal(LpSolution {
        objective,
        values,
        iterations: tableau.iterations,
    }))
}

struct Tableau {
    /// Row-major `(rows + 1) × (width + 1)`; the last row is the objective,
    /// the last column the right-hand side
    cells: Vec<f64>,
    rows: usize,
    width: usize,
    num_structural: usize,
    num_artificials: usize,
    basis: Vec<usize>,
    origins: Vec<Option<usize>>,
    iterations: usize,
}

impl Tableau {
    fn from_program(lp: &LinearProgram) -> Self {
        let n = lp.num_columns();

        let mut rows: Vec<(Vec<(usize, f64)>, f64, Option<usize>)> = lp
            .rows
            .iter()
            .map(|row| (row.terms.clone(), row.rhs, row.origin))
            .collect();
        for (column, &upper) in lp.upper_bounds.iter().enumerate() {
            if upper.is_finite() {
                rows.push((vec![(column, 1.0)], upper, None));
            }
        }

        let m = rows.len();
        let num_artificials = rows.iter().filter(|(_, rhs, _)| *rhs < 0.0).count();
        let width = n + m + num_artificials;
        let stride = width + 1;

        let mut cells = vec![0.0; (m + 1) * stride];
        let mut basis = Vec::with_capacity(m);
        let mut origins = Vec::with_capacity(m);
        let mut next_artificial = n + m;

        for (i, (terms, rhs, origin)) in rows.into_iter().enumerate() {
            let row = &mut cells[i * stride..(i + 1) * stride];
            let sign = if rhs < 0.0 { -1.0 } else { 1.0 };

            for (column, coefficient) in terms {
                row[column] += sign * coefficient;
            }
            row[n + i] = sign;
            row[width] = sign * rhs;

            if sign < 0.0 {
                row[next_artificial] = 1.0;
                basis.push(next_artificial);
                next_artificial += 1;
            } else {
                basis.push(n + i);
            }
            origins.push(origin);
        }

        Self {
            cells,
            rows: m,
            width,
            num_structural: n,
            num_artificials,
            basis,
            origins,
            iterations: 0,
        }
    }

    #[inline]
    fn stride(&self) -> usize {
        self.width + 1
    }

    #[inline]
    fn at(&self, row: usize, column: usize) -> f64 {
        self.cells[row * self.stride() + column]
    }

    #[inline]
    fn rhs(&self, row: usize) -> f64 {
        self.at(row, self.width)
    }

    #[inline]
    fn reduced_cost(&self, column: usize) -> f64 {
        self.at(self.rows, column)
    }

    #[inline]
    fn objective_rhs(&self) -> f64 {
        self.rhs(self.rows)
    }

    fn structural_and_slack(&self) -> usize {
        self.num_structural + self.rows
    }

    fn is_artificial(&self, column: usize) -> bool {
        column >= self.structural_and_slack()
    }

    /// Minimize the sum of artificials, priced out against the start basis
    fn load_phase_one_objective(&mut self) {
        let stride = self.stride();
        let objective = self.rows * stride;
        self.cells[objective..objective + stride].fill(0.0);

        for column in self.structural_and_slack()..self.width {
            self.cells[objective + column] = 1.0;
        }
        for i in 0..self.rows {
            if self.is_artificial(self.basis[i]) {
                for column in 0..stride {
                    self.cells[objective + column] -= self.cells[i * stride + column];
                }
            }
        }
    }

    /// Minimize `-c·x`, priced out against the current basis
    fn load_phase_two_objective(&mut self, objective_coefficients: &[f64]) {
        let stride = self.stride();
        let objective = self.rows * stride;
        self.cells[objective..objective + stride].fill(0.0);

        for (column, &c) in objective_coefficients.iter().enumerate() {
            self.cells[objective + column] = -c;
        }
        for i in 0..self.rows {
            let coefficient = self.cells[objective + self.basis[i]];
            if coefficient != 0.0 {
                for column in 0..stride {
                    self.cells[objective + column] -= coefficient * self.cells[i * stride + column];
                }
            }
        }
    }

    /// Pivot zero-valued artificials out of the basis after phase one.
    ///
    /// Rows where no real column has a usable entry are redundant; their
    /// artificial stays basic at zero and never re-enters since artificial
    /// columns are excluded from pricing in phase two.
    fn drive_out_artificials(&mut self, options: &SimplexOptions) -> Result<(), LpError> {
        for i in 0..self.rows {
            if !self.is_artificial(self.basis[i]) {
                continue;
            }

            let replacement = (0..self.structural_and_slack())
                .find(|&column| self.at(i, column).abs() > options.tolerance);
            if let Some(column) = replacement {
                self.pivot(i, column)?;
            }
        }
        Ok(())
    }

    /// Run simplex iterations over columns `0..eligible` until optimal
    fn run(&mut self, options: &SimplexOptions, eligible: usize) -> Result<(), LpError> {
        let mut degenerate_run = 0usize;

        loop {
            let bland = degenerate_run >= options.bland_after;

            let Some(column) = self.entering_column(options, eligible, bland) else {
                return Ok(());
            };

            let Some((row, ratio)) = self.leaving_row(options, column, bland) else {
                return Err(LpError::Unbounded { column });
            };

            if self.iterations >= options.max_iterations {
                return Err(LpError::IterationLimit {
                    limit: options.max_iterations,
                });
            }

            if ratio <= options.tolerance {
                degenerate_run += 1;
            } else {
                degenerate_run = 0;
            }

            self.pivot(row, column)?;
            self.iterations += 1;
        }
    }

    fn entering_column(&self, options: &SimplexOptions, eligible: usize, bland: bool) -> Option<usize> {
        if bland {
            return (0..eligible).find(|&column| self.reduced_cost(column) < -options.tolerance);
        }

        let mut best = None;
        let mut most_negative = -options.tolerance;
        for column in 0..eligible {
            let cost = self.reduced_cost(column);
            if cost < most_negative {
                most_negative = cost;
                best = Some(column);
            }
        }
        best
    }

    /// Minimum ratio test; ties go to the larger pivot, or to the lowest
    /// basic index under Bland's rule
    fn leaving_row(&self, options: &SimplexOptions, column: usize, bland: bool) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;

        for i in 0..self.rows {
            let entry = self.at(i, column);
            if entry <= options.tolerance {
                continue;
            }
            let ratio = self.rhs(i).max(0.0) / entry;

            best = match best {
                None => Some((i, ratio)),
                Some((current, current_ratio)) => {
                    if ratio < current_ratio - options.tolerance {
                        Some((i, ratio))
                    } else if ratio <= current_ratio + options.tolerance {
                        let better_tie = if bland {
                            self.basis[i] < self.basis[current]
                        } else {
                            entry > self.at(current, column)
                        };
                        if better_tie {
                            Some((i, ratio))
                        } else {
                            Some((current, current_ratio))
                        }
                    } else {
                        Some((current, current_ratio))
                    }
                }
            };
        }

        best
    }

    fn pivot(&mut self, row: usize, column: usize) -> Result<(), LpError> {
        let stride = self.stride();
        let pivot = self.at(row, column);
        if !pivot.is_finite() || pivot == 0.0 {
            return Err(LpError::NumericalFailure {
                row: self.origins[row],
                column,
            });
        }

        let pivot_start = row * stride;
        for value in &mut self.cells[pivot_start..pivot_start + stride] {
            *value /= pivot;
        }
        // Exact unit entry keeps drift out of the basis column
        self.cells[pivot_start + column] = 1.0;

        let pivot_row = self.cells[pivot_start..pivot_start + stride].to_vec();
        for i in 0..=self.rows {
            if i == row {
                continue;
            }
            let start = i * stride;
            let factor = self.cells[start + column];
            if factor == 0.0 {
                continue;
            }
            for (cell, &p) in self.cells[start..start + stride].iter_mut().zip(&pivot_row) {
                *cell -= factor * p;
            }
            self.cells[start + column] = 0.0;

            let rhs = &mut self.cells[start + self.width];
            if !rhs.is_finite() {
                return Err(LpError::NumericalFailure {
                    row: self.origins.get(i).copied().flatten(),
                    column,
                });
            }
            // Clear round-off below zero on constraint rows
            if i < self.rows && *rhs < 0.0 && *rhs > -1e-12 {
                *rhs = 0.0;
            }
        }

        self.basis[row] = column;
        Ok(())
    }

    fn primal_values(&self, upper_bounds: &[f64]) -> Vec<f64> {
        let mut values = vec![0.0; self.num_structural];
        for (i, &basic) in self.basis.iter().enumerate() {
            if basic < self.num_structural {
                values[basic] = self.rhs(i);
            }
        }
        for (value, &upper) in values.iter_mut().zip(upper_bounds) {
            *value = value.clamp(0.0, upper);
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-7,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn optimal(status: LpStatus) -> LpSolution {
        match status {
            LpStatus::Optimal(solution) => solution,
            other => panic!("expected optimal solution, got {:?}", other),
        }
    }

    #[test]
    fn test_textbook_maximization() {
        // max 3x + 5y  s.t.  x ≤ 4, 2y ≤ 12, 3x + 2y ≤ 18
        let mut lp = LinearProgram::new(vec![3.0, 5.0]);
        lp.add_row(vec![(0, 1.0)], 4.0, Some(0));
        lp.add_row(vec![(1, 2.0)], 12.0, Some(1));
        lp.add_row(vec![(0, 3.0), (1, 2.0)], 18.0, Some(2));

        let solution = optimal(solve(&lp, &SimplexOptions::default()).unwrap());
        assert_close(solution.objective, 36.0);
        assert_close(solution.values[0], 2.0);
        assert_close(solution.values[1], 6.0);
    }

    #[test]
    fn test_upper_bounds_are_respected() {
        let mut lp = LinearProgram::new(vec![1.0, 1.0]);
        lp.set_upper_bound(0, 1.0);
        lp.set_upper_bound(1, 1.0);
        lp.add_row(vec![(0, 100.0), (1, 60.0)], 130.0, None);

        let solution = optimal(solve(&lp, &SimplexOptions::default()).unwrap());
        // x1 = 1 and x0 = 0.7 use the whole row; x0 = 1, x1 = 0.5 is worse
        assert_close(solution.objective, 1.7);
        assert_close(solution.values[0], 0.7);
        assert_close(solution.values[1], 1.0);
    }

    #[test]
    fn test_negative_rhs_goes_through_phase_one() {
        // max x  s.t.  -x ≤ -2 (x ≥ 2), x ≤ 5
        let mut lp = LinearProgram::new(vec![1.0]);
        lp.add_row(vec![(0, -1.0)], -2.0, Some(0));
        lp.set_upper_bound(0, 5.0);

        let solution = optimal(solve(&lp, &SimplexOptions::default()).unwrap());
        assert_close(solution.objective, 5.0);

        // min x  (max -x) with the same rows lands on the lower side
        let mut lp = LinearProgram::new(vec![-1.0]);
        lp.add_row(vec![(0, -1.0)], -2.0, Some(0));
        lp.set_upper_bound(0, 5.0);

        let solution = optimal(solve(&lp, &SimplexOptions::default()).unwrap());
        assert_close(solution.values[0], 2.0);
    }

    #[test]
    fn test_infeasible_program() {
        // x ≥ 3 and x ≤ 1
        let mut lp = LinearProgram::new(vec![1.0]);
        lp.add_row(vec![(0, -1.0)], -3.0, Some(0));
        lp.add_row(vec![(0, 1.0)], 1.0, Some(1));

        assert!(matches!(
            solve(&lp, &SimplexOptions::default()).unwrap(),
            LpStatus::Infeasible { .. }
        ));
    }

    #[test]
    fn test_unbounded_program() {
        let lp = LinearProgram::new(vec![1.0]);
        let err = solve(&lp, &SimplexOptions::default()).unwrap_err();
        assert_eq!(err, LpError::Unbounded { column: 0 });
        assert!(err.is_fatal());
    }

    #[test]
    fn test_iteration_limit() {
        let mut lp = LinearProgram::new(vec![3.0, 5.0]);
        lp.add_row(vec![(0, 1.0)], 4.0, None);
        lp.add_row(vec![(1, 2.0)], 12.0, None);
        lp.add_row(vec![(0, 3.0), (1, 2.0)], 18.0, None);

        let options = SimplexOptions {
            max_iterations: 1,
            ..SimplexOptions::default()
        };
        let err = solve(&lp, &options).unwrap_err();
        assert_eq!(err, LpError::IterationLimit { limit: 1 });
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_degenerate_rows_terminate() {
        // Many zero right-hand sides sharing columns, the shape of date rows.
        // Summing the first n rows forces every variable to zero.
        let n = 6;
        let mut lp = LinearProgram::new(vec![1.0; n]);
        for column in 0..n {
            lp.set_upper_bound(column, 1.0);
        }
        for i in 0..n {
            let terms = (0..n)
                .map(|j| (j, if i == j { 1.0 } else { -1.0 / n as f64 }))
                .collect();
            lp.add_row(terms, 0.0, Some(i));
        }
        lp.add_row((0..n).map(|j| (j, 1.0)).collect(), 3.0, Some(n));

        let options = SimplexOptions {
            bland_after: 2,
            ..SimplexOptions::default()
        };
        let solution = optimal(solve(&lp, &options).unwrap());
        assert_close(solution.objective, 0.0);
    }

    #[test]
    fn test_empty_program() {
        let lp = LinearProgram::new(Vec::new());
        let solution = optimal(solve(&lp, &SimplexOptions::default()).unwrap());
        assert_eq!(solution.objective, 0.0);
        assert!(solution.values.is_empty());
    }
}
