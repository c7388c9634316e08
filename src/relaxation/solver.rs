//! Continuous relaxation of a reconciliation subproblem

use crate::config::SolverConfig;
use crate::model::{BoundOverlay, ProblemModel};
use crate::relaxation::simplex::{self, LinearProgram, LpError, LpStatus, SimplexOptions};

/// Relaxed optimum of one subproblem
#[derive(Debug, Clone, PartialEq)]
pub struct RelaxedSolution {
    /// Upper bound on any integral completion of the subproblem
    pub bound: f64,
    /// Value of every model variable, fixed ones included
    pub values: Vec<f64>,
    /// Simplex pivots spent
    pub iterations: usize,
}

impl RelaxedSolution {
    /// Whether every value lies within `tolerance` of 0 or 1
    pub fn is_integral(&self, tolerance: f64) -> bool {
        self.values
            .iter()
            .all(|&value| is_near_integral(value, tolerance))
    }

    /// The free variable whose value is closest to 0.5.
    ///
    /// Ties go to the lowest variable index. Returns `None` when every free
    /// variable is integral within `tolerance`.
    pub fn most_fractional(&self, overlay: &BoundOverlay, tolerance: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (variable, &value) in self.values.iter().enumerate() {
            if !overlay.is_free(variable) || is_near_integral(value, tolerance) {
                continue;
            }
            let distance = (value - 0.5).abs();
            if best.is_none_or(|(_, best_distance)| distance < best_distance) {
                best = Some((variable, distance));
            }
        }
        best.map(|(variable, _)| variable)
    }

    /// Variables that round to one, in ascending order
    pub fn selected(&self) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, &value)| value >= 0.5)
            .map(|(variable, _)| variable)
            .collect()
    }

    /// Best objective any integral completion can reach.
    ///
    /// The objective counts matched pairs, so the relaxed bound can be floored.
    pub fn integral_bound(&self, tolerance: f64) -> usize {
        (self.bound + tolerance).floor().max(0.0) as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Relaxation {
    Optimal(RelaxedSolution),
    /// No point satisfies the subproblem; `constraint` names the model row
    /// that presolve found empty and violated, when known
    Infeasible { constraint: Option<usize> },
}

/// Solves LP relaxations of model subproblems.
///
/// Fixed variables are substituted into the right-hand sides, rows that can
/// never bind are dropped, and the remaining rows are scaled by their largest
/// coefficient before being handed to the simplex.
#[derive(Debug, Clone)]
pub struct RelaxationSolver {
    options: SimplexOptions,
}

impl Default for RelaxationSolver {
    fn default() -> Self {
        Self::new(SimplexOptions::default())
    }
}

impl RelaxationSolver {
    pub fn new(options: SimplexOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &SolverConfig) -> Self {
        Self::new(SimplexOptions {
            max_iterations: config.max_simplex_iterations,
            ..SimplexOptions::default()
        })
    }

    pub fn options(&self) -> &SimplexOptions {
        &self.options
    }

    /// Solve the relaxation of `model` restricted by `overlay`
    pub fn solve(
        &self,
        model: &ProblemModel,
        overlay: &BoundOverlay,
    ) -> Result<Relaxation, LpError> {
        debug_assert_eq!(overlay.len(), model.num_variables());

        let mut column_of = vec![None; model.num_variables()];
        let mut free = Vec::new();
        for (variable, bound) in overlay.iter() {
            if !bound.is_fixed() {
                column_of[variable] = Some(free.len());
                free.push(variable);
            }
        }

        let mut lp = LinearProgram::new(
            free.iter()
                .map(|&variable| model.objective_coefficient(variable))
                .collect(),
        );
        let mut implied_upper = vec![f64::INFINITY; free.len()];

        for (index, constraint) in model.constraints().enumerate() {
            let mut residual = constraint.rhs;
            let mut terms = Vec::with_capacity(constraint.terms.len());
            for &(variable, coefficient) in &constraint.terms {
                match column_of[variable] {
                    Some(column) if coefficient != 0.0 => terms.push((column, coefficient)),
                    Some(_) => {}
                    None => residual -= coefficient * overlay.get(variable).lower(),
                }
            }

            let slack = self.options.feasibility_tolerance * constraint.rhs.abs().max(1.0);
            if residual < 0.0 && residual > -slack {
                residual = 0.0;
            }

            if terms.is_empty() {
                if residual < 0.0 {
                    return Ok(Relaxation::Infeasible {
                        constraint: Some(index),
                    });
                }
                continue;
            }

            // x ≥ 0 keeps a row of non-positive terms below a non-negative rhs
            if residual >= 0.0 && terms.iter().all(|&(_, coefficient)| coefficient <= 0.0) {
                continue;
            }

            let scale = terms
                .iter()
                .map(|&(_, coefficient)| coefficient.abs())
                .fold(0.0, f64::max);

            if residual >= 0.0 && terms.iter().all(|&(_, coefficient)| coefficient > 0.0) {
                for &(column, coefficient) in &terms {
                    implied_upper[column] = implied_upper[column].min(residual / coefficient);
                }
            }

            lp.add_row(
                terms
                    .into_iter()
                    .map(|(column, coefficient)| (column, coefficient / scale))
                    .collect(),
                residual / scale,
                Some(index),
            );
        }

        // The at-most-one rows usually imply x ≤ 1 already
        for (column, &implied) in implied_upper.iter().enumerate() {
            if implied > 1.0 + self.options.tolerance {
                lp.set_upper_bound(column, 1.0);
            }
        }

        // Report model variables rather than compacted LP columns
        let variable_of = |column: usize| free.get(column).copied().unwrap_or(column);
        let status = simplex::solve(&lp, &self.options).map_err(|err| match err {
            LpError::Unbounded { column } => LpError::Unbounded {
                column: variable_of(column),
            },
            LpError::NumericalFailure { row, column } => LpError::NumericalFailure {
                row,
                column: variable_of(column),
            },
            other => other,
        })?;

        let solution = match status {
            LpStatus::Optimal(solution) => solution,
            LpStatus::Infeasible { .. } => return Ok(Relaxation::Infeasible { constraint: None }),
        };

        let mut values: Vec<f64> = overlay.iter().map(|(_, bound)| bound.lower()).collect();
        for (column, &variable) in free.iter().enumerate() {
            values[variable] = solution.values[column];
        }

        let fixed_objective: f64 = overlay
            .fixed_ones()
            .map(|variable| model.objective_coefficient(variable))
            .sum();

        Ok(Relaxation::Optimal(RelaxedSolution {
            bound: fixed_objective + solution.objective,
            values,
            iterations: solution.iterations,
        }))
    }
}

fn is_near_integral(value: f64, tolerance: f64) -> bool {
    value.abs() <= tolerance || (value - 1.0).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VariableBound;
    use crate::types::{BankEntry, LedgerEntry};
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    const EPS: f64 = 1e-6;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn model(ledger: &[(i64, u32)], bank: &[(i64, u32)]) -> ProblemModel {
        let ledger: Vec<LedgerEntry> = ledger
            .iter()
            .enumerate()
            .map(|(i, &(amount, d))| {
                LedgerEntry::new(format!("L{}", i + 1), BigDecimal::from(amount), day(d))
            })
            .collect();
        let bank: Vec<BankEntry> = bank
            .iter()
            .enumerate()
            .map(|(i, &(amount, d))| {
                BankEntry::new(format!("B{}", i + 1), BigDecimal::from(amount), day(d))
            })
            .collect();
        ProblemModel::build(&ledger, &bank).unwrap()
    }

    fn optimal(relaxation: Relaxation) -> RelaxedSolution {
        match relaxation {
            Relaxation::Optimal(solution) => solution,
            other => panic!("expected optimal relaxation, got {:?}", other),
        }
    }

    #[test]
    fn test_root_relaxation_of_an_exact_fit_is_integral() {
        let model = model(&[(100, 1), (50, 2)], &[(150, 3)]);
        let solver = RelaxationSolver::default();

        let solution = optimal(solver.solve(&model, &BoundOverlay::new(2)).unwrap());
        assert!((solution.bound - 2.0).abs() < EPS);
        assert!(solution.is_integral(EPS));
        assert_eq!(solution.selected(), vec![0, 1]);
        assert_eq!(solution.integral_bound(EPS), 2);
    }

    #[test]
    fn test_date_row_blocks_late_ledger_entries() {
        let model = model(&[(100, 5)], &[(100, 1)]);
        let solution = optimal(
            RelaxationSolver::default()
                .solve(&model, &BoundOverlay::new(1))
                .unwrap(),
        );
        assert!(solution.bound.abs() < EPS);
        assert!(solution.selected().is_empty());
    }

    #[test]
    fn test_capacity_produces_fractional_values() {
        // Three 60s against a single 100: relaxed optimum is 100 / 60
        let model = model(&[(60, 1), (60, 1), (60, 1)], &[(100, 2)]);
        let overlay = BoundOverlay::new(3);
        let solution = optimal(RelaxationSolver::default().solve(&model, &overlay).unwrap());

        assert!((solution.bound - 100.0 / 60.0).abs() < 1e-6);
        assert!(!solution.is_integral(EPS));
        assert_eq!(solution.integral_bound(EPS), 1);
        assert!(solution.most_fractional(&overlay, EPS).is_some());
    }

    #[test]
    fn test_fixed_variables_are_substituted() {
        let model = model(&[(60, 1), (60, 1), (60, 1)], &[(100, 2)]);
        let overlay = BoundOverlay::new(3).with(0, VariableBound::FixedOne);

        let solution = optimal(RelaxationSolver::default().solve(&model, &overlay).unwrap());
        assert_eq!(solution.values[0], 1.0);
        // 40 of capacity left for two more 60s
        assert!((solution.bound - (1.0 + 40.0 / 60.0)).abs() < 1e-6);
    }

    #[test]
    fn test_fixed_variables_beyond_capacity_are_infeasible() {
        let model = model(&[(60, 1), (60, 1)], &[(100, 2)]);
        let overlay = BoundOverlay::new(2)
            .with(0, VariableBound::FixedOne)
            .with(1, VariableBound::FixedOne);

        assert_eq!(
            RelaxationSolver::default().solve(&model, &overlay).unwrap(),
            Relaxation::Infeasible {
                constraint: Some(4)
            }
        );
    }

    #[test]
    fn test_conflicting_fixings_on_one_ledger_entry_are_infeasible() {
        let model = model(&[(10, 1)], &[(100, 2), (100, 3)]);
        let overlay = BoundOverlay::new(2)
            .with(0, VariableBound::FixedOne)
            .with(1, VariableBound::FixedOne);

        assert_eq!(
            RelaxationSolver::default().solve(&model, &overlay).unwrap(),
            Relaxation::Infeasible {
                constraint: Some(0)
            }
        );
    }

    #[test]
    fn test_relaxation_never_undercuts_the_integral_optimum() {
        // Optimum is 3: L1 -> B1, L2 -> B2, L3 -> B2
        let model = model(&[(40, 1), (30, 2), (20, 2)], &[(45, 3), (55, 4)]);
        let solution = optimal(
            RelaxationSolver::default()
                .solve(&model, &BoundOverlay::new(6))
                .unwrap(),
        );
        assert!(solution.bound >= 3.0 - EPS);
        assert!(solution.bound <= 3.0 + EPS);
    }

    #[test]
    fn test_most_fractional_skips_fixed_variables() {
        let solution = RelaxedSolution {
            bound: 1.5,
            values: vec![0.5, 0.4, 0.5, 1.0],
            iterations: 0,
        };
        let overlay = BoundOverlay::new(4).with(0, VariableBound::FixedZero);

        // Variable 2 ties with the fixed variable 0 and wins over 1
        assert_eq!(solution.most_fractional(&overlay, EPS), Some(2));
    }
}
