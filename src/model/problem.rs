//! Reconciliation problem model
//!
//! Holds the validated input entries and derives the decision-variable
//! universe (one binary variable per ledger/bank combination) and the linear
//! constraint set. The model is immutable once built; branching works on
//! [`BoundOverlay`]s instead.
//!
//! Variable layout is ledger-major: the pair `(g, b)` owns variable
//! `g * num_bank + b`. Constraint layout is `2g` for the at-most-one row of
//! ledger `g`, `2g + 1` for its date row, and `2 * num_ledger + b` for the
//! capacity row of bank `b`.

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::NaiveDate;

use crate::model::bounds::{BoundOverlay, VariableBound};
use crate::traits::ReconcilableEntry;
use crate::types::*;
use crate::utils::validation::validate_entries;

/// One ledger/bank combination, addressed by input positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidatePair {
    pub ledger: usize,
    pub bank: usize,
}

/// The family a derived constraint belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// `Σ_b x[g][b] ≤ 1`
    AtMostOne { ledger: usize },
    /// `Σ_b x[g][b]·ledgerDate[g] ≤ Σ_b x[g][b]·bankDate[b]`
    DateOrder { ledger: usize },
    /// `Σ_g x[g][b]·ledgerAmount[g] ≤ bankAmount[b]`
    Capacity { bank: usize },
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintKind::AtMostOne { ledger } => write!(f, "AtMostOne(ledger={})", ledger),
            ConstraintKind::DateOrder { ledger } => write!(f, "DateOrder(ledger={})", ledger),
            ConstraintKind::Capacity { bank } => write!(f, "Capacity(bank={})", bank),
        }
    }
}

/// A `Σ a_j x_j ≤ rhs` row over model variables
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub kind: ConstraintKind,
    pub terms: Vec<(usize, f64)>,
    pub rhs: f64,
}

impl LinearConstraint {
    /// Left-hand side evaluated at `values`
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(variable, coefficient)| coefficient * values[variable])
            .sum()
    }
}

/// An exact constraint violation found in an integral assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub constraint: usize,
    pub kind: ConstraintKind,
    /// Selected variables taking part in the violated row
    pub variables: Vec<usize>,
}

/// Immutable reconciliation problem
#[derive(Debug, Clone)]
pub struct ProblemModel {
    ledger: Vec<LedgerEntry>,
    bank: Vec<BankEntry>,
    ledger_days: Vec<i64>,
    bank_days: Vec<i64>,
    ledger_amounts: Vec<f64>,
    bank_amounts: Vec<f64>,
}

impl ProblemModel {
    /// Build the model from the two input collections.
    ///
    /// Fails on duplicate or empty keys and on negative amounts. Amounts too
    /// large to be represented as a finite `f64` coefficient are rejected
    /// with [`InputError::AmountOutOfRange`]. An empty collection on either
    /// side is accepted and yields a model without variables.
    pub fn build(ledger: &[LedgerEntry], bank: &[BankEntry]) -> ReconcileResult<Self> {
        validate_entries(ledger)?;
        validate_entries(bank)?;

        let ledger_amounts = ledger
            .iter()
            .map(amount_coefficient)
            .collect::<Result<Vec<_>, _>>()?;
        let bank_amounts = bank
            .iter()
            .map(amount_coefficient)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            ledger_days: ledger.iter().map(|e| day_number(e.date)).collect(),
            bank_days: bank.iter().map(|e| day_number(e.date)).collect(),
            ledger: ledger.to_vec(),
            bank: bank.to_vec(),
            ledger_amounts,
            bank_amounts,
        })
    }

    pub fn num_ledger(&self) -> usize {
        self.ledger.len()
    }

    pub fn num_bank(&self) -> usize {
        self.bank.len()
    }

    /// Size of the candidate universe, `|L| × |B|`
    pub fn num_variables(&self) -> usize {
        self.ledger.len() * self.bank.len()
    }

    /// Always `2 × |L| + |B|`
    pub fn num_constraints(&self) -> usize {
        2 * self.ledger.len() + self.bank.len()
    }

    pub fn ledger_entries(&self) -> &[LedgerEntry] {
        &self.ledger
    }

    pub fn bank_entries(&self) -> &[BankEntry] {
        &self.bank
    }

    pub fn ledger_entry(&self, ledger: usize) -> &LedgerEntry {
        &self.ledger[ledger]
    }

    pub fn bank_entry(&self, bank: usize) -> &BankEntry {
        &self.bank[bank]
    }

    /// Variable index of the pair `(ledger, bank)`
    #[inline]
    pub fn variable(&self, ledger: usize, bank: usize) -> usize {
        debug_assert!(ledger < self.num_ledger() && bank < self.num_bank());
        ledger * self.bank.len() + bank
    }

    /// Pair addressed by `variable`
    #[inline]
    pub fn pair(&self, variable: usize) -> CandidatePair {
        debug_assert!(variable < self.num_variables());
        CandidatePair {
            ledger: variable / self.bank.len(),
            bank: variable % self.bank.len(),
        }
    }

    /// All candidate pairs in insertion order
    pub fn pairs(&self) -> impl Iterator<Item = CandidatePair> + '_ {
        (0..self.num_variables()).map(|variable| self.pair(variable))
    }

    /// Objective weight of every variable; the engine maximizes the count
    #[inline]
    pub fn objective_coefficient(&self, _variable: usize) -> f64 {
        1.0
    }

    /// No matching can reconcile more pairs than there are ledger entries
    pub fn objective_upper_bound(&self) -> usize {
        if self.bank.is_empty() {
            0
        } else {
            self.ledger.len()
        }
    }

    /// Derive constraint `index`
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.num_constraints()`.
    pub fn constraint(&self, index: usize) -> LinearConstraint {
        let ledger_rows = 2 * self.ledger.len();
        if index < ledger_rows {
            let g = index / 2;
            if index % 2 == 0 {
                LinearConstraint {
                    kind: ConstraintKind::AtMostOne { ledger: g },
                    terms: (0..self.bank.len())
                        .map(|b| (self.variable(g, b), 1.0))
                        .collect(),
                    rhs: 1.0,
                }
            } else {
                // Σ x·ledgerDate − Σ x·bankDate ≤ 0, collected per variable
                LinearConstraint {
                    kind: ConstraintKind::DateOrder { ledger: g },
                    terms: (0..self.bank.len())
                        .map(|b| {
                            let coefficient = (self.ledger_days[g] - self.bank_days[b]) as f64;
                            (self.variable(g, b), coefficient)
                        })
                        .collect(),
                    rhs: 0.0,
                }
            }
        } else {
            let b = index - ledger_rows;
            assert!(b < self.bank.len(), "constraint index {} out of range", index);
            LinearConstraint {
                kind: ConstraintKind::Capacity { bank: b },
                terms: (0..self.ledger.len())
                    .map(|g| (self.variable(g, b), self.ledger_amounts[g]))
                    .collect(),
                rhs: self.bank_amounts[b],
            }
        }
    }

    /// Every derived constraint, in index order
    pub fn constraints(&self) -> impl Iterator<Item = LinearConstraint> + '_ {
        (0..self.num_constraints()).map(|index| self.constraint(index))
    }

    /// Whether the pair behind `variable` can ever be matched on its own dates
    pub fn is_pair_date_feasible(&self, variable: usize) -> bool {
        let pair = self.pair(variable);
        self.ledger[pair.ledger].date <= self.bank[pair.bank].date
    }

    /// Bounds of the root subproblem.
    ///
    /// With `prune_date_infeasible`, pairs that violate the date order on
    /// their own are fixed to zero. The integral optimum is unchanged because
    /// such a pair can never be selected.
    pub fn root_overlay(&self, prune_date_infeasible: bool) -> BoundOverlay {
        let mut overlay = BoundOverlay::new(self.num_variables());
        if prune_date_infeasible {
            for variable in 0..self.num_variables() {
                if !self.is_pair_date_feasible(variable) {
                    overlay.set(variable, VariableBound::FixedZero);
                }
            }
        }
        overlay
    }

    /// Check an integral assignment exactly.
    ///
    /// `selected` lists the variables set to one. Amounts are compared as
    /// decimals and dates as calendar days, so no floating-point tolerance is
    /// involved. Returns the lowest-indexed violated constraint, if any.
    pub fn assignment_violation(&self, selected: &[usize]) -> Option<Violation> {
        let mut per_ledger: Vec<Vec<usize>> = vec![Vec::new(); self.ledger.len()];
        let mut per_bank: Vec<Vec<usize>> = vec![Vec::new(); self.bank.len()];
        for &variable in selected {
            let pair = self.pair(variable);
            per_ledger[pair.ledger].push(variable);
            per_bank[pair.bank].push(variable);
        }

        for (g, variables) in per_ledger.iter().enumerate() {
            if variables.len() > 1 {
                return Some(Violation {
                    constraint: 2 * g,
                    kind: ConstraintKind::AtMostOne { ledger: g },
                    variables: variables.clone(),
                });
            }

            let lhs: i64 = variables.iter().map(|_| self.ledger_days[g]).sum();
            let rhs: i64 = variables
                .iter()
                .map(|&variable| self.bank_days[self.pair(variable).bank])
                .sum();
            if lhs > rhs {
                return Some(Violation {
                    constraint: 2 * g + 1,
                    kind: ConstraintKind::DateOrder { ledger: g },
                    variables: variables.clone(),
                });
            }
        }

        for (b, variables) in per_bank.iter().enumerate() {
            let matched: BigDecimal = variables
                .iter()
                .map(|&variable| &self.ledger[self.pair(variable).ledger].amount)
                .sum();
            if matched > self.bank[b].amount {
                return Some(Violation {
                    constraint: 2 * self.ledger.len() + b,
                    kind: ConstraintKind::Capacity { bank: b },
                    variables: variables.clone(),
                });
            }
        }

        None
    }
}

fn day_number(date: NaiveDate) -> i64 {
    use chrono::Datelike;
    i64::from(date.num_days_from_ce())
}

fn amount_coefficient<E: ReconcilableEntry>(entry: &E) -> Result<f64, InputError> {
    entry
        .amount()
        .to_f64()
        .filter(|value| value.is_finite())
        .ok_or_else(|| InputError::AmountOutOfRange {
            side: E::SIDE,
            key: entry.key().to_string(),
            amount: entry.amount().clone(),
        })
}
