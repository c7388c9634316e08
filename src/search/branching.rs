//! Branching decisions for a solved subproblem

use crate::model::{BoundOverlay, ProblemModel, VariableBound, Violation};
use crate::relaxation::RelaxedSolution;

/// What to do with a node whose relaxation was solved
#[derive(Debug, Clone, PartialEq)]
pub enum NodeAction {
    /// The relaxation is integral and passes the exact check
    Integral(Vec<usize>),
    /// Split on this free variable
    Branch(usize),
    /// Integral, but the exact check fails on fixed variables only
    Infeasible(Violation),
}

/// Decide how to continue from `solution`.
///
/// The most fractional free variable is branched on first. An integral
/// relaxation is checked exactly against the decimal amounts and calendar
/// dates; when it fails there, the lowest free variable of the violated row
/// is branched on instead.
pub fn classify(
    model: &ProblemModel,
    overlay: &BoundOverlay,
    solution: &RelaxedSolution,
    tolerance: f64,
) -> NodeAction {
    if let Some(variable) = solution.most_fractional(overlay, tolerance) {
        return NodeAction::Branch(variable);
    }

    let selected = solution.selected();
    match model.assignment_violation(&selected) {
        None => NodeAction::Integral(selected),
        Some(violation) => match violation
            .variables
            .iter()
            .copied()
            .find(|&variable| overlay.is_free(variable))
        {
            Some(variable) => NodeAction::Branch(variable),
            None => NodeAction::Infeasible(violation),
        },
    }
}

/// The two children of a branch, the `x = 1` side first
pub fn children(overlay: &BoundOverlay, variable: usize) -> [BoundOverlay; 2] {
    [
        overlay.with(variable, VariableBound::FixedOne),
        overlay.with(variable, VariableBound::FixedZero),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConstraintKind;
    use crate::types::{BankEntry, LedgerEntry};
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn model(ledger: &[&str], bank: &[&str]) -> ProblemModel {
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let ledger: Vec<LedgerEntry> = ledger
            .iter()
            .enumerate()
            .map(|(i, amount)| {
                LedgerEntry::new(format!("L{}", i), BigDecimal::from_str(amount).unwrap(), date)
            })
            .collect();
        let bank: Vec<BankEntry> = bank
            .iter()
            .enumerate()
            .map(|(i, amount)| {
                BankEntry::new(format!("B{}", i), BigDecimal::from_str(amount).unwrap(), date)
            })
            .collect();
        ProblemModel::build(&ledger, &bank).unwrap()
    }

    fn relaxed(values: Vec<f64>) -> RelaxedSolution {
        RelaxedSolution {
            bound: values.iter().sum(),
            values,
            iterations: 0,
        }
    }

    #[test]
    fn test_fractional_values_are_branched_on() {
        let model = model(&["60", "60"], &["100"]);
        let overlay = BoundOverlay::new(2);
        let action = classify(&model, &overlay, &relaxed(vec![1.0, 0.666]), 1e-6);
        assert_eq!(action, NodeAction::Branch(1));
    }

    #[test]
    fn test_integral_solution_is_accepted() {
        let model = model(&["60", "40"], &["100"]);
        let overlay = BoundOverlay::new(2);
        let action = classify(&model, &overlay, &relaxed(vec![1.0, 1.0 - 1e-9]), 1e-6);
        assert_eq!(action, NodeAction::Integral(vec![0, 1]));
    }

    #[test]
    fn test_tolerance_overshoot_branches_on_the_violating_row() {
        // Capacity is exceeded by one cent, well inside an absolute
        // tolerance on the scaled row
        let model = model(&["60.00", "40.01"], &["100.00"]);
        let overlay = BoundOverlay::new(2);
        let action = classify(&model, &overlay, &relaxed(vec![1.0, 1.0]), 1e-6);
        assert_eq!(action, NodeAction::Branch(0));

        let pinned = overlay
            .with(0, VariableBound::FixedOne)
            .with(1, VariableBound::FixedOne);
        match classify(&model, &pinned, &relaxed(vec![1.0, 1.0]), 1e-6) {
            NodeAction::Infeasible(violation) => {
                assert_eq!(violation.kind, ConstraintKind::Capacity { bank: 0 })
            }
            other => panic!("expected infeasible, got {:?}", other),
        }
    }

    #[test]
    fn test_children_fix_the_variable_both_ways() {
        let [one, zero] = children(&BoundOverlay::new(3), 1);
        assert_eq!(one.get(1), VariableBound::FixedOne);
        assert_eq!(zero.get(1), VariableBound::FixedZero);
        assert_eq!(one.num_fixed(), 1);
    }
}
