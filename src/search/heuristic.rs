//! Greedy rounding of relaxed solutions

use bigdecimal::BigDecimal;

use crate::model::{BoundOverlay, ProblemModel};

/// Round a relaxed point into a feasible matching.
///
/// Variables fixed to one are kept. Free variables are then considered by
/// descending relaxed value (lowest index first on ties) and added whenever
/// the ledger entry is still unmatched, its date does not follow the bank
/// date, and the bank entry has enough remaining amount. Capacity is tracked
/// in exact decimals.
///
/// Returns `None` when the fixed variables alone are already infeasible.
pub fn round_greedily(
    model: &ProblemModel,
    overlay: &BoundOverlay,
    values: &[f64],
) -> Option<Vec<usize>> {
    let mut selected: Vec<usize> = overlay.fixed_ones().collect();
    if model.assignment_violation(&selected).is_some() {
        return None;
    }

    let mut ledger_used = vec![false; model.num_ledger()];
    let mut remaining: Vec<BigDecimal> = model
        .bank_entries()
        .iter()
        .map(|entry| entry.amount.clone())
        .collect();
    for &variable in &selected {
        let pair = model.pair(variable);
        ledger_used[pair.ledger] = true;
        remaining[pair.bank] -= &model.ledger_entry(pair.ledger).amount;
    }

    let mut candidates: Vec<usize> = (0..model.num_variables())
        .filter(|&variable| overlay.is_free(variable) && model.is_pair_date_feasible(variable))
        .collect();
    candidates.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));

    for variable in candidates {
        let pair = model.pair(variable);
        if ledger_used[pair.ledger] {
            continue;
        }
        let amount = &model.ledger_entry(pair.ledger).amount;
        if *amount <= remaining[pair.bank] {
            remaining[pair.bank] -= amount;
            ledger_used[pair.ledger] = true;
            selected.push(variable);
        }
    }

    selected.sort_unstable();
    debug_assert!(model.assignment_violation(&selected).is_none());
    Some(selected)
}
