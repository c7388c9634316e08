//! Reconciliation results and their verification

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::model::ProblemModel;
use crate::search::{Incumbent, SearchStatistics, TerminationReason};
use crate::types::*;

/// A ledger entry reconciled against a bank entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedPair {
    pub ledger_key: String,
    pub bank_key: String,
}

/// How much the objective of a [`Matching`] can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchingStatus {
    /// Proven maximum
    Optimal,
    /// Best found before a time, node or cancellation budget ran out
    TimeLimited,
    /// Best found while some relaxations failed
    Degraded,
}

impl std::fmt::Display for MatchingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchingStatus::Optimal => write!(f, "Optimal"),
            MatchingStatus::TimeLimited => write!(f, "TimeLimited"),
            MatchingStatus::Degraded => write!(f, "Degraded"),
        }
    }
}

/// Result of a reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matching {
    /// Matched pairs in ledger input order
    pub pairs: Vec<MatchedPair>,
    pub status: MatchingStatus,
    /// Number of matched pairs
    pub objective: usize,
    pub termination: TerminationReason,
    pub statistics: SearchStatistics,
}

impl Matching {
    /// The empty matching, proven optimal without any search
    pub fn empty() -> Self {
        Self {
            pairs: Vec::new(),
            status: MatchingStatus::Optimal,
            objective: 0,
            termination: TerminationReason::Exhausted,
            statistics: SearchStatistics::default(),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == MatchingStatus::Optimal
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Bank key a ledger entry was matched to
    pub fn bank_key_for(&self, ledger_key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|pair| pair.ledger_key == ledger_key)
            .map(|pair| pair.bank_key.as_str())
    }

    /// Ledger keys matched to one bank entry, in ledger order
    pub fn ledger_keys_for<'a>(&'a self, bank_key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |pair| pair.bank_key == bank_key)
            .map(|pair| pair.ledger_key.as_str())
    }

    /// Ledger entries left without a bank entry
    pub fn unmatched_ledger<'a>(&self, ledger: &'a [LedgerEntry]) -> Vec<&'a LedgerEntry> {
        let matched: HashSet<&str> = self.pairs.iter().map(|p| p.ledger_key.as_str()).collect();
        ledger
            .iter()
            .filter(|entry| !matched.contains(entry.key.as_str()))
            .collect()
    }

    /// Total matched against each bank entry that received anything
    pub fn matched_totals(&self, ledger: &[LedgerEntry]) -> HashMap<String, BigDecimal> {
        let amounts: HashMap<&str, &BigDecimal> = ledger
            .iter()
            .map(|entry| (entry.key.as_str(), &entry.amount))
            .collect();
        let mut totals: HashMap<String, BigDecimal> = HashMap::new();
        for pair in &self.pairs {
            if let Some(amount) = amounts.get(pair.ledger_key.as_str()) {
                *totals
                    .entry(pair.bank_key.clone())
                    .or_insert_with(|| BigDecimal::from(0)) += *amount;
            }
        }
        totals
    }
}

/// Status implied by how the search ended
pub fn status_for(termination: &TerminationReason, relaxation_failures: u64) -> MatchingStatus {
    match termination {
        TerminationReason::Exhausted if relaxation_failures == 0 => MatchingStatus::Optimal,
        reason if reason.is_limit() => MatchingStatus::TimeLimited,
        _ => MatchingStatus::Degraded,
    }
}

/// Project a search result onto entry keys.
///
/// Without an incumbent the empty matching is returned, which satisfies
/// every constraint.
pub fn extract(
    model: &ProblemModel,
    incumbent: Option<&Incumbent>,
    termination: TerminationReason,
    statistics: SearchStatistics,
) -> Matching {
    let pairs: Vec<MatchedPair> = incumbent
        .map(|incumbent| {
            incumbent
                .variables
                .iter()
                .map(|&variable| {
                    let pair = model.pair(variable);
                    MatchedPair {
                        ledger_key: model.ledger_entry(pair.ledger).key.clone(),
                        bank_key: model.bank_entry(pair.bank).key.clone(),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Matching {
        objective: pairs.len(),
        status: status_for(&termination, statistics.relaxation_failures),
        pairs,
        termination,
        statistics,
    }
}

/// Check a matching against the entries it claims to reconcile.
///
/// Every key must exist, each ledger entry may appear once, no ledger date
/// may follow its bank date, and no bank entry may receive more than its
/// amount. Comparisons are exact.
pub fn verify_matching(
    ledger: &[LedgerEntry],
    bank: &[BankEntry],
    matching: &Matching,
) -> ReconcileResult<()> {
    let ledger_by_key: HashMap<&str, &LedgerEntry> =
        ledger.iter().map(|entry| (entry.key.as_str(), entry)).collect();
    let bank_by_key: HashMap<&str, &BankEntry> =
        bank.iter().map(|entry| (entry.key.as_str(), entry)).collect();

    if matching.objective != matching.pairs.len() {
        return Err(ReconcileError::InvariantViolation(format!(
            "objective {} does not match {} pairs",
            matching.objective,
            matching.pairs.len()
        )));
    }

    let mut seen = HashSet::new();
    let mut totals: HashMap<&str, BigDecimal> = HashMap::new();

    for pair in &matching.pairs {
        let ledger_entry = ledger_by_key.get(pair.ledger_key.as_str()).ok_or_else(|| {
            ReconcileError::InvariantViolation(format!("unknown ledger key {}", pair.ledger_key))
        })?;
        let bank_entry = bank_by_key.get(pair.bank_key.as_str()).ok_or_else(|| {
            ReconcileError::InvariantViolation(format!("unknown bank key {}", pair.bank_key))
        })?;

        if !seen.insert(pair.ledger_key.as_str()) {
            return Err(ReconcileError::InvariantViolation(format!(
                "ledger entry {} is matched more than once",
                pair.ledger_key
            )));
        }

        if ledger_entry.date > bank_entry.date {
            return Err(ReconcileError::InvariantViolation(format!(
                "ledger entry {} dated {} is after bank entry {} dated {}",
                ledger_entry.key, ledger_entry.date, bank_entry.key, bank_entry.date
            )));
        }

        *totals
            .entry(bank_entry.key.as_str())
            .or_insert_with(|| BigDecimal::from(0)) += &ledger_entry.amount;
    }

    for (key, total) in totals {
        let capacity = &bank_by_key[key].amount;
        if total > *capacity {
            return Err(ReconcileError::InvariantViolation(format!(
                "bank entry {} receives {} but holds {}",
                key, total, capacity
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn entries() -> (Vec<LedgerEntry>, Vec<BankEntry>) {
        (
            vec![
                LedgerEntry::new("L1".to_string(), BigDecimal::from(100), day(1)),
                LedgerEntry::new("L2".to_string(), BigDecimal::from(50), day(2)),
                LedgerEntry::new("L3".to_string(), BigDecimal::from_str("0.01").unwrap(), day(9)),
            ],
            vec![BankEntry::new("B1".to_string(), BigDecimal::from(150), day(3))],
        )
    }

    fn matching(pairs: &[(&str, &str)]) -> Matching {
        let pairs: Vec<MatchedPair> = pairs
            .iter()
            .map(|(l, b)| MatchedPair {
                ledger_key: l.to_string(),
                bank_key: b.to_string(),
            })
            .collect();
        Matching {
            objective: pairs.len(),
            pairs,
            ..Matching::empty()
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&TerminationReason::Exhausted, 0),
            MatchingStatus::Optimal
        );
        assert_eq!(
            status_for(&TerminationReason::Exhausted, 2),
            MatchingStatus::Degraded
        );
        assert_eq!(
            status_for(&TerminationReason::TimeLimit, 3),
            MatchingStatus::TimeLimited
        );
        assert_eq!(
            status_for(&TerminationReason::NodeLimit, 0),
            MatchingStatus::TimeLimited
        );
        assert_eq!(
            status_for(&TerminationReason::Cancelled, 0),
            MatchingStatus::TimeLimited
        );
        assert_eq!(
            status_for(&TerminationReason::SolverFailure("x".to_string()), 0),
            MatchingStatus::Degraded
        );
    }

    #[test]
    fn test_extract_maps_variables_to_keys() {
        let (ledger, bank) = entries();
        let model = ProblemModel::build(&ledger, &bank).unwrap();
        let incumbent = Incumbent::new(vec![1, 0]);

        let result = extract(
            &model,
            Some(&incumbent),
            TerminationReason::Exhausted,
            SearchStatistics::default(),
        );
        assert_eq!(result.status, MatchingStatus::Optimal);
        assert_eq!(result.objective, 2);
        assert_eq!(result.bank_key_for("L2"), Some("B1"));
        assert_eq!(result.ledger_keys_for("B1").collect::<Vec<_>>(), vec!["L1", "L2"]);
        assert_eq!(result.unmatched_ledger(&ledger).len(), 1);
        assert_eq!(result.matched_totals(&ledger)["B1"], BigDecimal::from(150));
        assert!(verify_matching(&ledger, &bank, &result).is_ok());
    }

    #[test]
    fn test_extract_without_incumbent_is_empty() {
        let (ledger, bank) = entries();
        let model = ProblemModel::build(&ledger, &bank).unwrap();
        let result = extract(
            &model,
            None,
            TerminationReason::TimeLimit,
            SearchStatistics::default(),
        );
        assert!(result.is_empty());
        assert_eq!(result.status, MatchingStatus::TimeLimited);
    }

    #[test]
    fn test_verify_rejects_each_invariant() {
        let (ledger, bank) = entries();

        let twice = matching(&[("L1", "B1"), ("L1", "B1")]);
        assert!(verify_matching(&ledger, &bank, &twice).is_err());

        let late = matching(&[("L3", "B1")]);
        let err = verify_matching(&ledger, &bank, &late).unwrap_err();
        assert!(err.to_string().contains("after bank entry B1"));

        let mut over = ledger.clone();
        over[1].amount = BigDecimal::from_str("50.01").unwrap();
        let both = matching(&[("L1", "B1"), ("L2", "B1")]);
        assert!(verify_matching(&ledger, &bank, &both).is_ok());
        assert!(verify_matching(&over, &bank, &both).is_err());

        let unknown = matching(&[("L9", "B1")]);
        assert!(verify_matching(&ledger, &bank, &unknown).is_err());
    }

    #[test]
    fn test_matching_serializes_in_camel_case() {
        let result = matching(&[("L1", "B1")]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["pairs"][0]["ledgerKey"], "L1");
        assert_eq!(json["status"], "optimal");

        let back: Matching = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
