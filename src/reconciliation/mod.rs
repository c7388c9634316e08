//! Reconciliation engine
//!
//! Wires input validation, model construction, the branch-and-bound search
//! and result extraction together. Every run gets its own `tracing` span
//! tagged with a random run id.

use std::sync::Arc;
use uuid::Uuid;

use crate::config::SolverConfig;
use crate::model::ProblemModel;
use crate::relaxation::LpError;
use crate::search::{BranchAndBound, CancellationToken, SearchOutcome, TerminationReason};
use crate::solution::{extract, verify_matching, Matching};
use crate::traits::{EntrySource, MatchingSink, SearchObserver, TracingObserver};
use crate::types::*;

/// Entry point for reconciling ledger entries against bank entries
#[derive(Clone)]
pub struct ReconciliationEngine {
    config: SolverConfig,
    observer: Arc<dyn SearchObserver>,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReconciliationEngine {
    /// Engine with the default configuration
    pub fn new() -> Self {
        let config = SolverConfig::default();
        Self {
            observer: Arc::new(TracingObserver::new(config.verbose)),
            config,
        }
    }

    /// Engine with a validated configuration
    pub fn with_config(config: SolverConfig) -> ReconcileResult<Self> {
        config.validate()?;
        Ok(Self {
            observer: Arc::new(TracingObserver::new(config.verbose)),
            config,
        })
    }

    /// Replace the default tracing observer
    pub fn with_observer(mut self, observer: Arc<dyn SearchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Find a maximum matching of `ledger` against `bank`.
    ///
    /// Input problems are reported before the search starts. A search cut
    /// short by a budget still returns its best matching, with status
    /// [`MatchingStatus::TimeLimited`](crate::solution::MatchingStatus).
    pub fn reconcile(
        &self,
        ledger: &[LedgerEntry],
        bank: &[BankEntry],
    ) -> ReconcileResult<Matching> {
        self.reconcile_with_cancel(ledger, bank, &CancellationToken::new())
    }

    /// Like [`reconcile`](Self::reconcile), stopping early once `cancel` is raised
    pub fn reconcile_with_cancel(
        &self,
        ledger: &[LedgerEntry],
        bank: &[BankEntry],
        cancel: &CancellationToken,
    ) -> ReconcileResult<Matching> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "reconcile",
            %run_id,
            ledger = ledger.len(),
            bank = bank.len()
        );
        let _entered = span.enter();

        let model = ProblemModel::build(ledger, bank)?;
        if model.num_variables() == 0 {
            tracing::debug!("one side is empty, nothing to match");
            return Ok(Matching::empty());
        }

        let outcome = BranchAndBound::new(&model, &self.config).run(self.observer.as_ref(), cancel);
        let matching = self.conclude(&model, outcome)?;

        verify_matching(ledger, bank, &matching)?;
        tracing::info!(
            objective = matching.objective,
            status = %matching.status,
            "reconciliation finished"
        );
        Ok(matching)
    }

    /// Load both sides from `source` and reconcile them.
    ///
    /// The search itself runs synchronously on the calling task.
    pub async fn reconcile_from<S>(&self, source: &S) -> ReconcileResult<Matching>
    where
        S: EntrySource + ?Sized,
    {
        let ledger = source.ledger_entries().await?;
        let bank = source.bank_entries().await?;
        self.reconcile(&ledger, &bank)
    }

    /// Reconcile the entries of `source` and hand the result to `sink`
    pub async fn reconcile_into<S, K>(&self, source: &S, sink: &mut K) -> ReconcileResult<Matching>
    where
        S: EntrySource + ?Sized,
        K: MatchingSink + ?Sized,
    {
        let matching = self.reconcile_from(source).await?;
        sink.write_matching(&matching).await?;
        Ok(matching)
    }

    fn conclude(&self, model: &ProblemModel, outcome: SearchOutcome) -> ReconcileResult<Matching> {
        let SearchOutcome {
            incumbent,
            termination,
            fatal_error,
            statistics,
        } = outcome;

        if incumbent.is_none() {
            match &termination {
                TerminationReason::SolverFailure(message) => {
                    return Err(ReconcileError::Solver {
                        message: message.clone(),
                        variable: fatal_error.as_ref().and_then(failing_variable),
                        constraint: fatal_error.as_ref().and_then(failing_constraint),
                    });
                }
                TerminationReason::Exhausted if statistics.relaxation_failures == 0 => {
                    return Err(ReconcileError::InvariantViolation(
                        "search exhausted without finding a feasible matching".to_string(),
                    ));
                }
                _ => {
                    tracing::warn!(%termination, "no incumbent found, returning the empty matching");
                }
            }
        }

        Ok(extract(model, incumbent.as_ref(), termination, statistics))
    }
}

fn failing_variable(error: &LpError) -> Option<usize> {
    match error {
        LpError::Unbounded { column } | LpError::NumericalFailure { column, .. } => Some(*column),
        LpError::IterationLimit { .. } => None,
    }
}

fn failing_constraint(error: &LpError) -> Option<usize> {
    match error {
        LpError::NumericalFailure { row, .. } => *row,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchStatistics;
    use crate::solution::MatchingStatus;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    fn model() -> ProblemModel {
        let ledger = vec![LedgerEntry::new("L1".to_string(), BigDecimal::from(1), day(1))];
        let bank = vec![BankEntry::new("B1".to_string(), BigDecimal::from(1), day(2))];
        ProblemModel::build(&ledger, &bank).unwrap()
    }

    fn outcome(termination: TerminationReason, fatal_error: Option<LpError>) -> SearchOutcome {
        SearchOutcome {
            incumbent: None,
            termination,
            fatal_error,
            statistics: SearchStatistics::default(),
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SolverConfig::default().with_time_limit(0.0);
        let err = ReconciliationEngine::with_config(config).unwrap_err();
        assert!(matches!(err, ReconcileError::Config(_)));
    }

    #[test]
    fn test_fatal_failure_without_incumbent_is_an_error() {
        let engine = ReconciliationEngine::new();
        let failure = outcome(
            TerminationReason::SolverFailure("objective is unbounded".to_string()),
            Some(LpError::Unbounded { column: 3 }),
        );

        match engine.conclude(&model(), failure) {
            Err(ReconcileError::Solver { variable, .. }) => assert_eq!(variable, Some(3)),
            other => panic!("expected solver error, got {:?}", other),
        }
    }

    #[test]
    fn test_exhausted_without_incumbent_is_an_invariant_violation() {
        let engine = ReconciliationEngine::new();
        let err = engine
            .conclude(&model(), outcome(TerminationReason::Exhausted, None))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::InvariantViolation(_)));
    }

    #[test]
    fn test_budget_without_incumbent_falls_back_to_empty() {
        let engine = ReconciliationEngine::new();
        let matching = engine
            .conclude(&model(), outcome(TerminationReason::TimeLimit, None))
            .unwrap();
        assert!(matching.is_empty());
        assert_eq!(matching.status, MatchingStatus::TimeLimited);
    }
}
