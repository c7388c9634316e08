//! Traits for input sources, result sinks and search observation
//!
//! The engine itself is synchronous. Sources and sinks are async so that the
//! reconciliation core can sit behind any storage backend (a database, a
//! message queue, in-memory collections for tests) without knowing about it.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::model::ProblemModel;
use crate::search::{SearchStatistics, TerminationReason};
use crate::solution::Matching;
use crate::types::*;

/// Common view over ledger and bank entries
pub trait ReconcilableEntry {
    const SIDE: Side;

    fn key(&self) -> &str;
    fn amount(&self) -> &BigDecimal;
    fn date(&self) -> NaiveDate;
}

impl ReconcilableEntry for LedgerEntry {
    const SIDE: Side = Side::Ledger;

    fn key(&self) -> &str {
        &self.key
    }

    fn amount(&self) -> &BigDecimal {
        &self.amount
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl ReconcilableEntry for BankEntry {
    const SIDE: Side = Side::Bank;

    fn key(&self) -> &str {
        &self.key
    }

    fn amount(&self) -> &BigDecimal {
        &self.amount
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// Where the entries to reconcile come from
#[async_trait]
pub trait EntrySource: Send + Sync {
    /// Load the internal ledger entries
    async fn ledger_entries(&self) -> ReconcileResult<Vec<LedgerEntry>>;

    /// Load the bank statement entries
    async fn bank_entries(&self) -> ReconcileResult<Vec<BankEntry>>;
}

/// Where a finished matching is written to
#[async_trait]
pub trait MatchingSink: Send + Sync {
    async fn write_matching(&mut self, matching: &Matching) -> ReconcileResult<()>;
}

/// Why a node left the search without children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneReason {
    Infeasible,
    /// Its bound cannot beat the incumbent
    BoundDominated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    Pruned(PruneReason),
    Integral,
    Branched { variable: usize },
    /// The relaxation gave up; the node is dropped
    Failed,
}

/// One processed subproblem
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeEvent {
    pub depth: usize,
    /// Relaxed objective, when the relaxation was solved
    pub bound: Option<f64>,
    pub outcome: NodeOutcome,
}

/// Hooks into a running search.
///
/// Called from worker threads, so implementations must be cheap and
/// thread-safe. Every method has a no-op default.
pub trait SearchObserver: Send + Sync {
    fn on_search_start(&self, _model: &ProblemModel) {}

    fn on_node(&self, _event: &NodeEvent) {}

    fn on_incumbent(&self, _objective: usize, _nodes_explored: u64) {}

    fn on_search_end(&self, _termination: &TerminationReason, _statistics: &SearchStatistics) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl SearchObserver for NoOpObserver {}

/// Observer that reports progress through `tracing`.
///
/// Start and end of a search are logged at info level. Incumbents are
/// logged at info level when `verbose`, debug otherwise; per-node events
/// only when `verbose`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver {
    pub verbose: bool,
}

impl TracingObserver {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl SearchObserver for TracingObserver {
    fn on_search_start(&self, model: &ProblemModel) {
        tracing::info!(
            ledger = model.num_ledger(),
            bank = model.num_bank(),
            variables = model.num_variables(),
            constraints = model.num_constraints(),
            "starting branch-and-bound"
        );
    }

    fn on_node(&self, event: &NodeEvent) {
        if self.verbose {
            tracing::debug!(
                depth = event.depth,
                bound = ?event.bound,
                outcome = ?event.outcome,
                "node processed"
            );
        }
    }

    fn on_incumbent(&self, objective: usize, nodes_explored: u64) {
        if self.verbose {
            tracing::info!(objective, nodes_explored, "new incumbent");
        } else {
            tracing::debug!(objective, nodes_explored, "new incumbent");
        }
    }

    fn on_search_end(&self, termination: &TerminationReason, statistics: &SearchStatistics) {
        tracing::info!(
            %termination,
            nodes = statistics.nodes_explored,
            incumbent_updates = statistics.incumbent_updates,
            relaxation_failures = statistics.relaxation_failures,
            elapsed_ms = statistics.elapsed.as_millis() as u64,
            "branch-and-bound finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_report_their_side() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let ledger = LedgerEntry::new("L1".to_string(), BigDecimal::from(5), date);
        let bank = BankEntry::new("B1".to_string(), BigDecimal::from(7), date);

        assert_eq!(<LedgerEntry as ReconcilableEntry>::SIDE, Side::Ledger);
        assert_eq!(<BankEntry as ReconcilableEntry>::SIDE, Side::Bank);
        assert_eq!(ledger.key(), "L1");
        assert_eq!(bank.amount(), &BigDecimal::from(7));
        assert_eq!(bank.date(), date);
    }
}
