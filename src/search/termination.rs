//! Search termination and cooperative cancellation

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Why the branch-and-bound search stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "camelCase")]
pub enum TerminationReason {
    /// Every open node was explored or pruned
    Exhausted,
    TimeLimit,
    NodeLimit,
    Cancelled,
    /// A relaxation failed in a way that taints the whole search
    SolverFailure(String),
}

impl TerminationReason {
    /// Whether the search stopped on a budget or a caller request
    pub fn is_limit(&self) -> bool {
        matches!(
            self,
            TerminationReason::TimeLimit
                | TerminationReason::NodeLimit
                | TerminationReason::Cancelled
        )
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::Exhausted => write!(f, "search tree exhausted"),
            TerminationReason::TimeLimit => write!(f, "time limit reached"),
            TerminationReason::NodeLimit => write!(f, "node limit reached"),
            TerminationReason::Cancelled => write!(f, "cancelled"),
            TerminationReason::SolverFailure(message) => write!(f, "solver failure: {}", message),
        }
    }
}

/// Shared flag a caller can raise to stop a running search.
///
/// Clones observe the same flag. Workers poll it between nodes, so a
/// cancelled search still returns its best incumbent.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
