//! Search counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Counters shared by all workers of one search
#[derive(Debug, Default)]
pub(crate) struct SearchCounters {
    pub nodes_explored: AtomicU64,
    pub pruned_infeasible: AtomicU64,
    pub pruned_bound: AtomicU64,
    pub branched: AtomicU64,
    pub integral_leaves: AtomicU64,
    pub incumbent_updates: AtomicU64,
    pub relaxation_failures: AtomicU64,
    pub simplex_iterations: AtomicU64,
    pub max_depth: AtomicUsize,
}

impl SearchCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_iterations(&self, iterations: usize) {
        self.simplex_iterations
            .fetch_add(iterations as u64, Ordering::Relaxed);
    }

    pub fn record_depth(&self, depth: usize) {
        self.max_depth.fetch_max(depth, Ordering::Relaxed);
    }

    pub fn snapshot(&self, elapsed: Duration, root_bound: Option<f64>) -> SearchStatistics {
        SearchStatistics {
            nodes_explored: self.nodes_explored.load(Ordering::Relaxed),
            pruned_infeasible: self.pruned_infeasible.load(Ordering::Relaxed),
            pruned_bound: self.pruned_bound.load(Ordering::Relaxed),
            branched: self.branched.load(Ordering::Relaxed),
            integral_leaves: self.integral_leaves.load(Ordering::Relaxed),
            incumbent_updates: self.incumbent_updates.load(Ordering::Relaxed),
            relaxation_failures: self.relaxation_failures.load(Ordering::Relaxed),
            simplex_iterations: self.simplex_iterations.load(Ordering::Relaxed),
            max_depth: self.max_depth.load(Ordering::Relaxed),
            elapsed,
            root_bound,
        }
    }
}

/// Summary of one branch-and-bound run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStatistics {
    pub nodes_explored: u64,
    pub pruned_infeasible: u64,
    pub pruned_bound: u64,
    pub branched: u64,
    pub integral_leaves: u64,
    pub incumbent_updates: u64,
    /// Relaxations abandoned on a non-fatal LP error
    pub relaxation_failures: u64,
    pub simplex_iterations: u64,
    pub max_depth: usize,
    pub elapsed: Duration,
    /// Relaxed objective at the root, when it was solved
    pub root_bound: Option<f64>,
}
