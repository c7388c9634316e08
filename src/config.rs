//! Solver configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{ReconcileError, ReconcileResult};

/// Default wall-clock budget for a search, in seconds
pub const DEFAULT_TIME_LIMIT_SECONDS: f64 = 1500.0;

/// Default tolerance for treating a relaxed value as integral
pub const DEFAULT_INTEGRALITY_TOLERANCE: f64 = 1e-6;

/// Default cap on simplex pivots for a single relaxation
pub const DEFAULT_MAX_SIMPLEX_ITERATIONS: usize = 50_000;

/// Number of search workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Threads {
    Single,
    Auto,
    Multi(usize),
}

impl Threads {
    pub fn number_of_threads(&self) -> usize {
        match self {
            Threads::Single => 1,
            Threads::Multi(num) => *num,
            Threads::Auto => std::thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }
}

/// Order in which open subproblems are explored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeSelection {
    /// Highest parent bound first, deeper nodes on ties
    BestBound,
    /// Last-in first-out, the `= 1` branch is explored first
    DepthFirst,
}

/// Configuration for a reconciliation run.
///
/// Deserializes from camelCase keys (`timeLimitSeconds`, `nodeLimit`,
/// `verbose`, ...); every field is optional and falls back to
/// [`SolverConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SolverConfig {
    /// Wall-clock budget for the search
    pub time_limit_seconds: f64,
    /// Optional hard cap on explored subproblems
    pub node_limit: Option<u64>,
    /// Report intermediate bounds and incumbents at info level
    pub verbose: bool,
    pub threads: Threads,
    pub node_selection: NodeSelection,
    pub integrality_tolerance: f64,
    /// Derive an integral assignment from every fractional relaxation
    pub rounding_heuristic: bool,
    /// Fix pairs whose ledger date is after the bank date to zero at the root
    pub prune_date_infeasible: bool,
    pub max_simplex_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_seconds: DEFAULT_TIME_LIMIT_SECONDS,
            node_limit: None,
            verbose: false,
            threads: Threads::Single,
            node_selection: NodeSelection::BestBound,
            integrality_tolerance: DEFAULT_INTEGRALITY_TOLERANCE,
            rounding_heuristic: true,
            prune_date_infeasible: true,
            max_simplex_iterations: DEFAULT_MAX_SIMPLEX_ITERATIONS,
        }
    }
}

impl SolverConfig {
    /// Set the wall-clock budget
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit_seconds = seconds;
        self
    }

    /// Set the subproblem budget
    pub fn with_node_limit(mut self, limit: u64) -> Self {
        self.node_limit = Some(limit);
        self
    }

    pub fn with_threads(mut self, threads: Threads) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_node_selection(mut self, node_selection: NodeSelection) -> Self {
        self.node_selection = node_selection;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_rounding_heuristic(mut self, enabled: bool) -> Self {
        self.rounding_heuristic = enabled;
        self
    }

    pub fn with_prune_date_infeasible(mut self, enabled: bool) -> Self {
        self.prune_date_infeasible = enabled;
        self
    }

    /// Wall-clock budget as a `Duration`
    pub fn time_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_limit_seconds).unwrap_or(Duration::MAX)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ReconcileResult<()> {
        if !(self.time_limit_seconds > 0.0) {
            return Err(ReconcileError::Config(format!(
                "timeLimitSeconds must be positive, got {}",
                self.time_limit_seconds
            )));
        }

        if self.node_limit == Some(0) {
            return Err(ReconcileError::Config(
                "nodeLimit must be at least 1".to_string(),
            ));
        }

        if self.threads.number_of_threads() == 0 {
            return Err(ReconcileError::Config(
                "at least one search thread is required".to_string(),
            ));
        }

        if !(self.integrality_tolerance > 0.0 && self.integrality_tolerance < 0.5) {
            return Err(ReconcileError::Config(format!(
                "integralityTolerance must lie in (0, 0.5), got {}",
                self.integrality_tolerance
            )));
        }

        if self.max_simplex_iterations == 0 {
            return Err(ReconcileError::Config(
                "maxSimplexIterations must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time_limit(), Duration::from_secs(1500));
        assert_eq!(config.node_limit, None);
        assert!(config.prune_date_infeasible);
    }

    #[test]
    fn test_config_deserializes_from_camel_case() {
        let config: SolverConfig = serde_json::from_str(
            r#"{ "timeLimitSeconds": 2.5, "nodeLimit": 10, "verbose": true, "threads": { "multi": 3 } }"#,
        )
        .unwrap();

        assert_eq!(config.time_limit_seconds, 2.5);
        assert_eq!(config.node_limit, Some(10));
        assert!(config.verbose);
        assert_eq!(config.threads, Threads::Multi(3));
        // Unspecified fields keep their defaults
        assert_eq!(config.node_selection, NodeSelection::BestBound);
        assert!(config.rounding_heuristic);
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        assert!(SolverConfig::default().with_time_limit(0.0).validate().is_err());
        assert!(SolverConfig::default()
            .with_time_limit(f64::NAN)
            .validate()
            .is_err());
        assert!(SolverConfig::default().with_node_limit(0).validate().is_err());
        assert!(SolverConfig::default()
            .with_threads(Threads::Multi(0))
            .validate()
            .is_err());

        let config = SolverConfig {
            integrality_tolerance: 0.5,
            ..SolverConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
