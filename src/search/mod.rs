//! Branch-and-bound search over the relaxations

pub mod bnb;
pub mod branching;
pub mod heuristic;
pub mod incumbent;
pub mod queue;
pub mod stats;
pub mod termination;

pub use bnb::{BranchAndBound, SearchOutcome};
pub use incumbent::{Incumbent, SharedIncumbent};
pub use stats::SearchStatistics;
pub use termination::{CancellationToken, TerminationReason};
