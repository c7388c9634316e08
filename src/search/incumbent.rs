//! Best known integral solution

use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

/// A verified integral assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incumbent {
    /// Number of matched pairs
    pub objective: usize,
    /// Selected variable indices, ascending
    pub variables: Vec<usize>,
}

impl Incumbent {
    pub fn new(mut variables: Vec<usize>) -> Self {
        variables.sort_unstable();
        variables.dedup();
        Self {
            objective: variables.len(),
            variables,
        }
    }
}

/// Incumbent shared between search workers.
///
/// `best` mirrors the installed objective (-1 when empty) so that pruning
/// checks avoid the lock. Installs go through the mutex and only accept
/// strict improvements.
#[derive(Debug)]
pub struct SharedIncumbent {
    best: AtomicI64,
    current: Mutex<Option<Incumbent>>,
}

impl Default for SharedIncumbent {
    fn default() -> Self {
        Self {
            best: AtomicI64::new(-1),
            current: Mutex::new(None),
        }
    }
}

impl SharedIncumbent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Objective of the current incumbent, if any
    pub fn best_objective(&self) -> Option<usize> {
        let best = self.best.load(Ordering::Acquire);
        usize::try_from(best).ok()
    }

    /// Whether a subproblem whose completions reach at most `bound` is dominated
    pub fn dominates(&self, bound: usize) -> bool {
        self.best_objective().is_some_and(|best| bound <= best)
    }

    /// Install `candidate` if it strictly improves on the incumbent
    pub fn try_install(&self, candidate: Incumbent) -> bool {
        let mut current = self.current.lock();
        let improves = current
            .as_ref()
            .is_none_or(|incumbent| candidate.objective > incumbent.objective);
        if improves {
            self.best
                .store(candidate.objective as i64, Ordering::Release);
            *current = Some(candidate);
        }
        improves
    }

    pub fn into_inner(self) -> Option<Incumbent> {
        self.current.into_inner()
    }
}
