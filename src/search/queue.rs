//! Open-node frontier shared by the search workers

use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::config::NodeSelection;
use crate::model::BoundOverlay;

/// An open subproblem waiting for its relaxation
#[derive(Debug, Clone)]
pub struct Subproblem {
    pub overlay: BoundOverlay,
    /// Relaxed objective of the parent, an upper bound for this node
    pub parent_bound: f64,
    pub depth: usize,
    sequence: u64,
}

/// Best bound first, then deepest, then oldest
struct Ranked(Subproblem);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .parent_bound
            .total_cmp(&other.0.parent_bound)
            .then(self.0.depth.cmp(&other.0.depth))
            .then(other.0.sequence.cmp(&self.0.sequence))
    }
}

enum Frontier {
    BestBound(BinaryHeap<Ranked>),
    DepthFirst(Vec<Subproblem>),
}

impl Frontier {
    fn pop(&mut self) -> Option<Subproblem> {
        match self {
            Frontier::BestBound(heap) => heap.pop().map(|ranked| ranked.0),
            Frontier::DepthFirst(stack) => stack.pop(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Frontier::BestBound(heap) => heap.len(),
            Frontier::DepthFirst(stack) => stack.len(),
        }
    }
}

struct QueueState {
    frontier: Frontier,
    in_flight: usize,
    closed: bool,
    next_sequence: u64,
}

/// Result of waiting for work
#[derive(Debug)]
pub enum Pop {
    Node(Subproblem),
    /// The frontier is empty and no worker can add to it
    Exhausted,
    /// The search was stopped
    Closed,
}

/// Blocking work queue over the open nodes.
///
/// A popped node counts as in flight until its worker calls
/// [`NodeQueue::finish`]. Children must be pushed before that call, so the
/// queue is exhausted exactly when the frontier is empty and nothing is in
/// flight.
pub struct NodeQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl NodeQueue {
    pub fn new(selection: NodeSelection) -> Self {
        let frontier = match selection {
            NodeSelection::BestBound => Frontier::BestBound(BinaryHeap::new()),
            NodeSelection::DepthFirst => Frontier::DepthFirst(Vec::new()),
        };
        Self {
            state: Mutex::new(QueueState {
                frontier,
                in_flight: 0,
                closed: false,
                next_sequence: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Add nodes, most promising first
    pub fn push_all(&self, nodes: Vec<(BoundOverlay, f64, usize)>) {
        if nodes.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        let count = nodes.len();
        let mut ordered: Vec<Subproblem> = nodes
            .into_iter()
            .map(|(overlay, parent_bound, depth)| {
                let sequence = state.next_sequence;
                state.next_sequence += 1;
                Subproblem {
                    overlay,
                    parent_bound,
                    depth,
                    sequence,
                }
            })
            .collect();

        match &mut state.frontier {
            Frontier::BestBound(heap) => heap.extend(ordered.into_iter().map(Ranked)),
            Frontier::DepthFirst(stack) => {
                ordered.reverse();
                stack.extend(ordered);
            }
        }
        drop(state);

        if count == 1 {
            self.available.notify_one();
        } else {
            self.available.notify_all();
        }
    }

    pub fn push(&self, overlay: BoundOverlay, parent_bound: f64, depth: usize) {
        self.push_all(vec![(overlay, parent_bound, depth)]);
    }

    /// Wait for the next node
    pub fn pop(&self) -> Pop {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Pop::Closed;
            }
            if let Some(node) = state.frontier.pop() {
                state.in_flight += 1;
                return Pop::Node(node);
            }
            if state.in_flight == 0 {
                self.available.notify_all();
                return Pop::Exhausted;
            }
            self.available.wait(&mut state);
        }
    }

    /// Mark one popped node as done
    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.in_flight == 0 && state.frontier.len() == 0 {
            self.available.notify_all();
        }
    }

    /// Wake every waiting worker and refuse further work
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    /// Open nodes not yet handed to a worker
    pub(crate) fn len(&self) -> usize {
        self.state.lock().frontier.len()
    }
}
