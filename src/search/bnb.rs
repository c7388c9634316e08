//! Parallel LP-based branch-and-bound
//!
//! Workers share one [`NodeQueue`], one [`SharedIncumbent`] and one set of
//! counters. Each worker repeatedly pops a subproblem, solves its relaxation,
//! and either prunes it, records an integral leaf, or pushes two children.
//! Budgets (time, nodes, cancellation) are checked between nodes; the first
//! one to trip closes the queue and becomes the termination reason.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::config::SolverConfig;
use crate::model::ProblemModel;
use crate::relaxation::{LpError, Relaxation, RelaxationSolver, RelaxedSolution};
use crate::search::branching::{self, NodeAction};
use crate::search::heuristic::round_greedily;
use crate::search::incumbent::{Incumbent, SharedIncumbent};
use crate::search::queue::{NodeQueue, Pop, Subproblem};
use crate::search::stats::{SearchCounters, SearchStatistics};
use crate::search::termination::{CancellationToken, TerminationReason};
use crate::traits::{NodeEvent, NodeOutcome, PruneReason, SearchObserver};

/// Everything a finished search hands back
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub incumbent: Option<Incumbent>,
    pub termination: TerminationReason,
    /// The error that stopped the search, for [`TerminationReason::SolverFailure`]
    pub fatal_error: Option<LpError>,
    pub statistics: SearchStatistics,
}

impl SearchOutcome {
    /// The search ran to completion without abandoning any relaxation
    pub fn is_proven_optimal(&self) -> bool {
        self.termination == TerminationReason::Exhausted
            && self.statistics.relaxation_failures == 0
            && self.incumbent.is_some()
    }
}

/// Branch-and-bound over one model
pub struct BranchAndBound<'a> {
    model: &'a ProblemModel,
    config: &'a SolverConfig,
    relaxation: RelaxationSolver,
}

impl<'a> BranchAndBound<'a> {
    pub fn new(model: &'a ProblemModel, config: &'a SolverConfig) -> Self {
        Self {
            model,
            config,
            relaxation: RelaxationSolver::from_config(config),
        }
    }

    /// Run the search to termination
    pub fn run(&self, observer: &dyn SearchObserver, cancel: &CancellationToken) -> SearchOutcome {
        let started = Instant::now();
        observer.on_search_start(self.model);

        let ctx = SearchContext {
            model: self.model,
            config: self.config,
            relaxation: &self.relaxation,
            observer,
            cancel,
            deadline: started.checked_add(self.config.time_limit()),
            queue: NodeQueue::new(self.config.node_selection),
            incumbent: SharedIncumbent::new(),
            counters: SearchCounters::default(),
            reserved_nodes: AtomicU64::new(0),
            stop: Mutex::new(None),
            root_bound: Mutex::new(None),
        };

        ctx.queue.push(
            self.model.root_overlay(self.config.prune_date_infeasible),
            self.model.objective_upper_bound() as f64,
            0,
        );

        let workers = self.config.threads.number_of_threads().max(1);
        if workers == 1 {
            ctx.work(0);
        } else {
            let span = tracing::Span::current();
            std::thread::scope(|scope| {
                for index in 1..workers {
                    let ctx = &ctx;
                    let span = span.clone();
                    let spawned = std::thread::Builder::new()
                        .name(format!("bnb-worker-{}", index))
                        .spawn_scoped(scope, move || {
                            let _entered = span.enter();
                            ctx.work(index);
                        });
                    if let Err(err) = spawned {
                        tracing::warn!(worker = index, error = %err, "failed to spawn search worker");
                    }
                }
                ctx.work(0);
            });
        }

        let (termination, fatal_error) = ctx
            .stop
            .lock()
            .take()
            .unwrap_or((TerminationReason::Exhausted, None));
        let root_bound = *ctx.root_bound.lock();
        let statistics = ctx.counters.snapshot(started.elapsed(), root_bound);
        observer.on_search_end(&termination, &statistics);

        SearchOutcome {
            incumbent: ctx.incumbent.into_inner(),
            termination,
            fatal_error,
            statistics,
        }
    }
}

struct SearchContext<'a> {
    model: &'a ProblemModel,
    config: &'a SolverConfig,
    relaxation: &'a RelaxationSolver,
    observer: &'a dyn SearchObserver,
    cancel: &'a CancellationToken,
    deadline: Option<Instant>,
    queue: NodeQueue,
    incumbent: SharedIncumbent,
    counters: SearchCounters,
    reserved_nodes: AtomicU64,
    stop: Mutex<Option<(TerminationReason, Option<LpError>)>>,
    root_bound: Mutex<Option<f64>>,
}

impl SearchContext<'_> {
    fn work(&self, worker: usize) {
        tracing::trace!(worker, "search worker started");
        loop {
            if let Some(reason) = self.budget_exhausted() {
                self.halt(reason, None);
                break;
            }

            let node = match self.queue.pop() {
                Pop::Node(node) => node,
                Pop::Exhausted | Pop::Closed => break,
            };

            if !self.reserve_node() {
                self.queue.finish();
                self.halt(TerminationReason::NodeLimit, None);
                break;
            }

            let result = self.process(node);
            self.queue.finish();

            if let Err(err) = result {
                tracing::error!(worker, error = %err, "relaxation failed fatally");
                self.halt(TerminationReason::SolverFailure(err.to_string()), Some(err));
                break;
            }
        }
        tracing::trace!(worker, "search worker stopped");
    }

    fn budget_exhausted(&self) -> Option<TerminationReason> {
        if self.cancel.is_cancelled() {
            return Some(TerminationReason::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(TerminationReason::TimeLimit);
        }
        None
    }

    fn reserve_node(&self) -> bool {
        match self.config.node_limit {
            Some(limit) => self.reserved_nodes.fetch_add(1, Ordering::AcqRel) < limit,
            None => true,
        }
    }

    /// Record the first stop reason and release every worker
    fn halt(&self, reason: TerminationReason, error: Option<LpError>) {
        {
            let mut stop = self.stop.lock();
            if stop.is_none() {
                tracing::debug!(%reason, open_nodes = self.queue.len(), "halting search");
                *stop = Some((reason, error));
            }
        }
        self.queue.close();
    }

    fn process(&self, node: Subproblem) -> Result<(), LpError> {
        SearchCounters::bump(&self.counters.nodes_explored);
        self.counters.record_depth(node.depth);
        let tolerance = self.config.integrality_tolerance;

        let parent_limit = (node.parent_bound + tolerance).floor().max(0.0) as usize;
        if self.incumbent.dominates(parent_limit) {
            self.prune(&node, None, PruneReason::BoundDominated);
            return Ok(());
        }

        let solution = match self.relaxation.solve(self.model, &node.overlay) {
            Ok(Relaxation::Optimal(solution)) => solution,
            Ok(Relaxation::Infeasible { constraint }) => {
                tracing::trace!(depth = node.depth, ?constraint, "relaxation infeasible");
                self.prune(&node, None, PruneReason::Infeasible);
                return Ok(());
            }
            Err(err) if !err.is_fatal() => {
                SearchCounters::bump(&self.counters.relaxation_failures);
                tracing::warn!(depth = node.depth, error = %err, "dropping node after relaxation failure");
                self.observer.on_node(&NodeEvent {
                    depth: node.depth,
                    bound: None,
                    outcome: NodeOutcome::Failed,
                });
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        self.counters.add_iterations(solution.iterations);
        if node.depth == 0 {
            *self.root_bound.lock() = Some(solution.bound);
        }

        let limit = solution.integral_bound(tolerance);
        if self.incumbent.dominates(limit) {
            self.prune(&node, Some(solution.bound), PruneReason::BoundDominated);
            return Ok(());
        }

        match branching::classify(self.model, &node.overlay, &solution, tolerance) {
            NodeAction::Integral(selected) => {
                SearchCounters::bump(&self.counters.integral_leaves);
                self.observer.on_node(&NodeEvent {
                    depth: node.depth,
                    bound: Some(solution.bound),
                    outcome: NodeOutcome::Integral,
                });
                self.install(selected);
            }
            NodeAction::Infeasible(violation) => {
                tracing::trace!(
                    depth = node.depth,
                    constraint = %violation.kind,
                    "fixed variables violate a constraint"
                );
                self.prune(&node, Some(solution.bound), PruneReason::Infeasible);
            }
            NodeAction::Branch(variable) => self.branch(node, &solution, limit, variable),
        }

        Ok(())
    }

    fn branch(&self, node: Subproblem, solution: &RelaxedSolution, limit: usize, variable: usize) {
        if self.config.rounding_heuristic {
            if let Some(selected) = round_greedily(self.model, &node.overlay, &solution.values) {
                self.install(selected);
                if self.incumbent.dominates(limit) {
                    self.prune(&node, Some(solution.bound), PruneReason::BoundDominated);
                    return;
                }
            }
        }

        SearchCounters::bump(&self.counters.branched);
        self.observer.on_node(&NodeEvent {
            depth: node.depth,
            bound: Some(solution.bound),
            outcome: NodeOutcome::Branched { variable },
        });

        let depth = node.depth + 1;
        let [one, zero] = branching::children(&node.overlay, variable);
        self.queue
            .push_all(vec![(one, solution.bound, depth), (zero, solution.bound, depth)]);
    }

    fn prune(&self, node: &Subproblem, bound: Option<f64>, reason: PruneReason) {
        let counter = match reason {
            PruneReason::Infeasible => &self.counters.pruned_infeasible,
            PruneReason::BoundDominated => &self.counters.pruned_bound,
        };
        SearchCounters::bump(counter);
        self.observer.on_node(&NodeEvent {
            depth: node.depth,
            bound,
            outcome: NodeOutcome::Pruned(reason),
        });
    }

    fn install(&self, selected: Vec<usize>) {
        let candidate = Incumbent::new(selected);
        let objective = candidate.objective;
        if self.incumbent.try_install(candidate) {
            SearchCounters::bump(&self.counters.incumbent_updates);
            let nodes = self.counters.nodes_explored.load(Ordering::Relaxed);
            self.observer.on_incumbent(objective, nodes);
        }
    }
}
