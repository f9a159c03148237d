//! The for-each engine
//!
//! ```text
//! Idle ──▶ Dispatching ──▶ Draining ──▶ Completed
//!               │                          ▲
//!               └──── no items (no-op) ────┘
//! ```
//!
//! `run` validates the configuration, sequences the items, fills the work
//! queue and hands it to the execution strategy. Every worker loops
//! dequeue → reset scope → bind → execute until the queue is empty or the
//! stop policy halts the pool. Captured failures are only turned into an
//! error once every worker has been joined.

mod context;
mod worker;

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::aggregator::ErrorAggregator;
use crate::config::LoopConfig;
use crate::diagnostics::DiagnosticTracker;
use crate::error::LoopError;
use crate::operations::{NodeKind, OperationFactory, ReferenceTable};
use crate::parallel::{ExecutionStrategy, WorkQueue, lock};
use crate::scope::ScopeTable;
use crate::sequencer::Sequencer;
use crate::template::Template;

pub use context::ExecutionContext;

/// Lifecycle of one `run` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Dispatching,
    Draining,
    Completed,
}

/// Counters for a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Items in the ordered list.
    pub items_total: usize,
    /// Items dequeued and run to completion, failed or not.
    pub items_processed: usize,
    /// Workers used; 0 when there was nothing to do.
    pub workers: usize,
    pub elapsed: Duration,
}

/// State shared by every worker of one run.
pub(crate) struct RunState<'e> {
    pub(crate) config: &'e LoopConfig,
    pub(crate) template: &'e Template,
    factory: &'e Mutex<Box<dyn OperationFactory>>,
    pub(crate) references: &'e ReferenceTable,
    pub(crate) scopes: ScopeTable,
    pub(crate) diagnostics: DiagnosticTracker,
    pub(crate) errors: ErrorAggregator,
    pub(crate) processed: AtomicUsize,
}

impl RunState<'_> {
    /// Ask the factory what `name` is. The factory lock is released before
    /// the caller runs anything.
    pub(crate) fn classify(&self, name: &str) -> Option<NodeKind> {
        lock(self.factory).classify(name)
    }
}

/// Runs a per-item template over a list of items with a bounded worker pool.
pub struct ForEachEngine {
    config: LoopConfig,
    template: Template,
    factory: Mutex<Box<dyn OperationFactory>>,
    references: ReferenceTable,
    state: Mutex<EngineState>,
}

impl ForEachEngine {
    pub fn new(config: LoopConfig, template: Template, factory: impl OperationFactory + 'static) -> Self {
        Self {
            config,
            template,
            factory: Mutex::new(Box::new(factory)),
            references: ReferenceTable::new(),
            state: Mutex::new(EngineState::Idle),
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn state(&self) -> EngineState {
        *lock(&self.state)
    }

    /// Shared references declared by the template so far.
    pub fn references(&self) -> &ReferenceTable {
        &self.references
    }

    /// Sequence `items` and run the template once per item.
    ///
    /// Configuration problems are returned before any worker starts. Failures
    /// inside workers are returned after the pool joins, with the first
    /// captured failure as the primary error.
    pub fn run(&self, items: Vec<String>) -> Result<RunReport, LoopError> {
        self.config.validate()?;
        let ordered = Sequencer::new(self.config.order_by, self.config.order_direction).sequence(items)?;
        self.dispatch(ordered)
    }

    fn dispatch(&self, items: Vec<String>) -> Result<RunReport, LoopError> {
        let started = Instant::now();
        self.set_state(EngineState::Dispatching);

        let items_total = items.len();
        if items_total == 0 {
            tracing::info!("No items to process");
            self.set_state(EngineState::Completed);
            return Ok(RunReport {
                items_total: 0,
                items_processed: 0,
                workers: 0,
                elapsed: started.elapsed(),
            });
        }

        let strategy = ExecutionStrategy::for_workload(self.config.max_threads, items_total);
        let queue = WorkQueue::new(items);
        let run = RunState {
            config: &self.config,
            template: &self.template,
            factory: &self.factory,
            references: &self.references,
            scopes: ScopeTable::new(),
            diagnostics: DiagnosticTracker::new(),
            errors: ErrorAggregator::new(self.config.stop_policy()),
            processed: AtomicUsize::new(0),
        };

        tracing::info!(
            "Processing {} items with {} worker(s) ({:?})",
            items_total,
            strategy.workers(),
            strategy
        );

        self.set_state(EngineState::Draining);
        let pool_result = strategy.run(|worker_id| worker::worker_loop(&run, &queue, worker_id));
        self.set_state(EngineState::Completed);
        pool_result?;

        let report = RunReport {
            items_total,
            items_processed: run.processed.load(Ordering::SeqCst),
            workers: strategy.workers(),
            elapsed: started.elapsed(),
        };
        tracing::info!(
            "Processed {}/{} items in {:.2}s ({} dequeued, {} failures)",
            report.items_processed,
            report.items_total,
            report.elapsed.as_secs_f64(),
            queue.dequeued(),
            run.errors.len()
        );

        run.errors.into_outcome(report)
    }

    fn set_state(&self, next: EngineState) {
        let mut state = lock(&self.state);
        tracing::trace!("Engine state {:?} -> {:?}", *state, next);
        *state = next;
    }
}

#[cfg(test)]
mod tests;
