use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::aggregator::Verdict;
use crate::diagnostics::InferredLocation;
use crate::error::OperationError;
use crate::operations::NodeKind;
use crate::parallel::{QueuedItem, WorkerId};
use crate::scope::ScopeHandle;
use crate::template::TemplateNode;

use super::RunState;

/// Why the current item stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupt {
    /// Skip the rest of this item only.
    AbandonItem,
    /// Skip the rest of this item and stop the worker.
    Halt,
}

/// Everything an operation may touch while one item is being processed.
///
/// The context is created per item and handed to every operation explicitly,
/// so nested operations reach the iteration's scope without searching for it.
pub struct ExecutionContext<'a> {
    run: &'a RunState<'a>,
    worker: WorkerId,
    item: &'a QueuedItem,
    interrupt: Option<Interrupt>,
    executed: usize,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(run: &'a RunState<'a>, worker: WorkerId, item: &'a QueuedItem) -> Self {
        Self {
            run,
            worker,
            item,
            interrupt: None,
            executed: 0,
        }
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Value bound to the loop variable for this iteration.
    pub fn item(&self) -> &str {
        &self.item.value
    }

    /// The iteration's local scope.
    pub fn scope(&self) -> ScopeHandle<'a> {
        self.run.scopes.handle(self.worker)
    }

    /// Look up a shared reference declared earlier.
    pub fn reference(&self, id: &str) -> Option<TemplateNode> {
        self.run.references.get(id)
    }

    /// Nodes dispatched so far for this item, nested ones included.
    pub fn executed(&self) -> usize {
        self.executed
    }

    /// True once a failure has stopped the pool. Long-running operations may
    /// poll this to finish early.
    pub fn is_halting(&self) -> bool {
        self.run.errors.should_halt()
    }

    pub(crate) fn interrupt(&self) -> Option<Interrupt> {
        self.interrupt
    }

    /// Run the children of `parent` in order, in this iteration.
    ///
    /// Failures are captured on the spot; the stop policy decides whether the
    /// remaining siblings, and the enclosing item, still run.
    pub fn execute_children(&mut self, parent: &TemplateNode) {
        self.run_sequence(parent.children());
    }

    pub(crate) fn run_sequence(&mut self, nodes: &[TemplateNode]) {
        let namespace = self.run.config.namespace.as_deref();
        for node in nodes {
            if self.interrupt.is_some() {
                return;
            }
            if self.is_halting() {
                tracing::debug!(
                    "[worker-{}] halting before '{}' for item '{}'",
                    self.worker,
                    node.name(),
                    self.item()
                );
                self.interrupt = Some(Interrupt::Halt);
                return;
            }
            if node.is_foreign(namespace) {
                tracing::trace!(
                    "[worker-{}] skipping foreign node '{}' ({:?})",
                    self.worker,
                    node.name(),
                    node.namespace()
                );
                continue;
            }

            let bound = self.scope().bind(node);
            self.execute_node(&bound);
        }
    }

    fn execute_node(&mut self, node: &TemplateNode) {
        self.executed += 1;
        match self.run.classify(node.name()) {
            None => {
                let error = OperationError::infrastructure(format!(
                    "'{}' is neither a known operation nor a reference",
                    node.name()
                ));
                self.fail(node, node.name(), error);
            }
            Some(NodeKind::Reference) => match self.run.references.declare(node) {
                Ok(id) => {
                    tracing::trace!("[worker-{}] declared reference '{}'", self.worker, id);
                    self.run.diagnostics.record_success(self.worker, node.name(), node);
                }
                Err(error) => self.fail(node, node.name(), error),
            },
            Some(NodeKind::Operation(operation)) => {
                tracing::trace!(
                    "[worker-{}] {} for item '{}'",
                    self.worker,
                    operation.name(),
                    self.item()
                );
                let outcome = catch_unwind(AssertUnwindSafe(|| operation.execute(node, self)));
                match outcome {
                    Ok(Ok(())) => {
                        if self.interrupt.is_none() {
                            self.run
                                .diagnostics
                                .record_success(self.worker, operation.name(), node);
                        }
                    }
                    Ok(Err(error)) => self.fail(node, operation.name(), error),
                    Err(payload) => {
                        let error = OperationError::unknown(format!(
                            "operation panicked: {}",
                            panic_message(payload.as_ref())
                        ));
                        self.fail(node, operation.name(), error);
                    }
                }
            }
        }
    }

    fn fail(&mut self, node: &TemplateNode, operation: &str, mut error: OperationError) {
        let location = match error.location.take() {
            Some(location) => InferredLocation::Node(location),
            None => self
                .run
                .diagnostics
                .infer(self.worker, Some(node), self.run.template.location()),
        };

        let trail = self.run.diagnostics.trail(self.worker, 3);
        if !trail.is_empty() {
            tracing::debug!("[worker-{}] completed before failure: {}", self.worker, trail.join(" <- "));
        }

        let verdict = self
            .run
            .errors
            .capture(self.worker, self.item(), operation, error, location);
        match verdict {
            Verdict::ContinueItem => {}
            Verdict::AbandonItem => self.interrupt = Some(Interrupt::AbandonItem),
            Verdict::StopWorker => self.interrupt = Some(Interrupt::Halt),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
