//! Diagnostic context tracking
//!
//! Each worker keeps a chain of the operations it completed for the current
//! item, newest first. The chain is reporting-only: nothing in the engine
//! branches on it. When an operation fails, the location reported with the
//! error is resolved in this order:
//!
//! 1. the location carried by the failing node itself,
//! 2. the node of the last operation that completed on this worker,
//! 3. the enclosing per-item block,
//! 4. unknown.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::parallel::{WorkerId, lock};
use crate::template::{Location, TemplateNode};

/// One completed operation.
#[derive(Debug)]
pub struct Frame {
    pub operation: String,
    pub location: Option<Location>,
    pub previous: Option<Arc<Frame>>,
}

impl Frame {
    /// Walk the chain from this frame back to the first one.
    pub fn iter(self: &Arc<Self>) -> FrameIter {
        FrameIter {
            next: Some(Arc::clone(self)),
        }
    }
}

pub struct FrameIter {
    next: Option<Arc<Frame>>,
}

impl Iterator for FrameIter {
    type Item = Arc<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.previous.clone();
        Some(current)
    }
}

/// Best-effort location attached to a captured failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferredLocation {
    /// The failing node declared where it came from.
    Node(Location),
    /// Inferred from the last operation that completed before the failure.
    AfterOperation { operation: String, location: Location },
    /// Only the per-item block is known.
    Enclosing(Location),
    Unknown,
}

impl InferredLocation {
    pub fn location(&self) -> Option<&Location> {
        match self {
            InferredLocation::Node(location)
            | InferredLocation::AfterOperation { location, .. }
            | InferredLocation::Enclosing(location) => Some(location),
            InferredLocation::Unknown => None,
        }
    }
}

impl fmt::Display for InferredLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferredLocation::Node(location) => write!(f, "{location}"),
            InferredLocation::AfterOperation {
                operation,
                location,
            } => write!(f, "after '{operation}' at {location}"),
            InferredLocation::Enclosing(location) => write!(f, "within {location}"),
            InferredLocation::Unknown => f.write_str("unknown location"),
        }
    }
}

/// Per-worker diagnostic chains, behind one lock.
#[derive(Debug, Default)]
pub struct DiagnosticTracker {
    chains: Mutex<HashMap<WorkerId, Arc<Frame>>>,
}

impl DiagnosticTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the worker's chain. Called at the start of every item.
    pub fn reset(&self, worker: WorkerId) {
        lock(&self.chains).remove(&worker);
    }

    /// Push a completed operation onto the worker's chain.
    pub fn record_success(&self, worker: WorkerId, operation: &str, node: &TemplateNode) {
        let mut chains = lock(&self.chains);
        let previous = chains.remove(&worker);
        chains.insert(
            worker,
            Arc::new(Frame {
                operation: operation.to_string(),
                location: node.location().cloned(),
                previous,
            }),
        );
    }

    pub fn head(&self, worker: WorkerId) -> Option<Arc<Frame>> {
        lock(&self.chains).get(&worker).cloned()
    }

    pub fn depth(&self, worker: WorkerId) -> usize {
        self.head(worker).map_or(0, |head| head.iter().count())
    }

    /// Operation names on the worker's chain, newest first, at most `limit`.
    pub fn trail(&self, worker: WorkerId, limit: usize) -> Vec<String> {
        self.head(worker)
            .map(|head| {
                head.iter()
                    .take(limit)
                    .map(|frame| frame.operation.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Resolve the location to report for a failure of `failing`.
    pub fn infer(
        &self,
        worker: WorkerId,
        failing: Option<&TemplateNode>,
        enclosing: Option<&Location>,
    ) -> InferredLocation {
        if let Some(location) = failing.and_then(TemplateNode::location) {
            return InferredLocation::Node(location.clone());
        }

        let head = self.head(worker);
        if let Some(frame) = head.as_deref()
            && let Some(location) = &frame.location
        {
            return InferredLocation::AfterOperation {
                operation: frame.operation.clone(),
                location: location.clone(),
            };
        }

        match enclosing {
            Some(location) => InferredLocation::Enclosing(location.clone()),
            None => InferredLocation::Unknown,
        }
    }
}
