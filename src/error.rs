//! Error types for the for-each engine.
//!
//! Configuration problems surface synchronously as [`LoopError::Configuration`]
//! before any worker starts. Everything that goes wrong inside a worker is
//! captured as an [`OperationError`], recorded by the error aggregator and only
//! surfaces after the pool has joined, as [`LoopError::Failed`].

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::aggregator::ErrorRecord;
use crate::engine::RunReport;
use crate::template::Location;

/// Shared, thread-safe underlying cause of a captured failure.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Errors returned by [`crate::engine::ForEachEngine::run`] and the
/// configuration layer.
#[derive(Debug, Error)]
pub enum LoopError {
    /// Invalid, missing or conflicting configuration. Raised before dispatch.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// At least one failure was captured while draining the queue.
    #[error("{primary}")]
    Failed {
        /// First record inserted into the aggregator.
        primary: Box<ErrorRecord>,
        /// Every record, in insertion order (the primary included).
        records: Vec<ErrorRecord>,
        /// Counters for the run that failed.
        report: RunReport,
    },

    /// A worker thread died outside of operation execution.
    #[error("worker pool failure: {0}")]
    Pool(String),
}

impl LoopError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// The primary record for a failed run.
    pub fn primary(&self) -> Option<&ErrorRecord> {
        match self {
            Self::Failed { primary, .. } => Some(primary),
            _ => None,
        }
    }

    /// All captured records for a failed run.
    pub fn records(&self) -> &[ErrorRecord] {
        match self {
            Self::Failed { records, .. } => records,
            _ => &[],
        }
    }
}

/// Category of a failure captured inside a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Raised by an operation.
    Operation,
    /// Anything else that went wrong inside a worker, panics included.
    Unknown,
    /// The operation factory could not classify a template node.
    Infrastructure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Operation => "operation",
            FailureKind::Unknown => "unknown",
            FailureKind::Infrastructure => "infrastructure",
        };
        f.write_str(label)
    }
}

/// A failure raised while executing one node of a bound template.
#[derive(Debug, Clone)]
pub struct OperationError {
    pub kind: FailureKind,
    pub message: String,
    pub cause: Option<Cause>,
    /// Location the operation knows it failed at, if any.
    pub location: Option<Location>,
}

impl OperationError {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            location: None,
        }
    }

    pub fn operation(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Operation, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unknown, message)
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Infrastructure, message)
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl StdError for OperationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}
