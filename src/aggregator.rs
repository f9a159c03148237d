//! Error aggregation and stop policy
//!
//! Workers never return failures directly. They hand every captured
//! [`OperationError`] to the [`ErrorAggregator`], which appends an immutable
//! [`ErrorRecord`] under its lock and answers with a [`Verdict`]: keep going,
//! abandon the current item, or stop the worker. Once the pool has joined, the
//! first record appended becomes the primary failure of the run.

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::diagnostics::InferredLocation;
use crate::engine::RunReport;
use crate::error::{Cause, FailureKind, LoopError, OperationError};
use crate::parallel::{WorkerId, lock};

/// Two independent early-termination controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPolicy {
    /// Any failure stops every worker before its next operation or item.
    pub stop_on_first_error: bool,
    /// A failure abandons the rest of the failing item's operations.
    pub stop_loop_on_error: bool,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            stop_on_first_error: true,
            stop_loop_on_error: true,
        }
    }
}

/// What a worker must do after one of its operations failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Run the next operation of the same item.
    ContinueItem,
    /// Skip the rest of this item and dequeue the next one.
    AbandonItem,
    /// Stop this worker; the whole pool is halting.
    StopWorker,
}

/// A captured failure. Never modified once appended.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    /// Insertion position, starting at 0.
    pub sequence: usize,
    pub worker: WorkerId,
    pub item: String,
    pub operation: String,
    pub kind: FailureKind,
    pub message: String,
    pub cause: Option<Cause>,
    pub location: InferredLocation,
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed for item '{}' ({}): {}",
            self.operation, self.item, self.location, self.message
        )?;
        if let Some(cause) = &self.cause {
            write!(f, " (caused by: {cause})")?;
        }
        Ok(())
    }
}

/// Insertion-ordered, thread-safe list of captured failures.
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    policy: StopPolicy,
    records: Mutex<Vec<ErrorRecord>>,
    halted: AtomicBool,
}

impl ErrorAggregator {
    pub fn new(policy: StopPolicy) -> Self {
        Self {
            policy,
            records: Mutex::new(Vec::new()),
            halted: AtomicBool::new(false),
        }
    }

    /// Append a record for `error` and decide what the worker does next.
    pub fn capture(
        &self,
        worker: WorkerId,
        item: &str,
        operation: &str,
        error: OperationError,
        location: InferredLocation,
    ) -> Verdict {
        let kind = error.kind;
        let (sequence, summary) = {
            let mut records = lock(&self.records);
            let record = ErrorRecord {
                sequence: records.len(),
                worker,
                item: item.to_string(),
                operation: operation.to_string(),
                kind,
                message: error.message,
                cause: error.cause,
                location,
            };
            let summary = (record.sequence, record.to_string());
            records.push(record);
            if self.policy.stop_on_first_error {
                // Flag is raised before the lock is released
                self.halted.store(true, Ordering::SeqCst);
            }
            summary
        };

        tracing::warn!("[worker-{}] {} error #{}: {}", worker, kind, sequence + 1, summary);

        if self.policy.stop_on_first_error {
            Verdict::StopWorker
        } else if self.policy.stop_loop_on_error {
            Verdict::AbandonItem
        } else {
            Verdict::ContinueItem
        }
    }

    /// Whether workers must stop before their next operation or item.
    pub fn should_halt(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every record, in insertion order.
    pub fn records(&self) -> Vec<ErrorRecord> {
        lock(&self.records).clone()
    }

    /// Final outcome after the pool has joined.
    pub fn into_outcome(self, report: RunReport) -> Result<RunReport, LoopError> {
        let records = self
            .records
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let Some(primary) = records.first().cloned() else {
            return Ok(report);
        };

        for record in records.iter().skip(1) {
            tracing::debug!("Additional failure #{}: {}", record.sequence + 1, record);
        }

        Err(LoopError::Failed {
            primary: Box::new(primary),
            records,
            report,
        })
    }
}
