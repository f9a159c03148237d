//! Worker pool plumbing
//!
//! This module owns **how** items are distributed, not what happens to them:
//!
//! - **Worker calculation**: effective worker count from `maxthreads`, the
//!   available CPU cores (`num_cpus::get()`) and the item count
//! - **Execution strategy**: sequential on the calling thread, or a fixed set
//!   of scoped worker threads that are all joined before returning
//! - **Work queue**: a FIFO filled once from the ordered item list and drained
//!   by non-blocking dequeues
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌────────────────────────┐
//! │  Sequencer   │───▶│  WorkQueue   │───▶│  worker-0 .. worker-N  │
//! │ ordered list │    │ FIFO, once   │    │ dequeue → bind → exec  │
//! └──────────────┘    └──────────────┘    └────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use parloop::parallel::{ExecutionStrategy, WorkQueue};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let queue = WorkQueue::new(vec!["a".into(), "b".into(), "c".into()]);
//! let seen = AtomicUsize::new(0);
//! let strategy = ExecutionStrategy::for_workload(2, queue.enqueued());
//! strategy
//!     .run(|_worker_id| {
//!         while queue.dequeue().is_some() {
//!             seen.fetch_add(1, Ordering::Relaxed);
//!         }
//!     })
//!     .unwrap();
//! assert_eq!(seen.load(Ordering::Relaxed), 3);
//! ```

pub mod core;
pub mod queue;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use self::core::ExecutionStrategy;
pub use queue::{QueuedItem, WorkQueue};

/// Identity of a worker within one run. The sequential path is worker 0.
pub type WorkerId = usize;

/// Lock a bookkeeping mutex. A worker that panicked while holding one of these
/// locks cannot leave the data half-updated, so poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
