use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::error::LoopError;

use super::WorkerId;

/// Execution strategy: run the worker loop on the calling thread, or on a
/// fixed pool of scoped threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Sequential,
    Parallel { workers: usize },
}

impl ExecutionStrategy {
    /// Pick the strategy for `item_count` items.
    ///
    /// # Decision Logic
    /// ```text
    /// limit   = max_threads, or the core count when it is 0
    /// workers = max(1, min(limit, item_count))
    /// workers <= 1  → Sequential              (calling thread, worker 0)
    /// otherwise     → Parallel { workers }    (scoped threads, joined)
    /// ```
    ///
    /// An empty workload is always sequential; the caller is expected to skip
    /// dispatch entirely in that case.
    ///
    /// # Example
    /// ```rust
    /// use parloop::parallel::ExecutionStrategy;
    ///
    /// assert_eq!(ExecutionStrategy::for_workload(8, 1), ExecutionStrategy::Sequential);
    /// assert_eq!(ExecutionStrategy::for_workload(1, 100), ExecutionStrategy::Sequential);
    /// assert_eq!(
    ///     ExecutionStrategy::for_workload(8, 3),
    ///     ExecutionStrategy::Parallel { workers: 3 }
    /// );
    /// ```
    pub fn for_workload(max_threads: usize, item_count: usize) -> Self {
        match Self::effective_workers(Self::calculate_max_workers(max_threads), item_count) {
            0 | 1 => ExecutionStrategy::Sequential,
            workers => ExecutionStrategy::Parallel { workers },
        }
    }

    /// `max(1, min(max_threads, item_count))`
    pub fn effective_workers(max_threads: usize, item_count: usize) -> usize {
        std::cmp::max(1, std::cmp::min(max_threads, item_count))
    }

    /// Resolve the configured thread limit; 0 means one worker per available core.
    pub fn calculate_max_workers(max_threads_config: usize) -> usize {
        if max_threads_config > 0 {
            max_threads_config
        } else {
            std::cmp::max(1, num_cpus::get())
        }
    }

    pub fn workers(&self) -> usize {
        match self {
            ExecutionStrategy::Sequential => 1,
            ExecutionStrategy::Parallel { workers } => *workers,
        }
    }

    /// Run `worker` once per worker and return when every worker has exited.
    ///
    /// Each invocation receives its worker id. A panic escaping `worker` is
    /// reported as [`LoopError::Pool`] after the remaining workers are joined.
    pub fn run<F>(&self, worker: F) -> Result<(), LoopError>
    where
        F: Fn(WorkerId) + Sync,
    {
        match self {
            ExecutionStrategy::Sequential => {
                tracing::debug!("Running sequentially on the calling thread");
                catch_unwind(AssertUnwindSafe(|| worker(0)))
                    .map_err(|_| LoopError::Pool("the sequential worker panicked".to_string()))
            }
            ExecutionStrategy::Parallel { workers } => {
                tracing::debug!("Spawning {} worker threads", workers);
                let worker = &worker;

                crossbeam::thread::scope(|s| -> Result<(), LoopError> {
                    for worker_id in 0..*workers {
                        s.builder()
                            .name(format!("parloop-worker-{worker_id}"))
                            .spawn(move |_| worker(worker_id))
                            .map_err(|e| {
                                LoopError::Pool(format!("failed to spawn worker-{worker_id}: {e}"))
                            })?;
                    }
                    Ok(())
                })
                .map_err(|_| LoopError::Pool("a worker thread panicked".to_string()))?
            }
        }
    }
}
