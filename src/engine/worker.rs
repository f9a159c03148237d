use std::sync::atomic::Ordering;

use crate::parallel::{WorkQueue, WorkerId};
use crate::template::TemplateBinder;

use super::RunState;
use super::context::{ExecutionContext, Interrupt};

/// Body of one worker: drain the queue until it is empty or the pool halts.
pub(crate) fn worker_loop(run: &RunState<'_>, queue: &WorkQueue, worker: WorkerId) {
    let binder = TemplateBinder::new(run.template);
    let mut handled = 0usize;

    loop {
        if run.errors.should_halt() {
            tracing::debug!("[worker-{}] stopping: a failure was recorded", worker);
            break;
        }
        let Some(item) = queue.dequeue() else {
            break;
        };
        if run.errors.should_halt() {
            tracing::debug!("[worker-{}] dropping '{}': a failure was recorded", worker, item.value);
            break;
        }

        run.scopes.begin_iteration(worker, &run.config.property, &item.value);
        run.diagnostics.reset(worker);
        tracing::debug!(
            "[worker-{}] item {}/{}: {}",
            worker,
            item.index + 1,
            queue.enqueued(),
            item.value
        );

        let bound = binder.bind();
        let mut ctx = ExecutionContext::new(run, worker, &item);
        ctx.run_sequence(bound.operations());

        // An item halted before its first node never ran
        let never_started = ctx.interrupt() == Some(Interrupt::Halt) && ctx.executed() == 0;
        if !never_started {
            run.processed.fetch_add(1, Ordering::SeqCst);
            handled += 1;
        }

        match ctx.interrupt() {
            Some(Interrupt::Halt) => break,
            Some(Interrupt::AbandonItem) => {
                tracing::debug!("[worker-{}] abandoned remaining operations for '{}'", worker, item.value);
            }
            None => {}
        }
    }

    run.scopes.release(worker);
    run.diagnostics.reset(worker);
    tracing::trace!("[worker-{}] exiting after {} items", worker, handled);
}
