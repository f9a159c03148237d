use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::channel::{Receiver, unbounded};

/// An item taken off the queue, with its position in the ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedItem {
    pub index: usize,
    pub value: String,
}

/// Thread-safe FIFO drained exactly once.
///
/// The whole ordered list is pushed when the queue is built and the sending
/// side is dropped right away, so an empty queue means the work is drained.
/// Dequeue never blocks.
pub struct WorkQueue {
    rx: Receiver<QueuedItem>,
    enqueued: usize,
    dequeued: AtomicUsize,
}

impl WorkQueue {
    pub fn new(items: Vec<String>) -> Self {
        let (tx, rx) = unbounded();
        let mut enqueued = 0;
        for (index, value) in items.into_iter().enumerate() {
            if tx.send(QueuedItem { index, value }).is_err() {
                break;
            }
            enqueued += 1;
        }
        drop(tx);

        Self {
            rx,
            enqueued,
            dequeued: AtomicUsize::new(0),
        }
    }

    /// Take the next item, or `None` once the queue is drained.
    pub fn dequeue(&self) -> Option<QueuedItem> {
        let item = self.rx.try_recv().ok()?;
        self.dequeued.fetch_add(1, Ordering::SeqCst);
        Some(item)
    }

    /// Items still waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn enqueued(&self) -> usize {
        self.enqueued
    }

    pub fn dequeued(&self) -> usize {
        self.dequeued.load(Ordering::SeqCst)
    }
}
