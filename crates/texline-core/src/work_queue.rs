//! Lock-free work queue for distributing papers across parallel workers

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::shutdown::is_shutdown_requested;

/// Lock-free work queue distributing items to workers.
///
/// Workers call [`next()`](WorkQueue::next) to atomically claim the next item.
/// Once shutdown is requested the queue stops handing out work, so in-flight
/// items finish and nothing new is dispatched.
pub struct WorkQueue<S> {
    items: Vec<S>,
    cursor: AtomicUsize,
}

impl<S> WorkQueue<S> {
    pub fn new(items: Vec<S>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Get next item to process (lock-free), `None` when drained or shutting down
    pub fn next(&self) -> Option<&S> {
        if is_shutdown_requested() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(i)
    }

    /// Total items in queue
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Items handed out so far
    pub fn dispatched(&self) -> usize {
        self.cursor.load(Ordering::Relaxed).min(self.items.len())
    }
}
