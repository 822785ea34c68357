//! FIFO ready queue shared between the scheduler and the worker pool.
//!
//! One mutex, one condition variable. Producers push and signal a single
//! waiter; consumers wait on `stop || !empty` in predicate form (spurious
//! wakeups are harmless), pop one task, and release the lock before running
//! it. After `close` the queue drains: tasks already accepted are still
//! handed out, and a consumer sees `None` only once the queue is empty with
//! the stop flag set, which makes shutdown deterministic.
//!
//! Lock poisoning is recovered rather than propagated: every consumer
//! re-checks the predicate under the mutex, so a panic on another thread
//! cannot leave the queue state inconsistent.

use crate::task::Task;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub(crate) struct ReadyQueue {
    inner: Mutex<QueueInner>,
    cvar: Condvar,
}

#[derive(Debug)]
struct QueueInner {
    tasks: VecDeque<Task>,
    stop: bool,
}

impl ReadyQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                tasks: VecDeque::new(),
                stop: false,
            }),
            cvar: Condvar::new(),
        }
    }

    #[inline]
    fn lock_unpoisoned(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues a ready task and wakes one idle worker.
    pub(crate) fn push(&self, task: Task) {
        let mut inner = self.lock_unpoisoned();
        inner.tasks.push_back(task);
        drop(inner);
        self.cvar.notify_one();
    }

    /// Blocks until a task is available or shutdown has drained the queue.
    ///
    /// Returns `None` only when the stop flag is set and the queue is
    /// empty. A task popped with the stop flag already set is still
    /// returned, so accepted work is honored.
    pub(crate) fn pop(&self) -> Option<Task> {
        let mut inner = self.lock_unpoisoned();
        loop {
            if let Some(task) = inner.tasks.pop_front() {
                return Some(task);
            }
            if inner.stop {
                return None;
            }
            inner = self
                .cvar
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Sets the stop flag and wakes every waiting worker.
    pub(crate) fn close(&self) {
        let mut inner = self.lock_unpoisoned();
        inner.stop = true;
        drop(inner);
        self.cvar.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock_unpoisoned().tasks.len()
    }
}
