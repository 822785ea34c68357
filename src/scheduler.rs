//! The scheduler front door: task registration, readiness routing, and
//! completion-driven promotion of dependents.
//!
//! # Promotion protocol
//!
//! Submission installs a completion hook on the task, marks it submitted,
//! and, if it has no unfinished predecessors, enqueues it. A task with
//! unfinished predecessors is not tracked in any separate pending set: when
//! a predecessor completes, its hook walks the predecessor's successor list
//! and enqueues every dependent that is submitted and whose counter reached
//! zero. That keeps each completion O(out-degree).
//!
//! Both the submitting thread and the hooks of concurrently completing
//! predecessors may find the same task ready at the same moment; the
//! per-task schedule claim (a CAS) ensures exactly one of them enqueues it.
//!
//! # wait_all
//!
//! An outstanding-task gate: incremented on submit, decremented as the last
//! step of the completion hook, signalled under the gate mutex when it hits
//! zero. `wait_all` blocks on the gate's condition variable instead of
//! polling task states.

use crate::config::{SchedulerBuilder, SchedulerConfig};
use crate::error::Error;
use crate::pool::WorkerPool;
use crate::queue::ReadyQueue;
use crate::task::{Task, TaskList};
use parking_lot::Mutex as RegistryMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// Count of submitted-but-not-completed tasks plus the condition variable
/// `wait_all` blocks on. The zero signal is raised while the mutex is held,
/// which rules out lost wakeups.
#[derive(Debug, Default)]
struct OutstandingGate {
    count: Mutex<usize>,
    zero: Condvar,
}

impl OutstandingGate {
    #[inline]
    fn lock_unpoisoned(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn increment(&self) {
        *self.lock_unpoisoned() += 1;
    }

    fn decrement(&self) {
        let mut count = self.lock_unpoisoned();
        debug_assert!(*count > 0, "outstanding task counter underflow");
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.zero.notify_all();
        }
    }

    fn wait_zero(&self) {
        let mut count = self.lock_unpoisoned();
        while *count > 0 {
            count = self
                .zero
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// State shared between the scheduler handle and the completion hooks
/// running on worker threads.
struct Shared {
    /// Every submitted task, pinned for the scheduler's lifetime so
    /// successor-list traversal after a completed `execute` is always safe.
    all_tasks: RegistryMutex<Vec<Task>>,
    outstanding: OutstandingGate,
    panicked: AtomicUsize,
    queue: Arc<ReadyQueue>,
}

impl Shared {
    /// Completion hook body. Runs on the worker that executed `completed`,
    /// after the `Completed` transition and after every dependent's counter
    /// was decremented.
    fn on_task_completed(&self, completed: &Task) {
        if completed.has_panicked() {
            self.panicked.fetch_add(1, Ordering::AcqRel);
        }

        // Promote dependents whose final predecessor just finished. No
        // queue or registry lock is held while scanning; the claim CAS
        // makes each promotion exactly-once under races with the
        // submitting thread and with other completing predecessors.
        let mut ready = TaskList::new();
        for dependent in completed.dependents_snapshot() {
            if dependent.promotable() && dependent.try_claim_schedule() {
                ready.push(dependent);
            }
        }
        for task in ready {
            trace!(
                task_id = task.get_id(),
                completed = completed.get_id(),
                "promoting ready dependent"
            );
            self.queue.push(task);
        }

        self.outstanding.decrement();
    }
}

/// A parallel task scheduler executing a DAG of tasks on a fixed-size pool
/// of worker threads.
///
/// A task begins executing only after all of its declared predecessors have
/// completed; independent tasks run concurrently up to the worker count.
/// [`Scheduler::wait_all`] blocks until every submitted task is terminal,
/// and dropping the scheduler waits for all tasks before joining the pool.
pub struct Scheduler {
    shared: Arc<Shared>,
    pool: WorkerPool,
}

impl Scheduler {
    /// Starts a scheduler with `n_workers` worker threads and default
    /// thread settings.
    ///
    /// # Errors
    ///
    /// Fails for a zero worker count or on OS thread-creation failure; no
    /// partial scheduler is produced.
    pub fn new(n_workers: usize) -> Result<Self, Error> {
        Self::builder().worker_threads(n_workers).build()
    }

    /// Returns a builder for configuring thread count, names, and stack
    /// size.
    #[must_use]
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub(crate) fn with_config(config: SchedulerConfig) -> Result<Self, Error> {
        config.validate()?;
        let pool = WorkerPool::new(&config)?;
        let shared = Arc::new(Shared {
            all_tasks: RegistryMutex::new(Vec::new()),
            outstanding: OutstandingGate::default(),
            panicked: AtomicUsize::new(0),
            queue: Arc::clone(pool.queue()),
        });
        debug!(workers = pool.worker_count(), "scheduler started");
        Ok(Self { shared, pool })
    }

    /// Registers a task and routes it.
    ///
    /// Ready tasks go straight to the pool; a task with unfinished
    /// predecessors is promoted by the completion hook of whichever
    /// predecessor finishes last. Submission order does not constrain
    /// execution order beyond the dependency graph: a dependent may be
    /// submitted before its predecessor.
    ///
    /// The task graph reachable from `task` must be frozen: wiring an edge
    /// into a task after submitting it is out of contract.
    pub fn submit(&self, task: Task) {
        debug_assert_eq!(
            task.get_state(),
            crate::types::TaskState::Pending,
            "submit of task {} in non-pending state",
            task.get_id(),
        );

        self.shared.all_tasks.lock().push(task.clone());
        self.shared.outstanding.increment();

        // The hook must be in place before any worker can possibly run the
        // task, hence before the submitted flag becomes visible below.
        let shared = Arc::clone(&self.shared);
        task.set_on_complete(Box::new(move |completed: &Task| {
            shared.on_task_completed(completed);
        }));

        if task.publish_submitted() && task.try_claim_schedule() {
            trace!(task_id = task.get_id(), "task ready at submission");
            self.pool.submit(task);
        } else {
            trace!(
                task_id = task.get_id(),
                "task waiting for predecessors"
            );
        }
    }

    /// Blocks until every submitted task has reached `Completed`.
    ///
    /// Returns immediately when nothing is outstanding. Liveness holds for
    /// any finite DAG whose work closures terminate; a submitted cycle (out
    /// of contract) stalls here forever.
    pub fn wait_all(&self) {
        self.shared.outstanding.wait_zero();
    }

    /// Number of tasks submitted over this scheduler's lifetime.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.shared.all_tasks.lock().len()
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Number of completed tasks whose work closure panicked. Panicking
    /// tasks still complete for scheduling purposes, so this is the only
    /// place the failure surfaces besides the log.
    #[must_use]
    pub fn panicked_tasks(&self) -> usize {
        self.shared.panicked.load(Ordering::Acquire)
    }
}

impl Drop for Scheduler {
    /// Destruction implies [`Scheduler::wait_all`]: every submitted task
    /// completes, then the pool is stopped and every worker joined.
    fn drop(&mut self) {
        self.wait_all();
        self.pool.shutdown();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("workers", &self.pool.worker_count())
            .field("tasks", &self.task_count())
            .finish_non_exhaustive()
    }
}
