//! Task: identity, lifecycle state, dependency wiring, and the completion
//! protocol.
//!
//! A [`Task`] is a cheap cloneable handle onto one underlying unit of work.
//! Clones share the same state, so a caller can keep a handle around to
//! observe progress after submitting another clone to the scheduler. Edges
//! point forward only (a predecessor holds handles to its dependents, never
//! the reverse), so the ownership graph of a DAG is itself acyclic and every
//! task stays alive until the last task referencing it has completed.
//!
//! # Lifecycle
//!
//! `Pending -> Running -> Completed`, strictly monotonic. On completion the
//! task runs the completion protocol in order:
//!
//! 1. publish `Completed` (release store);
//! 2. decrement each dependent's predecessor counter;
//! 3. invoke the scheduler-installed completion hook exactly once.
//!
//! None of the crate's mutexes (successor list, ready queue, registry) is
//! held while the work closure runs or while the protocol executes.

use crate::types::{TaskId, TaskState};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::error;

type Work = Box<dyn FnOnce() + Send + 'static>;

/// Hook installed by the scheduler before a task can reach a worker;
/// invoked exactly once, as the final step of the completion protocol.
pub(crate) type CompletionHook = Box<dyn FnOnce(&Task) + Send + 'static>;

/// Inline capacity for successor lists. Most DAG nodes fan out to a handful
/// of dependents; larger fan-outs spill to the heap.
const INLINE_DEPENDENTS: usize = 4;

pub(crate) type TaskList = SmallVec<[Task; INLINE_DEPENDENTS]>;

struct TaskInner {
    id: TaskId,
    /// `TaskState` as its raw repr; release stores, acquire loads.
    state: AtomicU8,
    /// Number of predecessors that have not yet completed. The task is
    /// ready iff this is zero.
    pending_deps: AtomicU32,
    /// Set by `submit` once the task is registered and its hook installed.
    /// A completed predecessor only promotes dependents that are submitted.
    submitted: AtomicBool,
    /// Exactly-once enqueue claim, won by CAS from either the submitting
    /// thread or a completing predecessor's hook.
    scheduled: AtomicBool,
    /// Records an unwinding work closure (see `execute`).
    panicked: AtomicBool,
    /// Single-shot work closure; taken exactly once.
    work: Mutex<Option<Work>>,
    /// Successor handles. Appended to only while this task is `Pending`;
    /// frozen (read-only) from the moment it starts running.
    dependents: Mutex<TaskList>,
    on_complete: Mutex<Option<CompletionHook>>,
}

/// A unit of work with identity, lifecycle state, and dependency metadata.
///
/// Construct with [`Task::new`], wire edges with [`Task::add_dependency`],
/// then hand the task to [`Scheduler::submit`](crate::Scheduler::submit).
/// All dependency wiring must happen before either endpoint is submitted;
/// submission freezes the reachable graph.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    /// Creates a task in `Pending` state with no predecessors.
    pub fn new(id: TaskId, work: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id,
                state: AtomicU8::new(TaskState::Pending as u8),
                pending_deps: AtomicU32::new(0),
                submitted: AtomicBool::new(false),
                scheduled: AtomicBool::new(false),
                panicked: AtomicBool::new(false),
                work: Mutex::new(Some(Box::new(work))),
                dependents: Mutex::new(TaskList::new()),
                on_complete: Mutex::new(None),
            }),
        }
    }

    /// Returns the caller-supplied identifier.
    #[inline]
    #[must_use]
    pub fn get_id(&self) -> TaskId {
        self.inner.id
    }

    /// Returns the current lifecycle state (acquire load).
    #[inline]
    #[must_use]
    pub fn get_state(&self) -> TaskState {
        TaskState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Returns `true` iff every declared predecessor has completed.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.pending_deps.load(Ordering::Acquire) == 0
    }

    /// Returns `true` if the work closure unwound instead of returning.
    #[inline]
    #[must_use]
    pub fn has_panicked(&self) -> bool {
        self.inner.panicked.load(Ordering::Acquire)
    }

    /// Declares that `self` executes only after `pred` has completed.
    ///
    /// Must be called while both tasks are `Pending` and before `self` is
    /// submitted; submission freezes the graph. Wiring the same edge twice
    /// is safe (the counter increment and list entry stay paired) but means
    /// `pred` is waited for twice.
    pub fn add_dependency(&self, pred: &Task) {
        debug_assert_eq!(
            self.get_state(),
            TaskState::Pending,
            "add_dependency on task {} after it left Pending",
            self.inner.id,
        );
        debug_assert_eq!(
            pred.get_state(),
            TaskState::Pending,
            "add_dependency on task {} with non-pending predecessor {}",
            self.inner.id,
            pred.inner.id,
        );
        debug_assert!(
            !self.inner.submitted.load(Ordering::Acquire),
            "add_dependency on task {} after submission",
            self.inner.id,
        );

        self.inner.pending_deps.fetch_add(1, Ordering::AcqRel);
        pred.inner.dependents.lock().push(self.clone());
    }

    /// Runs the work closure and the completion protocol.
    ///
    /// Must only be called once all predecessors have completed; not
    /// idempotent. The scheduler's exactly-once enqueue claim guarantees a
    /// single call for submitted tasks; calling it directly is only
    /// legitimate for free-standing tasks that were never submitted.
    pub fn execute(&self) {
        debug_assert!(
            self.is_ready(),
            "execute on task {} with unsatisfied dependencies",
            self.inner.id,
        );

        // Pending -> Running. Losing the exchange means execute was already
        // called; a second call must not regress the state machine.
        let entered = self
            .inner
            .state
            .compare_exchange(
                TaskState::Pending as u8,
                TaskState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        debug_assert!(entered, "execute called twice on task {}", self.inner.id);
        if !entered {
            return;
        }

        let work = self.inner.work.lock().take();
        debug_assert!(work.is_some(), "task {} lost its work closure", self.inner.id);
        if let Some(work) = work {
            // An unwinding closure still completes for scheduling purposes:
            // dependents and wait_all must not be stranded by a user panic.
            if catch_unwind(AssertUnwindSafe(work)).is_err() {
                self.inner.panicked.store(true, Ordering::Release);
                error!(task_id = self.inner.id, "work closure panicked; completing anyway");
            }
        }

        self.inner
            .state
            .store(TaskState::Completed as u8, Ordering::Release);

        // Snapshot the successor list before touching any other state. The
        // list froze when this task left Pending, so the clone is complete,
        // and no lock is held across the decrements or the hook below.
        let dependents = self.dependents_snapshot();
        for dependent in &dependents {
            // SeqCst pairs with the SeqCst `submitted`/counter accesses in
            // the submission path: either the submitting thread observes
            // this decrement, or this task's hook observes the submitted
            // flag. Weaker orderings allow both sides to miss (store-buffer
            // interleaving) and strand the dependent forever.
            let prev = dependent.inner.pending_deps.fetch_sub(1, Ordering::SeqCst);
            debug_assert!(
                prev > 0,
                "pending_deps underflow on task {}",
                dependent.inner.id,
            );
        }

        if let Some(hook) = self.inner.on_complete.lock().take() {
            hook(self);
        }
    }

    /// Clones the successor list out of its mutex.
    pub(crate) fn dependents_snapshot(&self) -> TaskList {
        self.inner.dependents.lock().clone()
    }

    /// Installs the completion hook. The scheduler calls this before the
    /// task can reach a worker, so `execute` always observes it.
    pub(crate) fn set_on_complete(&self, hook: CompletionHook) {
        let previous = self.inner.on_complete.lock().replace(hook);
        debug_assert!(
            previous.is_none(),
            "completion hook installed twice on task {}",
            self.inner.id,
        );
    }

    /// Marks the task submitted and reports whether it is already ready,
    /// i.e. whether the submitting thread should try to claim the enqueue.
    ///
    /// See the ordering note in `execute`: the SeqCst store/load pair here
    /// and the SeqCst decrement there guarantee at least one of the two
    /// racing sides observes the other.
    pub(crate) fn publish_submitted(&self) -> bool {
        let already = self.inner.submitted.swap(true, Ordering::SeqCst);
        debug_assert!(!already, "task {} submitted twice", self.inner.id);
        self.inner.pending_deps.load(Ordering::SeqCst) == 0
    }

    /// Readiness check used by a completed predecessor's hook: only
    /// submitted tasks are promoted, and only once their counter is zero.
    pub(crate) fn promotable(&self) -> bool {
        self.inner.submitted.load(Ordering::SeqCst)
            && self.inner.pending_deps.load(Ordering::SeqCst) == 0
    }

    /// Claims the single enqueue of this task. Racing claimants (the
    /// submitting thread, hooks of several predecessors completing at once)
    /// all call this; exactly one wins.
    pub(crate) fn try_claim_schedule(&self) -> bool {
        self.inner
            .scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[cfg(test)]
    pub(crate) fn pending_deps(&self) -> u32 {
        self.inner.pending_deps.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("state", &self.get_state())
            .field("pending_deps", &self.inner.pending_deps.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, AtomicUsize};
    use std::sync::Arc;

    #[test]
    fn execute_runs_work_and_completes() {
        let counter = Arc::new(AtomicI64::new(41));
        let c = counter.clone();
        let task = Task::new(1, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(task.get_state(), TaskState::Pending);
        assert!(task.is_ready());

        task.execute();

        assert_eq!(counter.load(Ordering::SeqCst), 42);
        assert_eq!(task.get_state(), TaskState::Completed);
    }

    #[test]
    fn independent_tasks_execute_independently() {
        let counters: Vec<_> = [41, 401, 1870]
            .iter()
            .map(|&start| Arc::new(AtomicI64::new(start)))
            .collect();
        let tasks: Vec<_> = counters
            .iter()
            .enumerate()
            .map(|(i, counter)| {
                let c = counter.clone();
                Task::new(i as u64 + 2, move || {
                    c.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in &tasks {
            assert_eq!(task.get_state(), TaskState::Pending);
            task.execute();
        }

        assert_eq!(counters[0].load(Ordering::SeqCst), 42);
        assert_eq!(counters[1].load(Ordering::SeqCst), 402);
        assert_eq!(counters[2].load(Ordering::SeqCst), 1871);
        assert!(tasks.iter().all(|t| t.get_state() == TaskState::Completed));
    }

    #[test]
    fn id_is_preserved() {
        let n = Arc::new(AtomicI64::new(11));
        let shared = n.clone();
        let task = Task::new(5, move || {
            let v = shared.load(Ordering::SeqCst);
            shared.store(v * v + 3 * v - 49, Ordering::SeqCst);
        });

        task.execute();

        assert_eq!(n.load(Ordering::SeqCst), 105);
        assert_eq!(task.get_id(), 5);
    }

    #[test]
    fn wiring_increments_counter_and_successor_list() {
        let pred = Task::new(1, || {});
        let succ = Task::new(2, || {});

        succ.add_dependency(&pred);

        assert_eq!(succ.pending_deps(), 1);
        assert!(!succ.is_ready());
        assert!(pred.is_ready());
        assert_eq!(pred.dependents_snapshot().len(), 1);
        assert_eq!(pred.dependents_snapshot()[0].get_id(), 2);
    }

    #[test]
    fn completion_decrements_each_dependent() {
        let pred = Task::new(1, || {});
        let a = Task::new(2, || {});
        let b = Task::new(3, || {});
        a.add_dependency(&pred);
        b.add_dependency(&pred);
        b.add_dependency(&pred); // double edge: waited for twice

        assert_eq!(a.pending_deps(), 1);
        assert_eq!(b.pending_deps(), 2);

        pred.execute();

        assert_eq!(a.pending_deps(), 0);
        assert!(a.is_ready());
        assert_eq!(b.pending_deps(), 1);
        assert!(!b.is_ready());
    }

    #[test]
    fn hook_runs_once_after_decrements() {
        let pred = Task::new(1, || {});
        let succ = Task::new(2, || {});
        succ.add_dependency(&pred);

        let observed = Arc::new(AtomicUsize::new(usize::MAX));
        let o = observed.clone();
        let s = succ.clone();
        pred.set_on_complete(Box::new(move |completed| {
            assert_eq!(completed.get_id(), 1);
            assert_eq!(completed.get_state(), TaskState::Completed);
            // Decrements happen before the hook.
            o.store(s.pending_deps() as usize, Ordering::SeqCst);
        }));

        pred.execute();

        assert_eq!(observed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_work_still_completes() {
        let task = Task::new(7, || panic!("boom"));

        task.execute();

        assert_eq!(task.get_state(), TaskState::Completed);
        assert!(task.has_panicked());
    }

    #[test]
    fn panicking_work_still_releases_dependents() {
        let pred = Task::new(1, || panic!("boom"));
        let succ = Task::new(2, || {});
        succ.add_dependency(&pred);

        pred.execute();

        assert!(succ.is_ready());
    }

    #[test]
    fn schedule_claim_is_exclusive() {
        let task = Task::new(1, || {});
        assert!(task.try_claim_schedule());
        assert!(!task.try_claim_schedule());
    }

    #[test]
    fn publish_submitted_reports_readiness() {
        let ready = Task::new(1, || {});
        assert!(ready.publish_submitted());

        let pred = Task::new(2, || {});
        let waiting = Task::new(3, || {});
        waiting.add_dependency(&pred);
        assert!(!waiting.publish_submitted());
        assert!(!waiting.promotable());

        pred.execute();
        assert!(waiting.promotable());
    }

    #[test]
    fn clones_share_state() {
        let task = Task::new(9, || {});
        let observer = task.clone();

        task.execute();

        assert_eq!(observer.get_state(), TaskState::Completed);
    }
}
