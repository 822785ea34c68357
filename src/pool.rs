//! Fixed-size pool of OS worker threads.
//!
//! Each worker loops on the shared [`ReadyQueue`]: pop one ready task, run
//! it outside the queue lock, repeat. The loop exits only when the queue
//! reports shutdown with nothing left to drain, so every task accepted
//! before (or during) shutdown still runs and `shutdown` joining every
//! worker is deterministic.

use crate::config::SchedulerConfig;
use crate::error::Error;
use crate::queue::ReadyQueue;
use crate::task::Task;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, trace};

pub(crate) struct WorkerPool {
    queue: Arc<ReadyQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns the configured number of named worker threads.
    ///
    /// On any spawn failure the already-running workers are stopped and
    /// joined before the error is returned, so no partial pool escapes.
    pub(crate) fn new(config: &SchedulerConfig) -> Result<Self, Error> {
        let queue = Arc::new(ReadyQueue::new());
        let mut workers = Vec::with_capacity(config.worker_threads);

        for index in 0..config.worker_threads {
            let builder = std::thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name_prefix))
                .stack_size(config.thread_stack_size);
            let worker_queue = Arc::clone(&queue);
            match builder.spawn(move || worker_loop(index, &worker_queue)) {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    queue.close();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(Error::worker_spawn(source));
                }
            }
        }

        debug!(workers = workers.len(), "worker pool started");
        Ok(Self { queue, workers })
    }

    /// The shared ready queue; the scheduler captures clones of this in
    /// completion hooks.
    pub(crate) fn queue(&self) -> &Arc<ReadyQueue> {
        &self.queue
    }

    /// Hands a ready task to the workers.
    pub(crate) fn submit(&self, task: Task) {
        self.queue.push(task);
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Signals stop, wakes all workers, and joins them. In-flight tasks
    /// finish first and the queue is drained before any worker exits.
    pub(crate) fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        debug!("worker pool shutting down");
        self.queue.close();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                // Work-closure panics are caught inside Task::execute, so a
                // worker can only die from a bug in the dispatch loop itself.
                error!("worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(worker_id: usize, queue: &ReadyQueue) {
    trace!(worker_id, "worker started");
    while let Some(task) = queue.pop() {
        trace!(worker_id, task_id = task.get_id(), "dispatching task");
        task.execute();
    }
    trace!(worker_id, "worker stopped");
}
