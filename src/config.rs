//! Scheduler configuration types.
//!
//! These types hold the concrete values that drive pool behavior. In most
//! cases you should use [`Scheduler::builder`](crate::Scheduler::builder)
//! (or plain [`Scheduler::new`](crate::Scheduler::new)) rather than creating
//! a [`SchedulerConfig`] directly.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `worker_threads` | available CPU parallelism |
//! | `thread_name_prefix` | `"dagpool-worker"` |
//! | `thread_stack_size` | 2 MiB |

use crate::error::{Error, ErrorKind};
use crate::scheduler::Scheduler;

/// Default worker thread stack size: 2 MiB.
pub(crate) const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Default worker thread name prefix.
pub(crate) const DEFAULT_THREAD_NAME_PREFIX: &str = "dagpool-worker";

/// Configuration for a [`Scheduler`] and its worker pool.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of OS worker threads. Must be at least 1.
    pub worker_threads: usize,
    /// Prefix for worker thread names; the worker index is appended.
    pub thread_name_prefix: String,
    /// Stack size for each worker thread, in bytes.
    pub thread_stack_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: std::thread::available_parallelism().map_or(1, usize::from),
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            thread_stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl SchedulerConfig {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.worker_threads == 0 {
            return Err(Error::with_message(
                ErrorKind::InvalidConfig,
                "worker_threads must be at least 1",
            ));
        }
        if self.thread_stack_size == 0 {
            return Err(Error::with_message(
                ErrorKind::InvalidConfig,
                "thread_stack_size must be nonzero",
            ));
        }
        Ok(())
    }
}

/// Builder for a [`Scheduler`].
///
/// ```
/// let scheduler = dagpool::Scheduler::builder()
///     .worker_threads(2)
///     .thread_name_prefix("pipeline")
///     .build()?;
/// scheduler.wait_all();
/// # Ok::<(), dagpool::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
}

impl SchedulerBuilder {
    /// Creates a builder populated with the defaults above.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of worker threads.
    #[must_use]
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    /// Sets the worker thread name prefix.
    #[must_use]
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Sets the per-worker stack size in bytes.
    #[must_use]
    pub fn thread_stack_size(mut self, bytes: usize) -> Self {
        self.config.thread_stack_size = bytes;
        self
    }

    /// Validates the configuration and starts the scheduler.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidConfig`] for a rejected value,
    /// [`ErrorKind::WorkerSpawn`] if the OS refuses to create a worker
    /// thread. No partially started scheduler escapes: on spawn failure the
    /// already-running workers are stopped and joined first.
    pub fn build(self) -> Result<Scheduler, Error> {
        Scheduler::with_config(self.config)
    }
}
