//! dagpool: a parallel DAG task scheduler on a fixed-size worker pool.
//!
//! Callers build a directed acyclic graph of [`Task`]s, wire edges with
//! [`Task::add_dependency`], and hand the graph to a [`Scheduler`]. The
//! scheduler guarantees that a task begins executing only after all of its
//! predecessors have completed, runs independent tasks concurrently up to
//! the worker count, and blocks in [`Scheduler::wait_all`] until every
//! submitted task is terminal.
//!
//! Work closures are opaque: no inputs, no return value; results travel
//! through captured state. The scheduler is responsible for ordering and
//! liveness, nothing else: no priorities, no cancellation, no cycle
//! detection (submitting a cycle is a caller bug and stalls `wait_all`).
//!
//! # Example
//!
//! ```
//! use dagpool::{Scheduler, Task};
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use std::sync::Arc;
//!
//! let scheduler = Scheduler::new(4)?;
//! let data = Arc::new(AtomicI64::new(0));
//!
//! let d = data.clone();
//! let load = Task::new(1, move || d.store(10, Ordering::SeqCst));
//! let d = data.clone();
//! let scale = Task::new(2, move || {
//!     let v = d.load(Ordering::SeqCst);
//!     d.store(v * 2 + 5, Ordering::SeqCst);
//! });
//! scale.add_dependency(&load);
//!
//! scheduler.submit(load);
//! scheduler.submit(scale);
//! scheduler.wait_all();
//!
//! assert_eq!(data.load(Ordering::SeqCst), 25);
//! # Ok::<(), dagpool::Error>(())
//! ```

pub mod config;
pub mod error;
mod pool;
mod queue;
pub mod scheduler;
pub mod task;
pub mod types;

pub use config::{SchedulerBuilder, SchedulerConfig};
pub use error::{Error, ErrorKind};
pub use scheduler::Scheduler;
pub use task::Task;
pub use types::{TaskId, TaskState};

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, Error>;
