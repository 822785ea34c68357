//! Core identifier and state types.

use core::fmt;

/// Caller-supplied task identifier.
///
/// Purely informational: the scheduler does not enforce uniqueness and never
/// keys any lookup on it.
pub type TaskId = u64;

/// Lifecycle state of a task.
///
/// Transitions are strictly `Pending -> Running -> Completed` and never move
/// backward. The state is published with release stores and read with acquire
/// loads, so an observer that sees [`TaskState::Completed`] also sees every
/// write the work closure made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskState {
    /// Waiting: not yet handed to a worker.
    Pending = 0,
    /// A worker is inside the work closure.
    Running = 1,
    /// Terminal: the work closure has returned (or unwound) and the
    /// completion protocol has run.
    Completed = 2,
}

impl TaskState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Pending,
            1 => Self::Running,
            2 => Self::Completed,
            _ => unreachable!("invalid task state {raw}"),
        }
    }

    /// Returns `true` for the terminal state.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}
