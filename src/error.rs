//! Error types for scheduler construction.
//!
//! The scheduler can only fail while being built: either the configuration
//! is rejected or the OS refuses to spawn a worker thread. Everything after
//! construction is infallible by contract. Precondition violations (wiring
//! a dependency after submission, submitting a cycle) are debug-asserted
//! where cheap and otherwise manifest as a stalled `wait_all`, and a
//! panicking work closure is absorbed at the worker boundary rather than
//! reported as an error.

use core::fmt;
use std::io;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Spawning an OS worker thread failed.
    WorkerSpawn,
    /// A configuration value was rejected (zero workers, zero stack size).
    InvalidConfig,
}

impl ErrorKind {
    /// Returns a short static description of this error kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WorkerSpawn => "worker thread spawn failed",
            Self::InvalidConfig => "invalid scheduler configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error produced while constructing a [`Scheduler`](crate::Scheduler).
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<io::Error>,
}

impl Error {
    /// Creates an error with no additional context.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Creates an error with a human-readable detail message.
    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
            source: None,
        }
    }

    pub(crate) fn worker_spawn(source: io::Error) -> Self {
        Self {
            kind: ErrorKind::WorkerSpawn,
            message: None,
            source: Some(source),
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {message}", self.kind),
            None => self.kind.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail_message() {
        let err =
            Error::with_message(ErrorKind::InvalidConfig, "worker_threads must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid scheduler configuration: worker_threads must be at least 1"
        );
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn spawn_error_carries_io_source() {
        let err = Error::worker_spawn(io::Error::new(io::ErrorKind::Other, "out of threads"));
        assert_eq!(err.kind(), ErrorKind::WorkerSpawn);
        assert!(std::error::Error::source(&err).is_some());
    }
}
