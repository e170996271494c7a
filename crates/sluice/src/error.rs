//! Error types for the worker pool.
//!
//! This module defines the central [`Error`] enum, which captures every
//! reportable failure of the pool's public operations. Failures of individual
//! jobs are *not* errors at this level: they travel inside a
//! [`JobResult`](crate::JobResult) as a [`JobFailure`](crate::JobFailure) so a
//! consumer can tell "the job ran and failed" apart from "the job never ran".
//!
//! ## Error Cases
//! - `SubmissionRejected`: the queue refused a job (full, closed, or cancelled).
//! - `PoolAlreadyClosed`: the pool reached its terminal state.
//! - `InvalidState`: a lifecycle operation was called in the wrong state.
//! - `InvalidConfig`: the pool configuration failed validation.
//! - `ResultsAlreadyTaken`: the result stream was already handed out.
//! - `WorkerJoin`: a worker task could not be joined.

use crate::PoolState;
use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Why the task queue refused a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// The queue is at capacity and the submission was non-blocking.
    QueueFull,
    /// The queue was closed by `close_and_wait`.
    QueueClosed,
    /// Cancellation fired before the job could be enqueued.
    Cancelled,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::QueueFull => write!(f, "queue is full"),
            RejectReason::QueueClosed => write!(f, "queue is closed"),
            RejectReason::Cancelled => write!(f, "pool was cancelled"),
        }
    }
}

/// Unified error type for pool operations.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The job was not accepted into the task queue.
    #[error("Submission rejected: {reason}")]
    SubmissionRejected { reason: RejectReason },

    /// The pool is closed and cannot accept work or be restarted.
    #[error("Pool is already closed")]
    PoolAlreadyClosed,

    /// A lifecycle operation was attempted in a state that does not allow it.
    #[error("Cannot {operation} a pool in state {state}")]
    InvalidState {
        operation: &'static str,
        state: PoolState,
    },

    /// The pool configuration is unusable.
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// The result stream can only be taken once per pool.
    #[error("Result stream was already taken")]
    ResultsAlreadyTaken,

    /// A worker task terminated abnormally and could not be joined.
    #[error("Worker join error: {context}")]
    WorkerJoin { context: String },
}

impl Error {
    pub(crate) const fn rejected(reason: RejectReason) -> Self {
        Self::SubmissionRejected { reason }
    }

    /// Returns `true` if this error means the job was refused by the queue
    /// (including refusals caused by a closed pool).
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::SubmissionRejected { .. } | Self::PoolAlreadyClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason() {
        let err = Error::rejected(RejectReason::QueueFull);
        assert_eq!(err.to_string(), "Submission rejected: queue is full");

        let err = Error::InvalidState {
            operation: "start",
            state: PoolState::Closed,
        };
        assert_eq!(err.to_string(), "Cannot start a pool in state closed");
    }

    #[test]
    fn closed_pool_counts_as_rejection() {
        assert!(Error::PoolAlreadyClosed.is_rejection());
        assert!(Error::rejected(RejectReason::Cancelled).is_rejection());
        assert!(!Error::ResultsAlreadyTaken.is_rejection());
    }
}
