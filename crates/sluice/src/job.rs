//! # Jobs and results
//!
//! A [`Job`] is a unit of submitted work: a pool-assigned [`JobId`] plus an
//! opaque payload. Every job that a worker runs to completion yields exactly
//! one [`JobResult`], which references its job by id and carries an
//! [`Outcome`].
//!
//! Results arrive in completion order, not submission order. Because ids are
//! assigned sequentially at submission, they double as sequence numbers for
//! callers that need to restore submission order downstream.

use core::{fmt, time::Duration};

/// Identifier of a job, unique within one pool run.
///
/// Ids are assigned by the pool at submission, starting at 0 and increasing by
/// one for every accepted job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct JobId(u64);

impl JobId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A submitted unit of work. Immutable once submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Job<P> {
    id: JobId,
    payload: P,
}

impl<P> Job<P> {
    pub(crate) const fn new(id: JobId, payload: P) -> Self {
        Self { id, payload }
    }

    pub const fn id(&self) -> JobId {
        self.id
    }

    pub const fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_parts(self) -> (JobId, P) {
        (self.id, self.payload)
    }
}

/// Why a job that ran did not succeed.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum JobFailure {
    /// The processor returned an error.
    Failed { message: String },
    /// The processor panicked. The panic was caught at the worker boundary.
    Panicked { message: String },
}

impl JobFailure {
    pub fn message(&self) -> &str {
        match self {
            JobFailure::Failed { message } | JobFailure::Panicked { message } => message,
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobFailure::Failed { message } => write!(f, "failed: {message}"),
            JobFailure::Panicked { message } => write!(f, "panicked: {message}"),
        }
    }
}

/// Success/failure discriminator of a [`JobResult`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Outcome<O> {
    Success(O),
    Failure(JobFailure),
}

impl<O> Outcome<O> {
    pub const fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub const fn is_panic(&self) -> bool {
        matches!(self, Outcome::Failure(JobFailure::Panicked { .. }))
    }

    pub fn success(self) -> Option<O> {
        match self {
            Outcome::Success(output) => Some(output),
            Outcome::Failure(_) => None,
        }
    }

    pub const fn failure(&self) -> Option<&JobFailure> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure),
        }
    }
}

/// The outcome of exactly one job.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobResult<O> {
    job_id: JobId,
    worker_id: usize,
    elapsed: Duration,
    outcome: Outcome<O>,
}

impl<O> JobResult<O> {
    pub(crate) const fn new(
        job_id: JobId,
        worker_id: usize,
        elapsed: Duration,
        outcome: Outcome<O>,
    ) -> Self {
        Self {
            job_id,
            worker_id,
            elapsed,
            outcome,
        }
    }

    /// Id of the job this result belongs to.
    pub const fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Index of the worker that ran the job.
    pub const fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Wall time spent inside the processor.
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub const fn outcome(&self) -> &Outcome<O> {
        &self.outcome
    }

    pub const fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn into_outcome(self) -> Outcome<O> {
        self.outcome
    }
}
