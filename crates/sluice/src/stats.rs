//! Per-pool accounting.
//!
//! Every job accepted by the task queue lands in exactly one bucket before
//! [`close_and_wait`](crate::WorkerPool::close_and_wait) returns:
//!
//! - delivered: a result reached the sink (`succeeded`, `failed`, `panicked`)
//! - `interrupted`: the job started, but cancellation dropped its result
//! - `abandoned`: the job was never started because cancellation came first
//! - `undelivered`: a result was produced, but the result stream was dropped
//!
//! The counters live on the pool instance and are shared with its workers
//! through an `Arc`; nothing here is process-global.

use crate::{JobFailure, JobId, Outcome};
use parking_lot::Mutex;
use portable_atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub(crate) struct PoolStats {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    undelivered: AtomicU64,
    interrupted: Mutex<Vec<JobId>>,
    abandoned: Mutex<Vec<JobId>>,
}

impl PoolStats {
    /// Claims the next job id and counts the job as submitted.
    pub(crate) fn record_submitted(&self) -> JobId {
        JobId::new(self.submitted.fetch_add(1, Ordering::AcqRel))
    }

    pub(crate) fn record_delivered<O>(&self, outcome: &Outcome<O>) {
        let counter = match outcome {
            Outcome::Success(_) => &self.succeeded,
            Outcome::Failure(JobFailure::Failed { .. }) => &self.failed,
            Outcome::Failure(JobFailure::Panicked { .. }) => &self.panicked,
        };
        counter.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_undelivered(&self) {
        self.undelivered.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_interrupted(&self, id: JobId) {
        self.interrupted.lock().push(id);
    }

    pub(crate) fn record_abandoned(&self, id: JobId) {
        self.abandoned.lock().push(id);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Acquire),
            succeeded: self.succeeded.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            panicked: self.panicked.load(Ordering::Acquire),
            undelivered: self.undelivered.load(Ordering::Acquire),
            interrupted: self.interrupted.lock().len() as u64,
            abandoned: self.abandoned.lock().len() as u64,
        }
    }

    pub(crate) fn report(&self, cancelled: bool) -> PoolReport {
        let mut interrupted = self.interrupted.lock().clone();
        let mut abandoned = self.abandoned.lock().clone();
        interrupted.sort_unstable();
        abandoned.sort_unstable();

        PoolReport {
            submitted: self.submitted.load(Ordering::Acquire),
            succeeded: self.succeeded.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            panicked: self.panicked.load(Ordering::Acquire),
            undelivered: self.undelivered.load(Ordering::Acquire),
            interrupted,
            abandoned,
            cancelled,
        }
    }
}

/// Point-in-time counters of a running pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub panicked: u64,
    pub undelivered: u64,
    pub interrupted: u64,
    pub abandoned: u64,
}

impl StatsSnapshot {
    /// Jobs that have reached a final bucket so far.
    pub const fn settled(&self) -> u64 {
        self.succeeded + self.failed + self.panicked + self.undelivered + self.interrupted
            + self.abandoned
    }
}

/// Final accounting of a closed pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolReport {
    /// Jobs accepted by the task queue.
    pub submitted: u64,
    /// Results delivered with [`Outcome::Success`].
    pub succeeded: u64,
    /// Results delivered with [`JobFailure::Failed`].
    pub failed: u64,
    /// Results delivered with [`JobFailure::Panicked`].
    pub panicked: u64,
    /// Results produced after the consumer dropped the result stream.
    pub undelivered: u64,
    /// Jobs that started but whose result was dropped on cancellation.
    pub interrupted: Vec<JobId>,
    /// Jobs that were never started because cancellation fired first.
    pub abandoned: Vec<JobId>,
    /// Whether cancellation was requested during the pool's lifetime.
    pub cancelled: bool,
}

impl PoolReport {
    /// Results that reached the sink.
    pub const fn delivered(&self) -> u64 {
        self.succeeded + self.failed + self.panicked
    }

    /// Returns `true` if every submitted job is in exactly one bucket.
    pub fn is_balanced(&self) -> bool {
        self.submitted
            == self.delivered()
                + self.undelivered
                + self.interrupted.len() as u64
                + self.abandoned.len() as u64
    }
}
