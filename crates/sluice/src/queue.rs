//! Bounded task queue shared by all workers.
//!
//! The queue is a single bounded [`mpsc`] channel. Submitters share the
//! sending half; the workers share the receiving half behind an async mutex,
//! so whichever worker is idle first takes the next job.
//!
//! A submission first reserves a slot, then claims a job id, then sends
//! through the reserved permit. There is no suspension point between claiming
//! the id and enqueuing, so a job is either fully accepted (and accounted) or
//! not accepted at all.
//!
//! Closing rejects submissions that start afterwards. A submitter already
//! waiting for space holds its own sender clone and may still be accepted;
//! workers drain the queue until that clone is dropped.

use crate::{Error, Job, JobId, RejectReason, Result, stats::PoolStats};
use parking_lot::Mutex;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{
    Mutex as AsyncMutex,
    mpsc::{self, error::TrySendError},
};
use tokio_util::sync::CancellationToken;

pub(crate) struct TaskQueue<P> {
    tx: Mutex<Option<mpsc::Sender<Job<P>>>>,
    rx: AsyncMutex<mpsc::Receiver<Job<P>>>,
    closed: AtomicBool,
    queued: AtomicUsize,
}

impl<P> TaskQueue<P> {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx: Mutex::new(Some(tx)),
            rx: AsyncMutex::new(rx),
            closed: AtomicBool::new(false),
            queued: AtomicUsize::new(0),
        }
    }

    fn sender(&self) -> Result<mpsc::Sender<Job<P>>> {
        self.tx
            .lock()
            .clone()
            .ok_or(Error::rejected(RejectReason::QueueClosed))
    }

    /// Enqueues `payload`, waiting for space if the queue is full.
    ///
    /// # Errors
    ///
    /// - `QueueClosed` if the queue was closed before a slot was reserved.
    /// - `Cancelled` if `cancel` fires while waiting for space.
    pub(crate) async fn submit(
        &self,
        payload: P,
        cancel: &CancellationToken,
        stats: &PoolStats,
    ) -> Result<JobId> {
        let tx = self.sender()?;

        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(Error::rejected(RejectReason::Cancelled));
            }
            permit = tx.reserve() => {
                permit.map_err(|_| Error::rejected(RejectReason::QueueClosed))?
            }
        };

        Ok(self.enqueue(permit, payload, stats))
    }

    /// Enqueues `payload` only if a slot is free right now.
    ///
    /// # Errors
    ///
    /// - `QueueFull` if the queue is at capacity.
    /// - `QueueClosed` if the queue was closed.
    /// - `Cancelled` if cancellation was already requested.
    pub(crate) fn try_submit(
        &self,
        payload: P,
        cancel: &CancellationToken,
        stats: &PoolStats,
    ) -> Result<JobId> {
        if cancel.is_cancelled() {
            return Err(Error::rejected(RejectReason::Cancelled));
        }

        let tx = self.sender()?;
        let permit = tx.try_reserve().map_err(|e| match e {
            TrySendError::Full(()) => Error::rejected(RejectReason::QueueFull),
            TrySendError::Closed(()) => Error::rejected(RejectReason::QueueClosed),
        })?;

        Ok(self.enqueue(permit, payload, stats))
    }

    fn enqueue(&self, permit: mpsc::Permit<'_, Job<P>>, payload: P, stats: &PoolStats) -> JobId {
        let id = stats.record_submitted();
        self.queued.fetch_add(1, Ordering::AcqRel);
        permit.send(Job::new(id, payload));
        id
    }

    /// Takes the next job, or `None` once the queue is closed and empty.
    ///
    /// Cancel safe: dropping the future before it resolves loses no job.
    pub(crate) async fn recv(&self) -> Option<Job<P>> {
        let job = self.rx.lock().await.recv().await?;
        self.queued.fetch_sub(1, Ordering::AcqRel);
        Some(job)
    }

    /// Drops the pool's sending half. Idempotent.
    ///
    /// Jobs already buffered stay available to workers; submitters that hold a
    /// sender clone mid-submission finish their submission first.
    pub(crate) fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.tx.lock().take();
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of jobs waiting in the queue.
    pub(crate) fn len(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Closes the channel for good and returns every job still buffered.
    ///
    /// Only meaningful once no worker is receiving anymore.
    pub(crate) async fn drain(&self) -> Vec<Job<P>> {
        self.close();

        let mut rx = self.rx.lock().await;
        rx.close();

        // `recv` returns `None` only once the buffer is empty and every
        // outstanding permit has been used or released.
        let mut remaining = Vec::new();
        while let Some(job) = rx.recv().await {
            remaining.push(job);
        }
        self.queued.store(0, Ordering::Release);
        remaining
    }
}
