//! Pool supervisor.
//!
//! This module defines [`WorkerPool`], which owns the worker lifecycle end to
//! end: it spawns a fixed set of tokio workers over one shared bounded task
//! queue, accepts submissions, broadcasts cancellation through a shared
//! [`CancellationToken`], and shuts down in ordered phases so that the result
//! sink is finalized only after every worker has reported exit.

use super::worker::{WorkerShared, worker_loop};
use crate::{
    CancelHandle, Error, JobId, JobResult, PoolConfig, PoolReport, PoolState, Result,
    ResultStream, StatsSnapshot,
    barrier::JoinBarrier,
    processor::Processor,
    queue::TaskQueue,
    sink,
    state::StateCell,
    stats::PoolStats,
};
use core::time::Duration;
use parking_lot::Mutex;
use portable_atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

/// A bounded pool of asynchronous workers with cooperative cancellation.
///
/// Lifecycle: `Created -> Running -> Draining -> Closed`.
///
/// - [`new`](Self::new) builds the queue and sink (`Created`). Jobs may already
///   be submitted; they wait in the queue.
/// - [`start`](Self::start) spawns the workers (`Running`).
/// - [`cancel`](Self::cancel) or [`close_and_wait`](Self::close_and_wait)
///   move the pool to `Draining`.
/// - `close_and_wait` returns once every worker has exited (`Closed`).
///
/// All methods take `&self`; wrap the pool in an [`Arc`] to share it between
/// producer, consumer, and supervisor tasks.
///
/// Dropping a pool that is not closed cancels it, so its workers exit instead
/// of lingering on the runtime.
pub struct WorkerPool<P, Pr>
where
    Pr: Processor<P>,
{
    config: PoolConfig,
    processor: Arc<Pr>,
    queue: Arc<TaskQueue<P>>,
    stats: Arc<PoolStats>,
    state: Arc<StateCell>,
    cancel: CancellationToken,
    barrier: JoinBarrier,
    results_tx: Mutex<Option<mpsc::Sender<JobResult<Pr::Output>>>>,
    results_rx: Mutex<Option<ResultStream<Pr::Output>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    closing: AtomicBool,
}

impl<P, Pr> WorkerPool<P, Pr>
where
    P: Send + 'static,
    Pr: Processor<P>,
{
    /// Builds a pool in the `Created` state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` fails validation.
    pub fn new(config: PoolConfig, processor: Pr) -> Result<Self> {
        config.validate()?;

        let (results_tx, results_rx) = sink::channel(config.result_capacity);

        Ok(Self {
            queue: Arc::new(TaskQueue::new(config.queue_capacity)),
            processor: Arc::new(processor),
            stats: Arc::new(PoolStats::default()),
            state: Arc::new(StateCell::new()),
            cancel: CancellationToken::new(),
            barrier: JoinBarrier::new(),
            results_tx: Mutex::new(Some(results_tx)),
            results_rx: Mutex::new(Some(results_rx)),
            handles: Mutex::new(Vec::with_capacity(config.num_workers)),
            closing: AtomicBool::new(false),
            config,
        })
    }

    /// Spawns the worker set. Must be called from within a tokio runtime.
    ///
    /// If cancellation was requested before `start`, the workers exit
    /// immediately and the pool proceeds straight to `Draining`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the pool was already started, or
    /// [`Error::PoolAlreadyClosed`] if it is closed.
    pub fn start(&self) -> Result<()> {
        if !self.state.advance(PoolState::Created) {
            return Err(self.lifecycle_error("start"));
        }

        let Some(results_tx) = self.results_tx.lock().take() else {
            return Err(self.lifecycle_error("start"));
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting {} workers (queue capacity {}, result capacity {})",
            self.config.num_workers,
            self.config.queue_capacity,
            self.config.result_capacity
        );

        let mut handles = self.handles.lock();
        for worker_id in 0..self.config.num_workers {
            // Enter before spawning so the barrier can never be observed open
            // while a worker is still being set up.
            let guard = self.barrier.enter();
            let shared = WorkerShared {
                queue: Arc::clone(&self.queue),
                processor: Arc::clone(&self.processor),
                stats: Arc::clone(&self.stats),
                cancel: self.cancel.clone(),
                policy: self.config.interrupt_policy,
            };
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                shared,
                results_tx.clone(),
                guard,
            )));
        }
        drop(handles);

        // The pool keeps no sender of its own: the sink closes when the last
        // worker drops its clone.
        drop(results_tx);

        if self.cancel.is_cancelled() {
            self.state.advance(PoolState::Running);
        }

        Ok(())
    }

    /// Submits a job, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// - [`Error::PoolAlreadyClosed`] once the pool is closed.
    /// - [`Error::SubmissionRejected`] if the queue is closed or cancellation
    ///   fires before the job is enqueued.
    ///
    /// Only submissions that start after the queue is closed are rejected. A
    /// submitter already waiting for space when `close_and_wait` begins may
    /// still be accepted; workers keep draining until it has finished.
    pub async fn submit(&self, payload: P) -> Result<JobId> {
        self.check_accepting()?;
        self.queue.submit(payload, &self.cancel, &self.stats).await
    }

    /// Submits a job only if the queue has a free slot right now.
    ///
    /// # Errors
    ///
    /// As [`submit`](Self::submit), plus `QueueFull` when at capacity.
    pub fn try_submit(&self, payload: P) -> Result<JobId> {
        self.check_accepting()?;
        self.queue.try_submit(payload, &self.cancel, &self.stats)
    }

    /// Takes the result stream. Available exactly once, and only until
    /// [`close_and_wait`](Self::close_and_wait) starts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResultsAlreadyTaken`] on every call after the first,
    /// and once closing has released an unclaimed stream.
    pub fn take_results(&self) -> Result<ResultStream<Pr::Output>> {
        self.results_rx.lock().take().ok_or(Error::ResultsAlreadyTaken)
    }

    /// Requests cancellation. Idempotent and safe to call concurrently.
    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    /// A cloneable handle to this pool's cancellation signal.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(self.cancel.clone(), Arc::clone(&self.state))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Closes the queue and waits until every worker has exited.
    ///
    /// Shutdown runs in phases:
    ///
    /// 1. Close the task queue; new submissions are rejected. A result stream
    ///    that was never taken is released.
    /// 2. Wait on the join barrier until every worker has exited, either by
    ///    draining the queue or by observing cancellation.
    /// 3. Join the worker tasks.
    /// 4. Record jobs left in the queue as abandoned.
    /// 5. Mark the pool `Closed` and return the final report.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the pool was never started or another
    ///   close is already in progress.
    /// - [`Error::PoolAlreadyClosed`] if the pool is already closed.
    /// - [`Error::WorkerJoin`] if a worker task could not be joined; the pool
    ///   is still closed in that case.
    pub async fn close_and_wait(&self) -> Result<PoolReport> {
        if self.state.get() == PoolState::Created {
            return Err(self.lifecycle_error("close"));
        }
        if self.closing.swap(true, Ordering::AcqRel) {
            return Err(self.lifecycle_error("close"));
        }

        // === Phase 1: Stop accepting new jobs ===
        #[cfg(feature = "tracing")]
        tracing::info!("Closing task queue ({} jobs queued)", self.queue.len());
        self.queue.close();
        self.state.advance(PoolState::Running);

        // An unclaimed result stream would fill up and block workers forever.
        // Releasing it disconnects the sink; further results are undelivered.
        drop(self.results_rx.lock().take());

        // === Phase 2: Wait for every worker to report exit ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Waiting for {} workers to exit", self.barrier.remaining());
        self.barrier.wait().await;

        // === Phase 3: Join worker tasks ===
        let handles = core::mem::take(&mut *self.handles.lock());
        let mut join_error = None;
        for (_i, joined) in futures::future::join_all(handles)
            .await
            .into_iter()
            .enumerate()
        {
            if let Err(e) = joined {
                #[cfg(feature = "tracing")]
                tracing::error!("Worker {_i} failed to join: {e}");
                join_error.get_or_insert(Error::WorkerJoin {
                    context: e.to_string(),
                });
            }
        }

        // === Phase 4: Account for jobs nobody started ===
        for job in self.queue.drain().await {
            self.stats.record_abandoned(job.id());
        }

        // === Phase 5: Finalize ===
        let report = self.stats.report(self.cancel.is_cancelled());
        self.state.advance(PoolState::Draining);

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Worker pool closed: {} submitted, {} delivered, {} interrupted, {} abandoned",
            report.submitted,
            report.delivered(),
            report.interrupted.len(),
            report.abandoned.len()
        );

        match join_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Like [`close_and_wait`](Self::close_and_wait), but cancels the pool if
    /// draining takes longer than `grace`.
    ///
    /// Returns once workers have observed the cancellation; the report then
    /// has `cancelled == true`.
    ///
    /// # Errors
    ///
    /// As [`close_and_wait`](Self::close_and_wait).
    pub async fn close_and_wait_timeout(&self, grace: Duration) -> Result<PoolReport> {
        let close = self.close_and_wait();
        tokio::pin!(close);

        tokio::select! {
            res = &mut close => res,
            () = tokio::time::sleep(grace) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Graceful drain exceeded {grace:?}, cancelling remaining work");
                self.cancel();
                close.await
            }
        }
    }

    pub fn state(&self) -> PoolState {
        self.state.get()
    }

    /// Watches state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<PoolState> {
        self.state.subscribe()
    }

    /// Current counters. Final numbers come from the [`PoolReport`].
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub const fn num_workers(&self) -> usize {
        self.config.num_workers
    }

    fn check_accepting(&self) -> Result<()> {
        match self.state.get() {
            PoolState::Closed => Err(Error::PoolAlreadyClosed),
            _ if self.cancel.is_cancelled() => {
                Err(Error::rejected(crate::RejectReason::Cancelled))
            }
            _ if self.queue.is_closed() => {
                Err(Error::rejected(crate::RejectReason::QueueClosed))
            }
            _ => Ok(()),
        }
    }

    fn lifecycle_error(&self, operation: &'static str) -> Error {
        match self.state.get() {
            PoolState::Closed => Error::PoolAlreadyClosed,
            state => Error::InvalidState { operation, state },
        }
    }
}

impl<P, Pr> Drop for WorkerPool<P, Pr>
where
    Pr: Processor<P>,
{
    fn drop(&mut self) {
        if self.state.get() != PoolState::Closed {
            self.cancel.cancel();
        }
    }
}
