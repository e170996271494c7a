use crate::{
    InterruptPolicy, JobResult, WorkerContext,
    barrier::BarrierGuard,
    processor::{Processor, run_job},
    queue::TaskQueue,
    sink::{Deposit, deposit},
    stats::PoolStats,
};
use std::sync::Arc;
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;

/// Everything a worker shares with its siblings and the supervisor.
pub(crate) struct WorkerShared<P, Pr> {
    pub(crate) queue: Arc<TaskQueue<P>>,
    pub(crate) processor: Arc<Pr>,
    pub(crate) stats: Arc<PoolStats>,
    pub(crate) cancel: CancellationToken,
    pub(crate) policy: InterruptPolicy,
}

/// Worker task that drains the shared task queue.
///
/// Each iteration races a dequeue against cancellation, runs the job through
/// the [`Processor`], and deposits exactly one [`JobResult`] into the sink.
///
/// The loop exits when:
///
/// - the queue is closed and empty (clean drain),
/// - cancellation is observed before, during, or after a unit of work.
///
/// Jobs taken off the queue after cancellation are recorded as abandoned; jobs
/// whose result is dropped because of cancellation are recorded as
/// interrupted. `_guard` releases this worker's slot in the join barrier on
/// every exit path.
pub(crate) async fn worker_loop<P, Pr>(
    worker_id: usize,
    shared: WorkerShared<P, Pr>,
    results: mpsc::Sender<JobResult<Pr::Output>>,
    _guard: BarrierGuard,
) where
    P: Send + 'static,
    Pr: Processor<P>,
{
    let WorkerShared {
        queue,
        processor,
        stats,
        cancel,
        policy,
    } = shared;

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    let mut _processed = 0_u64;

    loop {
        let job = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {worker_id} received cancellation while idle");
                break;
            }
            job = queue.recv() => match job {
                Some(job) => job,
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Worker {worker_id} found the queue closed");
                    break;
                }
            },
        };

        // Cancellation may have fired while this worker held the queue lock.
        if cancel.is_cancelled() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {worker_id} abandoning job {} after cancellation", job.id());
            stats.record_abandoned(job.id());
            break;
        }

        let (job_id, payload) = job.into_parts();
        let ctx = WorkerContext::new(worker_id, job_id, cancel.child_token());
        let started = Instant::now();

        #[cfg(feature = "tracing")]
        tracing::trace!("Worker {worker_id} processing job {job_id}");

        let outcome = match policy {
            InterruptPolicy::Abandon => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("Worker {worker_id} dropping in-flight job {job_id}");
                        stats.record_interrupted(job_id);
                        break;
                    }
                    outcome = run_job(&*processor, ctx, payload) => outcome,
                }
            }
            InterruptPolicy::Finish => run_job(&*processor, ctx, payload).await,
        };

        #[cfg(feature = "tracing")]
        {
            if let Some(failure) = outcome.failure() {
                tracing::warn!("Worker {worker_id} job {job_id} {failure}");
            }
        }

        let result = JobResult::new(job_id, worker_id, started.elapsed(), outcome);
        match deposit(&results, result, &cancel, &stats).await {
            Deposit::Delivered => _processed += 1,
            Deposit::Cancelled => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {worker_id} discarding result of job {job_id}");
                stats.record_interrupted(job_id);
                break;
            }
            Deposit::Disconnected => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {worker_id} has no consumer for job {job_id}");
                stats.record_undelivered();
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped after {_processed} results");
}
