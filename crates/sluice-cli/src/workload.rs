use crate::{config::RunConfig, telemetry};
use anyhow::anyhow;
use core::{future::Future, time::Duration};
use sluice::{
    Error, JobFailure, JobId, Outcome, PoolReport, Processor, RejectReason, ResultStream,
    WorkerContext, WorkerPool, cancel_after,
};

/// A job that sleeps for a fixed time and doubles its payload.
///
/// Jobs whose 1-based position is a multiple of `fail_every` return an error;
/// multiples of `panic_every` panic. Panics win when both apply.
#[derive(Debug, Clone)]
pub struct SimulatedWork {
    pub duration: Duration,
    pub fail_every: Option<u64>,
    pub panic_every: Option<u64>,
}

impl From<&RunConfig> for SimulatedWork {
    fn from(config: &RunConfig) -> Self {
        Self {
            duration: config.job_duration,
            fail_every: config.fail_every,
            panic_every: config.panic_every,
        }
    }
}

const fn hits(every: Option<u64>, n: u64) -> bool {
    match every {
        Some(k) => (n + 1) % k == 0,
        None => false,
    }
}

impl Processor<u64> for SimulatedWork {
    type Output = u64;
    type Error = anyhow::Error;

    fn process(
        &self,
        ctx: WorkerContext,
        payload: u64,
    ) -> impl Future<Output = Result<u64, anyhow::Error>> + Send {
        let work = self.clone();
        async move {
            tokio::select! {
                () = ctx.cancelled() => {
                    return Err(anyhow!("job {} interrupted after cancellation", ctx.job_id()));
                }
                () = tokio::time::sleep(work.duration) => {}
            }

            if hits(work.panic_every, payload) {
                panic!("simulated panic in job {}", ctx.job_id());
            }
            if hits(work.fail_every, payload) {
                return Err(anyhow!("simulated failure for payload {payload}"));
            }
            Ok(payload * 2)
        }
    }
}

type Pool = WorkerPool<u64, SimulatedWork>;

/// Totals observed by the consumer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Consumed {
    pub succeeded: u64,
    pub failed: u64,
    pub panicked: u64,
}

impl Consumed {
    pub const fn total(&self) -> u64 {
        self.succeeded + self.failed + self.panicked
    }
}

/// What a full run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub report: PoolReport,
    pub consumed: Consumed,
    pub unsubmitted: u64,
}

/// Runs the configured workload to completion.
///
/// `shutdown` resolving cancels the pool; it is typically a signal listener.
pub async fn run<S>(config: &RunConfig, shutdown: S) -> anyhow::Result<RunSummary>
where
    S: Future<Output = ()> + Send + 'static,
{
    let pool = WorkerPool::new(config.pool.clone(), SimulatedWork::from(config))?;

    let consumer = tokio::spawn(consume(pool.take_results()?));

    let cancel = pool.cancel_handle();
    let on_shutdown = tokio::spawn(async move {
        tokio::select! {
            () = shutdown => {
                #[cfg(feature = "tracing")]
                tracing::info!("Shutdown signal received, cancelling pool");
                cancel.cancel();
            }
            () = cancel.cancelled() => {}
        }
    });

    pool.start()?;
    let timer = config
        .cancel_after
        .map(|after| cancel_after(pool.cancel_handle(), after));

    let unsubmitted = produce(&pool, config).await?;

    let report = match config.drain_timeout {
        Some(grace) => pool.close_and_wait_timeout(grace).await?,
        None => pool.close_and_wait().await?,
    };

    on_shutdown.abort();
    if let Some(timer) = timer {
        timer.abort();
    }
    let consumed = consumer.await?;

    Ok(RunSummary {
        report,
        consumed,
        unsubmitted,
    })
}

/// Submits `config.jobs` payloads. Returns how many were never submitted
/// because the pool was cancelled first.
async fn produce(pool: &Pool, config: &RunConfig) -> anyhow::Result<u64> {
    for n in 0..config.jobs {
        let submitted = if config.try_submit {
            try_submit_with_retry(pool, n).await
        } else {
            pool.submit(n).await
        };

        match submitted {
            Ok(_id) => {
                telemetry::increment_jobs_submitted();
                #[cfg(feature = "tracing")]
                tracing::debug!("Submitted payload {n} as job {_id}");
            }
            Err(e) if e.is_rejection() => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Stopped submitting at payload {n}: {e}");
                return Ok(config.jobs - n);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(0)
}

async fn try_submit_with_retry(pool: &Pool, payload: u64) -> sluice::Result<JobId> {
    let mut backoff = Duration::from_millis(1);
    loop {
        match pool.try_submit(payload) {
            Err(Error::SubmissionRejected {
                reason: RejectReason::QueueFull,
            }) => {
                #[cfg(feature = "tracing")]
                tracing::trace!("Queue full, retrying payload {payload} in {backoff:?}");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_millis(50));
            }
            other => return other,
        }
    }
}

async fn consume(mut results: ResultStream<u64>) -> Consumed {
    let mut consumed = Consumed::default();

    while let Some(result) = results.recv().await {
        telemetry::record_job_duration(result.elapsed().as_secs_f64() * 1_000.0);

        let label = match result.outcome() {
            Outcome::Success(_output) => {
                #[cfg(feature = "tracing")]
                tracing::info!(
                    "Worker {} finished job {} in {:?}: {}",
                    result.worker_id(),
                    result.job_id(),
                    result.elapsed(),
                    _output
                );
                consumed.succeeded += 1;
                "success"
            }
            Outcome::Failure(_failure @ JobFailure::Failed { .. }) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Worker {} job {}: {}",
                    result.worker_id(),
                    result.job_id(),
                    _failure
                );
                consumed.failed += 1;
                "failed"
            }
            Outcome::Failure(_failure @ JobFailure::Panicked { .. }) => {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    "Worker {} job {}: {}",
                    result.worker_id(),
                    result.job_id(),
                    _failure
                );
                consumed.panicked += 1;
                "panicked"
            }
        };
        telemetry::increment_jobs_completed(label);
    }

    consumed
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice::{InterruptPolicy, PoolConfig};

    fn config(jobs: u64, job_duration_ms: u64) -> RunConfig {
        RunConfig {
            pool: PoolConfig::default(),
            jobs,
            job_duration: Duration::from_millis(job_duration_ms),
            cancel_after: None,
            drain_timeout: None,
            fail_every: None,
            panic_every: None,
            try_submit: false,
            json: false,
        }
    }

    #[test]
    fn injection_uses_one_based_positions() {
        assert!(!hits(None, 2));
        assert!(hits(Some(3), 2));
        assert!(!hits(Some(3), 3));
        assert!(hits(Some(1), 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn full_run_delivers_every_job() {
        let summary = run(&config(10, 5), core::future::pending()).await.unwrap();
        assert_eq!(summary.consumed.succeeded, 10);
        assert_eq!(summary.unsubmitted, 0);
        assert_eq!(summary.report.submitted, 10);
        assert!(summary.report.is_balanced());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failures_and_panics_are_counted() {
        let mut config = config(12, 1);
        config.fail_every = Some(3);
        config.panic_every = Some(4);
        let summary = run(&config, core::future::pending()).await.unwrap();

        // Positions 4, 8, 12 panic; 3, 6, 9 fail (12 already panicked).
        assert_eq!(summary.consumed.panicked, 3);
        assert_eq!(summary.consumed.failed, 3);
        assert_eq!(summary.consumed.succeeded, 6);
        assert_eq!(summary.consumed.total(), summary.report.delivered());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn shutdown_signal_cancels_the_run() {
        let mut config = config(8, 500);
        config.pool = PoolConfig::default().queue_capacity(2);
        let shutdown = tokio::time::sleep(Duration::from_millis(100));

        let summary = run(&config, shutdown).await.unwrap();
        assert!(summary.report.cancelled);
        assert_eq!(summary.consumed.total(), 0);
        assert!(summary.unsubmitted > 0);
        assert_eq!(summary.report.submitted + summary.unsubmitted, 8);
        assert!(summary.report.is_balanced());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn try_submit_retries_until_the_queue_drains() {
        let mut config = config(20, 2);
        config.pool = PoolConfig::with_workers(2).queue_capacity(1);
        config.try_submit = true;
        let summary = run(&config, core::future::pending()).await.unwrap();
        assert_eq!(summary.consumed.succeeded, 20);
        assert_eq!(summary.unsubmitted, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn finish_policy_reports_cooperative_interruptions() {
        let mut config = config(3, 10_000);
        config.pool = PoolConfig::default().interrupt_policy(InterruptPolicy::Finish);
        config.cancel_after = Some(Duration::from_millis(50));
        let summary = run(&config, core::future::pending()).await.unwrap();

        // Each in-flight job notices cancellation and returns an error.
        assert_eq!(summary.consumed.failed, 3);
        assert!(summary.report.interrupted.is_empty());
    }
}
