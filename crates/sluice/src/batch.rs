//! One-shot batch execution on a private pool.

use crate::{JobResult, PoolConfig, PoolReport, Processor, Result, WorkerPool, cancel_after};
use core::time::Duration;

/// Settings for [`run_batch`].
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub config: PoolConfig,
    /// Cancel the batch once this much time has passed since it started.
    pub deadline: Option<Duration>,
}

impl BatchOptions {
    pub const fn new(config: PoolConfig) -> Self {
        Self {
            config,
            deadline: None,
        }
    }

    #[must_use]
    pub const fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Everything a batch produced.
#[derive(Debug)]
pub struct BatchOutcome<O> {
    /// Delivered results, sorted by job id (submission order).
    pub results: Vec<JobResult<O>>,
    pub report: PoolReport,
    /// Payloads never submitted because the batch was cancelled first.
    pub unsubmitted: usize,
}

impl<O> BatchOutcome<O> {
    /// Whether every payload produced a delivered result.
    pub fn is_complete(&self) -> bool {
        self.unsubmitted == 0
            && !self.report.cancelled
            && self.results.len() as u64 == self.report.submitted
    }
}

/// Runs every payload through `processor` on a fresh pool and waits for the
/// pool to close.
///
/// Submission, result collection and shutdown run concurrently, so a small
/// queue or sink never deadlocks the batch. When `options.deadline` elapses
/// the pool is cancelled: in-flight work is handled per the configured
/// [`InterruptPolicy`](crate::InterruptPolicy) and payloads not yet submitted
/// are counted in [`BatchOutcome::unsubmitted`].
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) for a bad
/// configuration, or any error from
/// [`close_and_wait`](WorkerPool::close_and_wait).
pub async fn run_batch<P, Pr, I>(
    processor: Pr,
    payloads: I,
    options: BatchOptions,
) -> Result<BatchOutcome<Pr::Output>>
where
    P: Send + 'static,
    Pr: Processor<P>,
    I: IntoIterator<Item = P>,
{
    let pool = WorkerPool::new(options.config, processor)?;
    let results = pool.take_results()?;
    pool.start()?;

    let timer = options
        .deadline
        .map(|deadline| cancel_after(pool.cancel_handle(), deadline));

    let produce = async {
        let mut payloads = payloads.into_iter();
        let mut unsubmitted = 0;
        while let Some(payload) = payloads.next() {
            if let Err(_e) = pool.submit(payload).await {
                #[cfg(feature = "tracing")]
                tracing::debug!("Batch stopped submitting: {_e}");
                unsubmitted = 1 + payloads.by_ref().count();
                break;
            }
        }
        (pool.close_and_wait().await, unsubmitted)
    };

    let ((report, unsubmitted), results) = tokio::join!(produce, results.collect_ordered());

    if let Some(timer) = timer {
        timer.abort();
    }

    Ok(BatchOutcome {
        results,
        report: report?,
        unsubmitted,
    })
}
