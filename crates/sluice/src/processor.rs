use crate::{JobFailure, JobId, Outcome};
use core::{any::Any, fmt, future::Future, panic::AssertUnwindSafe};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

/// Per-job view handed to a [`Processor`].
///
/// The token is a child of the pool's cancellation signal. Long-running
/// processors can await [`cancelled`](Self::cancelled) or poll
/// [`is_cancelled`](Self::is_cancelled) to stop early on their own terms.
#[derive(Clone, Debug)]
pub struct WorkerContext {
    worker_id: usize,
    job_id: JobId,
    cancel: CancellationToken,
}

impl WorkerContext {
    pub(crate) const fn new(worker_id: usize, job_id: JobId, cancel: CancellationToken) -> Self {
        Self {
            worker_id,
            job_id,
            cancel,
        }
    }

    pub const fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub const fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    pub const fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// The unit of work a pool runs for every job.
///
/// Implemented for any `Fn(WorkerContext, P) -> impl Future<Output =
/// Result<O, E>>` closure, so most callers never implement it by hand.
///
/// An `Err` becomes [`JobFailure::Failed`] with the error's `Display` text. A
/// panic becomes [`JobFailure::Panicked`]; it never takes down the worker.
pub trait Processor<P>: Send + Sync + 'static {
    type Output: Send + 'static;
    type Error: fmt::Display;

    fn process(
        &self,
        ctx: WorkerContext,
        payload: P,
    ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;
}

impl<P, F, Fut, O, E> Processor<P> for F
where
    F: Fn(WorkerContext, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send,
    O: Send + 'static,
    E: fmt::Display,
{
    type Output = O;
    type Error = E;

    fn process(
        &self,
        ctx: WorkerContext,
        payload: P,
    ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send {
        (self)(ctx, payload)
    }
}

/// Runs one job to completion, converting errors and panics into an
/// [`Outcome`].
pub(crate) async fn run_job<P, Pr>(
    processor: &Pr,
    ctx: WorkerContext,
    payload: P,
) -> Outcome<Pr::Output>
where
    Pr: Processor<P>,
{
    // The call itself sits inside the guarded future so a panic raised before
    // the first await is caught too.
    let guarded = AssertUnwindSafe(async move { processor.process(ctx, payload).await });

    match guarded.catch_unwind().await {
        Ok(Ok(output)) => Outcome::Success(output),
        Ok(Err(e)) => Outcome::Failure(JobFailure::Failed {
            message: e.to_string(),
        }),
        Err(panic) => Outcome::Failure(JobFailure::Panicked {
            message: panic_message(&*panic),
        }),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> WorkerContext {
        WorkerContext::new(1, JobId::new(5), CancellationToken::new())
    }

    #[tokio::test]
    async fn closure_success_and_error() {
        let double = |_ctx: WorkerContext, n: u64| async move {
            if n == 0 {
                Err("zero is not allowed")
            } else {
                Ok(n * 2)
            }
        };

        assert_eq!(run_job(&double, ctx(), 21).await, Outcome::Success(42));
        assert_eq!(
            run_job(&double, ctx(), 0).await,
            Outcome::Failure(JobFailure::Failed {
                message: "zero is not allowed".to_string()
            })
        );
    }

    #[tokio::test]
    async fn panics_become_failures() {
        let explode = |_ctx: WorkerContext, n: u64| async move {
            if n > 1 {
                panic!("job {n} exploded");
            }
            Ok::<_, String>(n)
        };

        let outcome = run_job(&explode, ctx(), 3).await;
        assert_eq!(
            outcome,
            Outcome::Failure(JobFailure::Panicked {
                message: "job 3 exploded".to_string()
            })
        );
        assert!(outcome.is_panic());

        let static_panic = |_ctx: WorkerContext, n: u64| async move {
            if n == 0 {
                panic!("static message");
            }
            Ok::<_, String>(n)
        };
        let outcome = run_job(&static_panic, ctx(), 0).await;
        assert_eq!(outcome.failure().map(JobFailure::message), Some("static message"));
    }

    #[tokio::test]
    async fn context_reports_identity() {
        let echo = |ctx: WorkerContext, (): ()| async move {
            Ok::<_, String>((ctx.worker_id(), ctx.job_id(), ctx.is_cancelled()))
        };
        assert_eq!(
            run_job(&echo, ctx(), ()).await,
            Outcome::Success((1, JobId::new(5), false))
        );
    }
}
