//! Bounded result sink.
//!
//! Workers hold the sending halves; the consumer holds the single
//! [`ResultStream`]. The pool itself keeps no sender once started, so the
//! stream ends exactly when the last worker has exited, which is strictly after
//! the join barrier clears. A worker can therefore never write into a
//! finalized sink.

use crate::{JobResult, stats::PoolStats};
use core::{
    pin::Pin,
    task::{Context, Poll},
};
use futures::{Stream, StreamExt};
use pin_project_lite::pin_project;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

pub(crate) fn channel<O>(capacity: usize) -> (mpsc::Sender<JobResult<O>>, ResultStream<O>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        tx,
        ResultStream {
            inner: ReceiverStream::new(rx),
        },
    )
}

pin_project! {
    /// Stream of [`JobResult`]s in completion order.
    ///
    /// The stream ends once every worker has exited. Dropping it early is
    /// allowed: results produced afterwards are counted as undelivered.
    pub struct ResultStream<O> {
        #[pin]
        inner: ReceiverStream<JobResult<O>>,
    }
}

impl<O> ResultStream<O> {
    /// Receives the next result, or `None` once every worker has exited.
    pub async fn recv(&mut self) -> Option<JobResult<O>> {
        self.next().await
    }

    /// Collects every remaining result and sorts them by job id, restoring
    /// submission order.
    pub async fn collect_ordered(self) -> Vec<JobResult<O>> {
        let mut results: Vec<_> = self.collect().await;
        results.sort_by_key(JobResult::job_id);
        results
    }
}

impl<O> Stream for ResultStream<O> {
    type Item = JobResult<O>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

pub(crate) enum Deposit {
    Delivered,
    /// Cancellation won the race against a full sink. The result is dropped.
    Cancelled,
    /// The consumer dropped the stream. The result is dropped.
    Disconnected,
}

/// Writes `result` into the sink, racing the write against cancellation.
///
/// A free slot always wins over cancellation, so finished work is delivered
/// whenever possible. A worker never hangs on a full sink that nobody reads
/// after cancellation.
pub(crate) async fn deposit<O>(
    tx: &mpsc::Sender<JobResult<O>>,
    result: JobResult<O>,
    cancel: &CancellationToken,
    stats: &PoolStats,
) -> Deposit {
    let permit = tokio::select! {
        biased;
        permit = tx.reserve() => match permit {
            Ok(permit) => permit,
            Err(_) => return Deposit::Disconnected,
        },
        () = cancel.cancelled() => return Deposit::Cancelled,
    };

    stats.record_delivered(result.outcome());
    permit.send(result);
    Deposit::Delivered
}
