use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Join barrier that unblocks once every participant has reported exit.
///
/// Each worker holds a [`BarrierGuard`]. Dropping the guard, on any exit path
/// including unwinding, decrements the counter, so the supervisor waiting in
/// [`wait`](Self::wait) can never be left hanging by a worker that died.
#[derive(Clone)]
pub(crate) struct JoinBarrier {
    inner: Arc<Inner>,
}

struct Inner {
    remaining: AtomicUsize,
    notify: Notify,
}

impl JoinBarrier {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                remaining: AtomicUsize::new(0),
                notify: Notify::new(),
            }),
        }
    }

    /// Registers one participant.
    pub(crate) fn enter(&self) -> BarrierGuard {
        self.inner.remaining.fetch_add(1, Ordering::AcqRel);
        BarrierGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.inner.remaining.load(Ordering::Acquire)
    }

    /// Waits until the participant count reaches zero.
    pub(crate) async fn wait(&self) {
        loop {
            // Register interest before checking so a release between the
            // check and the await is not missed.
            let notified = self.inner.notify.notified();
            if self.remaining() == 0 {
                return;
            }
            notified.await;
        }
    }
}

pub(crate) struct BarrierGuard {
    inner: Arc<Inner>,
}

impl Drop for BarrierGuard {
    fn drop(&mut self) {
        if self.inner.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.notify.notify_waiters();
        }
    }
}
