//! Cooperative cancellation.
//!
//! The pool's cancellation signal is a one-shot broadcast backed by a
//! [`CancellationToken`]: once set it is never unset, setting it again is a
//! no-op, and every worker observes it at its next await point. Workers are
//! never forcibly terminated.
//!
//! Timeouts are not a pool concept. [`cancel_after`] arms an external timer
//! task that fires the same signal, the way a deadline context would.

use crate::state::StateCell;
use core::time::Duration;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cloneable handle to a pool's cancellation signal.
///
/// Any number of handles may call [`cancel`](Self::cancel) concurrently; the
/// signal is set exactly once.
#[derive(Clone)]
pub struct CancelHandle {
    token: CancellationToken,
    state: Arc<StateCell>,
}

impl CancelHandle {
    pub(crate) const fn new(token: CancellationToken, state: Arc<StateCell>) -> Self {
        Self { token, state }
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            #[cfg(feature = "tracing")]
            tracing::info!("Cancellation requested");
        }
        self.token.cancel();

        // A pool that has not started yet moves to `Draining` from `start()`
        // once it observes the token.
        self.state.advance(crate::PoolState::Running);
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// A child token that is cancelled together with the pool. Cancelling the
    /// child does not cancel the pool.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

/// Cancels the pool behind `handle` once `after` has elapsed.
///
/// The timer runs as its own task; abort the returned handle to disarm it.
/// Must be called from within a tokio runtime.
pub fn cancel_after(handle: CancelHandle, after: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(after) => {
                #[cfg(feature = "tracing")]
                tracing::info!("Deadline of {after:?} elapsed, cancelling pool");
                handle.cancel();
            }
            () = handle.cancelled() => {}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PoolState;

    fn handle() -> (CancelHandle, Arc<StateCell>) {
        let state = Arc::new(StateCell::new());
        (
            CancelHandle::new(CancellationToken::new(), Arc::clone(&state)),
            state,
        )
    }

    #[test]
    fn cancel_is_idempotent() {
        let (handle, state) = handle();
        state.advance(PoolState::Created);

        handle.cancel();
        handle.cancel();
        handle.clone().cancel();

        assert!(handle.is_cancelled());
        assert_eq!(state.get(), PoolState::Draining);
    }

    #[test]
    fn cancel_before_start_leaves_state_alone() {
        let (handle, state) = handle();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(state.get(), PoolState::Created);
    }

    #[test]
    fn child_token_follows_parent_only() {
        let (handle, _) = handle();
        let child = handle.child_token();
        child.cancel();
        assert!(!handle.is_cancelled());

        let child = handle.child_token();
        handle.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_cancellation() {
        let (handle, _) = handle();
        let timer = cancel_after(handle.clone(), Duration::from_secs(2));

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(!handle.is_cancelled());

        timer.await.unwrap();
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_exits_early_when_already_cancelled() {
        let (handle, _) = handle();
        let timer = cancel_after(handle.clone(), Duration::from_secs(3600));
        handle.cancel();
        timer.await.unwrap();
    }
}
