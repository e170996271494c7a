use core::fmt;
use portable_atomic::{AtomicU8, Ordering};
use tokio::sync::watch;

/// Lifecycle of a [`WorkerPool`](crate::WorkerPool).
///
/// A pool moves strictly forward through
/// `Created -> Running -> Draining -> Closed`. No state is skipped and
/// `Closed` is terminal: a closed pool cannot be restarted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum PoolState {
    /// Constructed; jobs may be buffered but no worker is running.
    Created = 0,
    /// Workers are draining the task queue.
    Running = 1,
    /// The queue was closed or cancellation fired; workers are exiting.
    Draining = 2,
    /// Every worker has exited and the result sink is finalized.
    Closed = 3,
}

impl PoolState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Closed,
        }
    }

    /// The only state reachable from `self`, if any.
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::Running),
            Self::Running => Some(Self::Draining),
            Self::Draining => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Returns `true` while the pool still accepts submissions.
    pub const fn accepts_jobs(self) -> bool {
        matches!(self, Self::Created | Self::Running)
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolState::Created => write!(f, "created"),
            PoolState::Running => write!(f, "running"),
            PoolState::Draining => write!(f, "draining"),
            PoolState::Closed => write!(f, "closed"),
        }
    }
}

/// Atomic holder for the pool state that also publishes every transition on a
/// [`watch`] channel.
pub(crate) struct StateCell {
    raw: AtomicU8,
    tx: watch::Sender<PoolState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(PoolState::Created);
        Self {
            raw: AtomicU8::new(PoolState::Created as u8),
            tx,
        }
    }

    pub(crate) fn get(&self) -> PoolState {
        PoolState::from_u8(self.raw.load(Ordering::SeqCst))
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<PoolState> {
        self.tx.subscribe()
    }

    /// Moves `from -> from.successor()`.
    ///
    /// Returns `false` (and changes nothing) if the current state is not
    /// `from`. Only one caller can win a given transition.
    pub(crate) fn advance(&self, from: PoolState) -> bool {
        let Some(to) = from.successor() else {
            return false;
        };

        if self
            .raw
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Pool state {from} -> {to}");

        self.tx.send_replace(to);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_in_order_only() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), PoolState::Created);

        assert!(!cell.advance(PoolState::Running));
        assert!(cell.advance(PoolState::Created));
        assert!(!cell.advance(PoolState::Created));
        assert_eq!(cell.get(), PoolState::Running);

        assert!(cell.advance(PoolState::Running));
        assert!(cell.advance(PoolState::Draining));
        assert_eq!(cell.get(), PoolState::Closed);
        assert!(!cell.advance(PoolState::Closed));
    }

    #[test]
    fn subscribers_see_latest_state() {
        let cell = StateCell::new();
        let rx = cell.subscribe();
        assert_eq!(*rx.borrow(), PoolState::Created);

        cell.advance(PoolState::Created);
        cell.advance(PoolState::Running);
        assert_eq!(*rx.borrow(), PoolState::Draining);
    }

    #[test]
    fn only_created_and_running_accept_jobs() {
        assert!(PoolState::Created.accepts_jobs());
        assert!(PoolState::Running.accepts_jobs());
        assert!(!PoolState::Draining.accepts_jobs());
        assert!(!PoolState::Closed.accepts_jobs());
    }
}
