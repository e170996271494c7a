//! Pool configuration.
//!
//! All sizes are fixed when the pool is constructed. The task queue capacity
//! is the backpressure mechanism: once it is full, blocking submitters wait and
//! non-blocking submitters are rejected, so memory stays bounded under fast
//! producers and slow workers.

use crate::{Error, Result};

/// Default number of worker tasks.
pub const DEFAULT_NUM_WORKERS: usize = 3;

/// Default capacity of the task queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default capacity of the result sink.
pub const DEFAULT_RESULT_CAPACITY: usize = 10;

/// What a worker does with the job it is running when cancellation fires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InterruptPolicy {
    /// Drop the in-flight unit at its next await point, emit no result, and
    /// exit. The job is recorded as interrupted.
    #[default]
    Abandon,
    /// Run the in-flight unit to completion, then try to deposit its result
    /// before exiting.
    Finish,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of concurrent workers. Fixed for the lifetime of the pool.
    pub num_workers: usize,
    /// Capacity of the task queue.
    pub queue_capacity: usize,
    /// Capacity of the result sink. When full, workers wait for the consumer.
    pub result_capacity: usize,
    /// Handling of in-flight jobs on cancellation.
    pub interrupt_policy: InterruptPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_NUM_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            result_capacity: DEFAULT_RESULT_CAPACITY,
            interrupt_policy: InterruptPolicy::default(),
        }
    }
}

impl PoolConfig {
    pub fn with_workers(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn result_capacity(mut self, capacity: usize) -> Self {
        self.result_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn interrupt_policy(mut self, policy: InterruptPolicy) -> Self {
        self.interrupt_policy = policy;
        self
    }

    /// Checks that every size is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the worker count or either capacity
    /// is zero.
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(Error::InvalidConfig {
                reason: "num_workers must be greater than 0".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig {
                reason: "queue_capacity must be greater than 0".to_string(),
            });
        }
        if self.result_capacity == 0 {
            return Err(Error::InvalidConfig {
                reason: "result_capacity must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(PoolConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let err = PoolConfig::with_workers(0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));

        let err = PoolConfig::default()
            .queue_capacity(0)
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            Error::InvalidConfig {
                reason: "queue_capacity must be greater than 0".to_string()
            }
        );

        assert!(PoolConfig::default().result_capacity(0).validate().is_err());
    }
}
