//! Infrastructure error model.
//!
//! - `StoreError`: the coordination store could not be reached or rejected a
//!   command. Fatal to the operation that hit it; retrying is left to the
//!   supervising layer.
//! - `LockError::Unavailable`: another instance holds the lock. Expected.
//! - `WorkFailure`: the job's work (or its middleware) failed. Only ever
//!   reported, never propagated out of the scheduler.

use thiserror::Error;

use bossman_core::{CoreError, IntervalError};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("coordination store unavailable: {0}")]
    Unavailable(String),

    #[error("coordination store command failed: {0}")]
    Command(String),
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
            Self::Unavailable(e.to_string())
        } else {
            Self::Command(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    /// Another instance holds the lock.
    #[error("lock {key} is held by another instance")]
    Unavailable { key: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum WorkFailure {
    #[error("work failed: {0:#}")]
    Failed(anyhow::Error),

    #[error("work panicked: {0}")]
    Panicked(String),

    #[error("work was cancelled before completing")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("job {0} is not registered")]
    UnknownJob(String),

    #[error("job {job}: {source}")]
    Interval {
        job: String,
        #[source]
        source: IntervalError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("expiry notification feed closed")]
    FeedClosed,

    #[error("scheduler task failed: {0}")]
    Task(String),
}
