//! Core error model.

use thiserror::Error;

use crate::interval::IntervalError;

/// Result type used across the core layer.
pub type CoreResult<T> = Result<T, CoreError>;

/// Core-level error.
///
/// Keep this focused on deterministic validation failures. Store and
/// connectivity concerns belong to the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A job name failed validation.
    #[error("invalid job name: {0}")]
    InvalidJobName(String),

    /// A recurrence interval could not be resolved.
    #[error(transparent)]
    Interval(#[from] IntervalError),
}

impl CoreError {
    pub fn invalid_job_name(msg: impl Into<String>) -> Self {
        Self::InvalidJobName(msg.into())
    }
}
