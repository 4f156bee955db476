//! What happened when an expiry notification was handled.

use std::time::Duration;

use tokio::task::JoinHandle;

use bossman_core::JobName;

use crate::error::{SchedulerError, StoreError, WorkFailure};

/// Result of handling one expired key.
#[derive(Debug)]
pub enum ExpiryOutcome {
    /// The key is outside this scheduler's wake-key namespace.
    Ignored,
    /// The job is not registered in this instance; nothing was attempted.
    NotRegistered(String),
    /// The job is registered: the lock was raced and the job rescheduled.
    Handled(HandledExpiry),
}

#[derive(Debug)]
pub struct HandledExpiry {
    pub job: JobName,
    pub lock: LockOutcome,
    /// `Ok(true)` if this instance wrote the next wake key, `Ok(false)` if
    /// another instance got there first.
    pub rescheduled: Result<bool, SchedulerError>,
}

/// How the lock race went for this instance.
#[derive(Debug)]
pub enum LockOutcome {
    /// This instance won and is running the work.
    Acquired(JoinHandle<WorkReport>),
    /// Another instance holds the lock.
    Unavailable,
    /// The store could not be asked; distinct from losing the race.
    StoreUnavailable(StoreError),
}

/// Outcome of one lock-guarded work run.
#[derive(Debug)]
pub struct WorkReport {
    pub job: JobName,
    pub result: Result<(), WorkFailure>,
    pub elapsed: Duration,
    /// The run took at least as long as the lock TTL, so another instance may
    /// have started the same job concurrently.
    pub overran: bool,
    /// The lock was still ours when released.
    pub lock_released: bool,
}

impl ExpiryOutcome {
    /// Whether this instance started the job's work.
    pub fn executed(&self) -> bool {
        matches!(
            self,
            ExpiryOutcome::Handled(HandledExpiry {
                lock: LockOutcome::Acquired(_),
                ..
            })
        )
    }

    pub fn as_handled(&self) -> Option<&HandledExpiry> {
        match self {
            ExpiryOutcome::Handled(handled) => Some(handled),
            _ => None,
        }
    }

    /// Wait for the work run, if this instance started one.
    pub async fn report(self) -> Option<WorkReport> {
        match self {
            ExpiryOutcome::Handled(HandledExpiry {
                lock: LockOutcome::Acquired(task),
                ..
            }) => task.await.ok(),
            _ => None,
        }
    }
}
