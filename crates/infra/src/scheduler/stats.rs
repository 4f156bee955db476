use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-instance scheduler counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Wake-key expiries seen for jobs in this namespace.
    pub expiries_observed: u64,
    /// Runs started after winning the lock.
    pub executions: u64,
    pub work_failures: u64,
    /// Lock races lost to another instance.
    pub lock_contentions: u64,
    pub store_errors: u64,
    pub reschedules_won: u64,
    pub reschedules_lost: u64,
    /// Runs that outlived their lock.
    pub overruns: u64,
    pub last_execution_at: Option<DateTime<Utc>>,
}
