//! Infrastructure layer: coordination store, distributed locks and the
//! scheduler runtime.

pub mod config;
pub mod error;
pub mod lock;
pub mod scheduler;
pub mod store;


pub use config::{ConfigError, SchedulerConfig};
pub use error::{LockError, SchedulerError, StoreError, WorkFailure};
pub use lock::{DistributedLock, LockHandle};
pub use scheduler::{
    ExpiryOutcome, HandledExpiry, LockOutcome, Scheduler, SchedulerHandle, SchedulerStats, WorkReport,
};
pub use store::{CoordinationStore, ExpirySubscription, InMemoryStore};

#[cfg(feature = "redis")]
pub use store::RedisStore;
