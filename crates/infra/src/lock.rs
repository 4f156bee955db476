//! Distributed lock over the coordination store.
//!
//! A lock is a single key written with set-if-absent and a TTL. The value is a
//! random token unique to the acquisition, so release can use
//! compare-and-delete and never removes a lock that has since expired and been
//! taken by someone else.
//!
//! There are no retries: failing to acquire means another instance is already
//! handling the work.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{LockError, StoreError};
use crate::store::CoordinationStore;

/// Proof of holding a lock until `ttl` elapses or it is released.
#[derive(Debug, Clone)]
pub struct LockHandle {
    key: String,
    token: String,
    ttl: Duration,
    acquired: Instant,
    acquired_at: DateTime<Utc>,
}

impl LockHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Wall-clock acquisition time.
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Whether the TTL has elapsed since acquisition, by the local clock.
    ///
    /// Once expired, another instance may hold the same lock.
    pub fn is_expired(&self) -> bool {
        self.acquired.elapsed() >= self.ttl
    }
}

/// Lock service bound to one coordination store.
#[derive(Debug)]
pub struct DistributedLock<S> {
    store: Arc<S>,
}

impl<S> Clone for DistributedLock<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: CoordinationStore> DistributedLock<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Try once to take the lock `key` for `ttl`.
    pub async fn acquire(&self, key: &str, ttl: Duration) -> Result<LockHandle, LockError> {
        let token = Uuid::now_v7().to_string();

        if !self.store.set_if_absent(key, &token, ttl).await? {
            debug!(key, "lock held elsewhere");
            return Err(LockError::Unavailable {
                key: key.to_string(),
            });
        }

        Ok(LockHandle {
            key: key.to_string(),
            token,
            ttl,
            acquired: Instant::now(),
            acquired_at: Utc::now(),
        })
    }

    /// Release a lock.
    ///
    /// Returns whether the lock was still ours. Releasing after expiry (or
    /// twice) is a no-op that returns `false`.
    pub async fn release(&self, handle: &LockHandle) -> Result<bool, StoreError> {
        let released = self.store.delete_if_equals(&handle.key, &handle.token).await?;
        if !released {
            warn!(key = %handle.key, "lock expired before release");
        }
        Ok(released)
    }
}
