//! Coordination store abstraction.
//!
//! The store is the only thing scheduler instances share. It must offer:
//!
//! - single-key conditional writes with a millisecond TTL (`SET k v PX ms NX`)
//! - atomic compare-and-delete (for lock release)
//! - a broadcast feed of expired key names
//!
//! Implementations are transport-specific (Redis, in-memory); the scheduler
//! only sees this trait.

mod in_memory;
#[cfg(feature = "redis")]
mod redis;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::StoreError;

pub use in_memory::InMemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

#[async_trait]
pub trait CoordinationStore: Send + Sync + 'static {
    /// Write `key = value` with a TTL if the key does not exist.
    ///
    /// Returns `false` (not an error) when the key already exists.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Delete `key` only if it currently holds `value`.
    async fn delete_if_equals(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remaining time to live, `None` if the key does not exist.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Ask the store to publish key-expiry events.
    async fn enable_expiry_events(&self) -> Result<(), StoreError>;

    /// Subscribe to the names of keys as they expire.
    async fn subscribe_expired(&self) -> Result<ExpirySubscription, StoreError>;
}

/// A live feed of expired key names.
///
/// Yields `None` once the underlying connection is gone.
#[derive(Debug)]
pub struct ExpirySubscription {
    receiver: mpsc::UnboundedReceiver<String>,
}

impl ExpirySubscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<String>) -> Self {
        Self { receiver }
    }

    /// Wait for the next expired key.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}
