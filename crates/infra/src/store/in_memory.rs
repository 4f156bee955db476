//! In-memory coordination store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{CoordinationStore, ExpirySubscription};
use crate::error::StoreError;

/// In-memory store shared by several simulated scheduler instances.
///
/// - TTLs run on the tokio clock, so paused-time tests are deterministic
/// - Expired keys are announced to every subscriber, once
/// - A write that finds an expired key still in the map announces it first,
///   the way Redis reports lazily expired keys
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    subscribers: Vec<mpsc::UnboundedSender<String>>,
    next_generation: u64,
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
    generation: u64,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

impl State {
    fn announce(&mut self, key: &str) {
        self.subscribers.retain(|tx| tx.send(key.to_string()).is_ok());
    }

    /// Drop `key` if it has expired, announcing it. Returns the live entry.
    fn live(&mut self, key: &str, now: Instant) -> Option<&Entry> {
        let expired = self.entries.get(key).is_some_and(|e| !e.is_live(now));
        if expired {
            self.entries.remove(key);
            self.announce(key);
        }
        self.entries.get(key)
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.state().entries.values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule_expiry(&self, key: String, generation: u64, expires_at: Instant) {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut state = inner.lock().unwrap_or_else(PoisonError::into_inner);
            let current = state.entries.get(&key).is_some_and(|e| e.generation == generation);
            if current {
                state.entries.remove(&key);
                state.announce(&key);
            }
        });
    }
}

#[async_trait]
impl CoordinationStore for InMemoryStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        if ttl.is_zero() {
            return Err(StoreError::Command("invalid expire time in 'set' command".to_string()));
        }

        let now = Instant::now();
        let expires_at = now + ttl;
        let generation = {
            let mut state = self.state();
            if state.live(key, now).is_some() {
                return Ok(false);
            }
            state.next_generation += 1;
            let generation = state.next_generation;
            state.entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at,
                    generation,
                },
            );
            generation
        };

        self.schedule_expiry(key.to_string(), generation, expires_at);
        Ok(true)
    }

    async fn delete_if_equals(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut state = self.state();
        let matches = state
            .live(key, Instant::now())
            .is_some_and(|e| e.value == value);
        if matches {
            state.entries.remove(key);
        }
        Ok(matches)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .state()
            .live(key, Instant::now())
            .map(|e| e.value.clone()))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = Instant::now();
        Ok(self
            .state()
            .live(key, now)
            .map(|e| e.expires_at.saturating_duration_since(now)))
    }

    async fn enable_expiry_events(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn subscribe_expired(&self) -> Result<ExpirySubscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().subscribers.push(tx);
        Ok(ExpirySubscription::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn set_if_absent_only_writes_once() {
        let store = InMemoryStore::new();
        let ttl = Duration::from_secs(10);

        assert!(store.set_if_absent("k", "first", ttl).await.unwrap());
        assert!(!store.set_if_absent("k", "second", ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_expire_and_are_announced() {
        let store = InMemoryStore::new();
        let mut feed = store.subscribe_expired().await.unwrap();

        store.set_if_absent("k", "v", Duration::from_millis(500)).await.unwrap();
        assert_eq!(store.ttl("k").await.unwrap(), Some(Duration::from_millis(500)));

        assert_eq!(feed.recv().await.as_deref(), Some("k"));
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.set_if_absent("k", "again", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_keys_are_not_announced() {
        let store = InMemoryStore::new();
        let mut feed = store.subscribe_expired().await.unwrap();

        store.set_if_absent("lock", "token", Duration::from_millis(100)).await.unwrap();
        assert!(store.delete_if_equals("lock", "token").await.unwrap());
        store.set_if_absent("other", "v", Duration::from_millis(200)).await.unwrap();

        // The first announcement is for "other": "lock" was deleted, not expired.
        assert_eq!(feed.recv().await.as_deref(), Some("other"));
    }

    #[tokio::test(start_paused = true)]
    async fn compare_and_delete_requires_matching_value() {
        let store = InMemoryStore::new();
        store.set_if_absent("lock", "mine", Duration::from_secs(1)).await.unwrap();

        assert!(!store.delete_if_equals("lock", "theirs").await.unwrap());
        assert!(store.delete_if_equals("lock", "mine").await.unwrap());
        assert!(!store.delete_if_equals("lock", "mine").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn every_subscriber_sees_each_expiry() {
        let store = InMemoryStore::new();
        let mut a = store.subscribe_expired().await.unwrap();
        let mut b = store.subscribe_expired().await.unwrap();

        store.set_if_absent("k", "v", Duration::from_millis(50)).await.unwrap();

        assert_eq!(a.recv().await.as_deref(), Some("k"));
        assert_eq!(b.recv().await.as_deref(), Some("k"));
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected() {
        let store = InMemoryStore::new();
        assert!(store.set_if_absent("k", "v", Duration::ZERO).await.is_err());
    }
}
