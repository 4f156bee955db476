//! Redis-backed coordination store (optional).
//!
//! Uses two connections, as Redis requires: a multiplexed command connection
//! shared by every operation, and a dedicated pub/sub connection per expiry
//! subscription. Expiry events come from the per-database keyevent channel
//! `__keyevent@{db}__:expired`, which only publishes once
//! `notify-keyspace-events` includes `Ex`.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, info, instrument, warn};

use super::{CoordinationStore, ExpirySubscription};
use crate::error::StoreError;

/// Deletes KEYS[1] only while it still holds ARGV[1].
const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: MultiplexedConnection,
    db: i64,
}

impl RedisStore {
    /// Connect to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - connection URL, e.g. `redis://localhost:6379/0`. The
    ///   database number selects which expiry channel is watched.
    pub async fn connect(redis_url: impl AsRef<str>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let conn = client.get_multiplexed_async_connection().await?;
        let db = client.get_connection_info().redis.db;

        info!(db, "connected to coordination store");
        Ok(Self { client, conn, db })
    }

    /// Channel carrying expired key names for this connection's database.
    pub fn expired_channel(&self) -> String {
        format!("__keyevent@{}__:expired", self.db)
    }
}

impl core::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisStore").field("db", &self.db).finish_non_exhaustive()
    }
}

#[async_trait]
impl CoordinationStore for RedisStore {
    #[instrument(skip(self, value), level = "trace", err)]
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }

    #[instrument(skip(self, value), level = "trace", err)]
    async fn delete_if_equals(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = redis::Script::new(COMPARE_AND_DELETE)
            .key(key)
            .arg(value)
            .invoke_async(&mut conn)
            .await?;

        Ok(deleted == 1)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.conn.clone();
        let ms: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;

        // -2: no such key, -1: key without expiry.
        Ok(match ms {
            -2 => None,
            -1 => Some(Duration::MAX),
            ms => Some(Duration::from_millis(ms.max(0) as u64)),
        })
    }

    async fn enable_expiry_events(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("CONFIG")
            .arg("SET")
            .arg("notify-keyspace-events")
            .arg("Ex")
            .query_async(&mut conn)
            .await?;

        debug!("enabled keyspace expiry events");
        Ok(())
    }

    async fn subscribe_expired(&self) -> Result<ExpirySubscription, StoreError> {
        let channel = self.expired_channel();
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;

        let (tx, rx) = mpsc::unbounded_channel();

        // Background task forwarding expired key names until either side hangs up.
        tokio::spawn(async move {
            let mut messages = Box::pin(pubsub.into_on_message());
            while let Some(msg) = messages.next().await {
                let key: String = match msg.get_payload() {
                    Ok(key) => key,
                    Err(e) => {
                        debug!(error = %e, "skipping non-text expiry payload");
                        continue;
                    }
                };
                if tx.send(key).is_err() {
                    return;
                }
            }
            warn!(channel = %channel, "expiry subscription connection closed");
        });

        Ok(ExpirySubscription::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn wake_keys_expire_through_the_keyevent_channel() {
        let store = RedisStore::connect(redis_url()).await.unwrap();
        store.enable_expiry_events().await.unwrap();
        let mut feed = store.subscribe_expired().await.unwrap();

        let key = format!("bossman:test:work:{}", uuid::Uuid::now_v7());
        assert!(store.set_if_absent(&key, "x", Duration::from_millis(200)).await.unwrap());
        assert!(!store.set_if_absent(&key, "y", Duration::from_millis(200)).await.unwrap());

        let expired = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match feed.recv().await {
                    Some(k) if k == key => return k,
                    Some(_) => continue,
                    None => panic!("feed closed"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(expired, key);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn compare_and_delete_respects_ownership() {
        let store = RedisStore::connect(redis_url()).await.unwrap();
        let key = format!("bossman:test:lock:{}", uuid::Uuid::now_v7());

        store.set_if_absent(&key, "mine", Duration::from_secs(5)).await.unwrap();
        assert!(!store.delete_if_equals(&key, "theirs").await.unwrap());
        assert!(store.delete_if_equals(&key, "mine").await.unwrap());
        assert_eq!(store.get(&key).await.unwrap(), None);
    }
}
