//! Distributed configuration store
//!
//! Thin string key/value client shared by every validator of a register.
//! [`RedisConfigStore`] is the production backend; [`InMemoryConfigStore`]
//! serves single-node deployments and tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use docket_common::{DocketError, Result};
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// String get/set/delete with per-key TTL
#[async_trait]
pub trait DistributedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Write a value that never expires
    async fn set_persistent(&self, key: &str, value: &str) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Redis-backed store.
///
/// The connection manager re-establishes dropped connections on the next
/// command.
pub struct RedisConfigStore {
    connection: ConnectionManager,
}

impl RedisConfigStore {
    /// Connect to Redis
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| DocketError::Config(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DocketError::Storage(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection })
    }

    fn get_connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl DistributedStore for RedisConfigStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection();
        let value: Option<String> = conn.get(key).await.map_err(|e| {
            warn!("Store get error: {}", e);
            DocketError::Storage(format!("Redis get failed: {}", e))
        })?;
        debug!(key, hit = value.is_some(), "Store get");
        Ok(value)
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.get_connection();
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| {
                warn!("Store set error: {}", e);
                DocketError::Storage(format!("Redis set failed: {}", e))
            })?;
        debug!(key, ttl_secs, "Store set");
        Ok(())
    }

    #[instrument(skip(self, value))]
    async fn set_persistent(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.get_connection();
        conn.set::<_, _, ()>(key, value).await.map_err(|e| {
            warn!("Store set error: {}", e);
            DocketError::Storage(format!("Redis set failed: {}", e))
        })?;
        debug!(key, "Store set without expiry");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_connection();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| DocketError::Storage(format!("Redis DEL failed: {}", e)))?;
        Ok(())
    }
}

struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-memory store honouring TTLs
#[derive(Default)]
pub struct InMemoryConfigStore {
    entries: DashMap<String, StoredValue>,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls served
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `set` calls served
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of `delete` calls served
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DistributedStore for InMemoryConfigStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let value = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => None,
            None => return Ok(None),
        };
        if value.is_none() {
            self.entries.remove_if(key, |_, v| !v.is_live(now));
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_persistent(&self, key: &str, value: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.entries.remove(key);
        Ok(())
    }
}
