//! Process-local configuration cache
//!
//! Bounded map in front of the distributed store. Entries expire after their
//! own TTL; at capacity the least recently used entry is evicted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::genesis::GenesisConfiguration;

struct LocalEntry {
    config: Arc<GenesisConfiguration>,
    expires_at: Instant,
    last_used: AtomicU64,
}

/// Bounded LRU cache with per-entry expiry
pub struct LocalConfigCache {
    entries: DashMap<String, LocalEntry>,
    capacity: usize,
    clock: AtomicU64,
    /// Serializes the capacity check with the insert; reads stay lock-free
    insert_lock: Mutex<()>,
}

impl LocalConfigCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
            insert_lock: Mutex::new(()),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Unexpired entry for a register, marking it recently used
    pub fn get(&self, register_id: &str) -> Option<Arc<GenesisConfiguration>> {
        let now = Instant::now();
        let hit = match self.entries.get(register_id) {
            Some(entry) if now < entry.expires_at => {
                entry.last_used.store(self.tick(), Ordering::Relaxed);
                Some(Arc::clone(&entry.config))
            }
            Some(_) => None,
            None => return None,
        };
        if hit.is_none() {
            self.entries.remove_if(register_id, |_, e| now >= e.expires_at);
            debug!(register_id, "Local entry expired");
        }
        hit
    }

    /// Insert or replace an entry, evicting if at capacity
    pub fn insert(&self, register_id: &str, config: Arc<GenesisConfiguration>, ttl: Duration) {
        let _guard = self.insert_lock.lock();
        if !self.entries.contains_key(register_id) && self.entries.len() >= self.capacity {
            self.evict();
        }
        self.entries.insert(
            register_id.to_string(),
            LocalEntry {
                config,
                expires_at: Instant::now() + ttl,
                last_used: AtomicU64::new(self.tick()),
            },
        );
    }

    pub fn remove(&self, register_id: &str) -> bool {
        self.entries.remove(register_id).is_some()
    }

    /// Remove the entry only if it still holds this exact configuration
    pub fn remove_if_same(&self, register_id: &str, config: &Arc<GenesisConfiguration>) -> bool {
        self.entries
            .remove_if(register_id, |_, e| Arc::ptr_eq(&e.config, config))
            .is_some()
    }

    pub fn contains(&self, register_id: &str) -> bool {
        self.entries.contains_key(register_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn evict(&self) {
        let now = Instant::now();
        self.entries.retain(|_, e| now < e.expires_at);
        if self.entries.len() < self.capacity {
            return;
        }

        let victim = self
            .entries
            .iter()
            .min_by_key(|e| e.last_used.load(Ordering::Relaxed))
            .map(|e| e.key().clone());

        if let Some(key) = victim {
            self.entries.remove(&key);
            debug!(register_id = %key, "Evicted least recently used entry");
        }
    }
}
