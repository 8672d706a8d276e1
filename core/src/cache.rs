//! Time-bucketed memoization of config reads.
//!
//! # Design
//! Keys include a time bucket (`unix seconds / ttl`, floored) so expiry is
//! implicit: a new bucket simply never matches old entries. Two lookups on
//! either side of a bucket boundary are never conflated even when the
//! wall-clock gap is under the TTL — approximate expiry is the contract.
//! Absent configs are cached too, as an explicit `None`, so repeated misses
//! don't refetch inside one bucket.
//!
//! Storage is a mutex-protected map bounded by LRU eviction; stale buckets
//! age out the same way as any other least-recently-used entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::client::ConfigClient;
use crate::error::ApiError;
use crate::transport::{Clock, SystemClock};
use crate::types::ConfigEntry;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    namespace: String,
    key: String,
    environment: String,
    bucket: u64,
}

struct CacheSlot {
    value: Option<ConfigEntry>,
    last_used: u64,
}

struct CacheState {
    slots: HashMap<CacheKey, CacheSlot>,
    tick: u64,
}

/// Bounded, thread-safe read cache for `get_config` results.
pub struct ConfigCache {
    capacity: usize,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
}

impl Default for ConfigCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ConfigCache {
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity: capacity.max(1),
            clock,
            state: Mutex::new(CacheState {
                slots: HashMap::new(),
                tick: 0,
            }),
        }
    }

    /// Fetch a config through the cache. Within one time bucket, repeated
    /// calls for the same (namespace, key, env) hit the cache; the first
    /// call of a new bucket refetches.
    pub fn get(
        &self,
        client: &ConfigClient,
        namespace: &str,
        key: &str,
        env: &str,
        ttl: Duration,
    ) -> Result<Option<ConfigEntry>, ApiError> {
        self.get_with(namespace, key, env, ttl, || {
            client.get_config(namespace, key, env, false)
        })
    }

    /// Cache lookup with a caller-supplied fetch, the seam the unit tests
    /// use to count network calls.
    pub fn get_with(
        &self,
        namespace: &str,
        key: &str,
        env: &str,
        ttl: Duration,
        fetch: impl FnOnce() -> Result<Option<ConfigEntry>, ApiError>,
    ) -> Result<Option<ConfigEntry>, ApiError> {
        let cache_key = CacheKey {
            namespace: namespace.to_string(),
            key: key.to_string(),
            environment: env.to_string(),
            bucket: self.clock.now_unix() / ttl.as_secs().max(1),
        };

        {
            let mut state = self.lock();
            state.tick += 1;
            let tick = state.tick;
            if let Some(slot) = state.slots.get_mut(&cache_key) {
                slot.last_used = tick;
                return Ok(slot.value.clone());
            }
        }

        // Fetch outside the lock: a slow request must not block other
        // cache users. Concurrent misses on the same key may fetch twice;
        // last insert wins.
        let value = fetch()?;

        let mut state = self.lock();
        state.tick += 1;
        let tick = state.tick;
        if state.slots.len() >= self.capacity && !state.slots.contains_key(&cache_key) {
            let evict = state
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(k, _)| k.clone());
            if let Some(key) = evict {
                state.slots.remove(&key);
            }
        }
        state.slots.insert(
            cache_key,
            CacheSlot {
                value: value.clone(),
                last_used: tick,
            },
        );

        Ok(value)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
