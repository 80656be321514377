//! Tiered in-memory response cache.
//!
//! Entries live for the TTL of their category. Lookups never return an
//! entry at or past its `expires_at`; stale entries are dropped lazily on
//! lookup and by a periodic sweep. When full, the entry with the earliest
//! `expires_at` is evicted (oldest insertion breaks ties).

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::domain::models::{
    CacheCategory, CacheEntry, CacheKey, CacheStatistics, CategoryTtls, EntryInfo,
};
use crate::domain::ports::{Clock, SystemClock};

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    hits: u64,
    misses: u64,
    sets: u64,
    evictions: u64,
    expirations: u64,
}

struct CacheState<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    counters: Counters,
}

/// Bounded TTL cache keyed by [`CacheKey`]
pub struct TieredCache<V = serde_json::Value> {
    state: Mutex<CacheState<V>>,
    ttls: CategoryTtls,
    max_size: usize,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TieredCache<V> {
    /// Create a cache on the system clock
    pub fn new(ttls: CategoryTtls, max_size: usize) -> Self {
        Self::with_clock(ttls, max_size, Arc::new(SystemClock))
    }

    /// Create a cache on an injected clock
    pub fn with_clock(ttls: CategoryTtls, max_size: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::with_capacity(max_size.min(4096)),
                counters: Counters::default(),
            }),
            ttls,
            max_size: max_size.max(1),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live entry
    ///
    /// A present-but-expired entry is removed and counted as both an
    /// expiration and a miss.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = self.clock.now();
        let mut state = self.lock();

        let Some(expired) = state.entries.get(key).map(|entry| entry.is_expired_at(now)) else {
            state.counters.misses += 1;
            trace!(cache_key = %key, "cache miss");
            return None;
        };

        if expired {
            state.entries.remove(key);
            state.counters.expirations += 1;
            state.counters.misses += 1;
            debug!(cache_key = %key, "cache entry expired");
            return None;
        }

        state.counters.hits += 1;
        trace!(cache_key = %key, "cache hit");
        state.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or overwrite an entry under the TTL of `category`
    pub fn set(&self, key: CacheKey, value: V, category: CacheCategory) {
        let now = self.clock.now();
        // Saturates to "never expires" at the end of chrono's range.
        let expires_at = now
            .checked_add_signed(self.ttls.ttl(category))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut state = self.lock();

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_size {
            Self::evict_one(&mut state, now);
        }

        state.counters.sets += 1;
        debug!(cache_key = %key, %category, %expires_at, "cache set");
        state.entries.insert(
            key,
            CacheEntry {
                value,
                category,
                inserted_at: now,
                expires_at,
            },
        );
    }

    // Victim: earliest expires_at, then earliest inserted_at. A victim that
    // is already stale counts as an expiration rather than an eviction.
    fn evict_one(state: &mut CacheState<V>, now: DateTime<Utc>) {
        let victim = state
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.expires_at, entry.inserted_at))
            .map(|(key, entry)| (key.clone(), entry.is_expired_at(now)));

        if let Some((key, expired)) = victim {
            state.entries.remove(&key);
            if expired {
                state.counters.expirations += 1;
            } else {
                state.counters.evictions += 1;
            }
            debug!(cache_key = %key, expired, "cache eviction");
        }
    }

    /// Remove a single entry; returns whether it was present
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Remove every entry of one category; returns how many were removed
    pub fn invalidate_category(&self, category: CacheCategory) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.category != category);
        let removed = before - state.entries.len();
        debug!(%category, removed, "cache category invalidated");
        removed
    }

    /// Remove every entry; statistics are kept
    pub fn invalidate_all(&self) -> usize {
        let mut state = self.lock();
        let removed = state.entries.len();
        state.entries.clear();
        debug!(removed, "cache cleared");
        removed
    }

    /// Drop every stale entry; returns how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - state.entries.len();
        state.counters.expirations += removed as u64;
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    /// Metadata of a live entry without touching the counters
    pub fn entry_info(&self, key: &CacheKey) -> Option<EntryInfo> {
        let now = self.clock.now();
        self.lock()
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| EntryInfo {
                category: entry.category,
                inserted_at: entry.inserted_at,
                expires_at: entry.expires_at,
            })
    }

    /// Counter snapshot; not itself counted as a lookup
    pub fn stats(&self) -> CacheStatistics {
        let state = self.lock();
        let Counters {
            hits,
            misses,
            sets,
            evictions,
            expirations,
        } = state.counters;

        CacheStatistics {
            hits,
            misses,
            sets,
            evictions,
            expirations,
            size: state.entries.len(),
            max_size: self.max_size,
        }
    }

    /// Zero every counter; entries are kept
    pub fn reset_stats(&self) {
        self.lock().counters = Counters::default();
    }

    /// Number of stored entries, stale ones included until swept
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether no entries are stored
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

impl<V: Clone + Send + 'static> TieredCache<V> {
    /// Spawn a task sweeping expired entries every `interval`
    ///
    /// The task holds a weak reference and stops once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    debug!("cache dropped, stopping sweeper");
                    break;
                };
                cache.sweep_expired();
            }
        })
    }
}

impl<V> std::fmt::Debug for TieredCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("ttls", &self.ttls)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}
