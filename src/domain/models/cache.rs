//! Cache domain models: TTL categories, entries and statistics.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest accepted TTL for any category (ten years)
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// TTL tier of a cached response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    /// Slow-changing reference data (contacts, products, chart of accounts)
    MasterData,
    /// Business documents (invoices, orders, payments)
    Transactional,
    /// Reports and aggregates
    Analytical,
    /// Balances and other near-live figures
    RealTime,
}

impl CacheCategory {
    /// All categories, in TTL-table order
    pub const ALL: [Self; 4] = [
        Self::MasterData,
        Self::Transactional,
        Self::Analytical,
        Self::RealTime,
    ];

    /// Stable string form, also used as the cache key prefix
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MasterData => "master_data",
            Self::Transactional => "transactional",
            Self::Analytical => "analytical",
            Self::RealTime => "real_time",
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "master_data" => Ok(Self::MasterData),
            "transactional" => Ok(Self::Transactional),
            "analytical" => Ok(Self::Analytical),
            "real_time" | "realtime" => Ok(Self::RealTime),
            other => Err(format!(
                "unknown cache category '{other}': expected one of master_data, transactional, analytical, real_time"
            )),
        }
    }
}

/// Category → TTL table, fixed for the lifetime of a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CategoryTtls {
    /// TTL for master data, in seconds
    #[serde(default = "default_master_data_secs")]
    pub master_data_secs: u64,

    /// TTL for transactional data, in seconds
    #[serde(default = "default_transactional_secs")]
    pub transactional_secs: u64,

    /// TTL for analytical data, in seconds
    #[serde(default = "default_analytical_secs")]
    pub analytical_secs: u64,

    /// TTL for real-time data, in seconds
    #[serde(default = "default_real_time_secs")]
    pub real_time_secs: u64,
}

const fn default_master_data_secs() -> u64 {
    7200
}

const fn default_transactional_secs() -> u64 {
    1800
}

const fn default_analytical_secs() -> u64 {
    3600
}

const fn default_real_time_secs() -> u64 {
    300
}

impl Default for CategoryTtls {
    fn default() -> Self {
        Self {
            master_data_secs: default_master_data_secs(),
            transactional_secs: default_transactional_secs(),
            analytical_secs: default_analytical_secs(),
            real_time_secs: default_real_time_secs(),
        }
    }
}

impl CategoryTtls {
    /// Raw TTL in seconds for a category
    pub const fn secs(&self, category: CacheCategory) -> u64 {
        match category {
            CacheCategory::MasterData => self.master_data_secs,
            CacheCategory::Transactional => self.transactional_secs,
            CacheCategory::Analytical => self.analytical_secs,
            CacheCategory::RealTime => self.real_time_secs,
        }
    }

    /// TTL for a category as a chrono duration, clamped to [`MAX_TTL_SECS`]
    #[allow(clippy::cast_possible_wrap)]
    pub fn ttl(&self, category: CacheCategory) -> Duration {
        Duration::seconds(self.secs(category).min(MAX_TTL_SECS) as i64)
    }
}

/// A stored response
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Cached payload
    pub value: V,
    /// TTL tier the entry was stored under
    pub category: CacheCategory,
    /// Insertion instant
    pub inserted_at: DateTime<Utc>,
    /// Instant after which the entry must not be served
    pub expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    /// Whether the entry is stale at `now`
    ///
    /// An entry is servable strictly before `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Metadata about a live entry, without the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    /// TTL tier
    pub category: CacheCategory,
    /// Insertion instant
    pub inserted_at: DateTime<Utc>,
    /// Expiry instant
    pub expires_at: DateTime<Utc>,
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatistics {
    /// Lookups that returned a live entry
    pub hits: u64,
    /// Lookups that found nothing servable
    pub misses: u64,
    /// Insertions and overwrites
    pub sets: u64,
    /// Entries removed to make room
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
    /// Current number of entries
    pub size: usize,
    /// Configured capacity
    pub max_size: usize,
}

impl CacheStatistics {
    /// Total lookups since the last reset
    pub const fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups served from cache, `0.0` before any lookup
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.lookups();
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}
