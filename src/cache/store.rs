//! TTL-checked store keyed by range.
//!
//! The map lock is only held for a read or a single replace, never across an
//! upstream fetch.  Two concurrent misses on the same range both fetch and
//! both write; the later write wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::range::RangeKey;

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A cached CSV payload and the instant it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    payload: Bytes,
    fetched_at: Instant,
}

impl CacheEntry {
    pub fn new(payload: Bytes, fetched_at: Instant) -> Self {
        Self {
            payload,
            fetched_at,
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn size_bytes(&self) -> usize {
        self.payload.len()
    }

    /// Time elapsed since the fetch, saturating at zero.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }
}

/// Outcome of checking the cache for a range.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// Entry younger than the TTL.
    Fresh { entry: CacheEntry, age: Duration },
    /// Entry present but at or past the TTL.  Kept as the stale fallback.
    Expired(CacheEntry),
    /// Nothing fetched yet for this range.
    Missing,
}

/// Point-in-time view of one cached range, used by the health report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStatus {
    pub range: RangeKey,
    pub age: Duration,
    pub size_bytes: usize,
}

// ---------------------------------------------------------------------------
// FireCache
// ---------------------------------------------------------------------------

/// Process-wide cache owned by the application state.
#[derive(Debug, Clone)]
pub struct FireCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<RangeKey, CacheEntry>>>,
}

impl FireCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Classify the current entry for `range` against the TTL.
    pub async fn lookup(&self, range: RangeKey) -> Lookup {
        let entry = self.entries.read().await.get(&range).cloned();
        let Some(entry) = entry else {
            return Lookup::Missing;
        };

        let age = entry.age(Instant::now());
        if age < self.ttl {
            Lookup::Fresh { entry, age }
        } else {
            Lookup::Expired(entry)
        }
    }

    /// Replace the entry for `range` with a freshly fetched payload.
    pub async fn store(&self, range: RangeKey, payload: Bytes) -> CacheEntry {
        let entry = CacheEntry::new(payload, Instant::now());
        let previous = self.entries.write().await.insert(range, entry.clone());
        debug!(
            %range,
            size_bytes = entry.size_bytes(),
            replaced = previous.is_some(),
            "cache entry stored"
        );
        entry
    }

    /// Status of every range fetched at least once, ordered by range.
    pub async fn snapshot(&self) -> Vec<EntryStatus> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut statuses: Vec<EntryStatus> = entries
            .iter()
            .map(|(range, entry)| EntryStatus {
                range: *range,
                age: entry.age(now),
                size_bytes: entry.size_bytes(),
            })
            .collect();
        statuses.sort_by_key(|s| s.range);
        statuses
    }
}

/// Whole seconds, rounded to the nearest second.
pub fn rounded_secs(duration: Duration) -> u64 {
    ((duration.as_millis() + 500) / 1000) as u64
}
