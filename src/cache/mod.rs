//! In-memory response cache for the FIRMS proxy.
//!
//! Holds at most one [`CacheEntry`](store::CacheEntry) per [`RangeKey`](crate::range::RangeKey).
//! Entries are replaced wholesale on every successful upstream fetch and are
//! never removed; an expired entry is kept around as the stale fallback.

pub mod store;

pub use store::{rounded_secs, FireCache, Lookup};
