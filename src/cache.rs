//! Short-lived result caches.
//!
//! Built here, owned by whoever constructs them and handed to their
//! consumers. A miss is always safe; callers recompute.

use std::hash::Hash;
use std::time::Duration;

use moka::future::Cache;

// ---

/// Upper bound on entries per cache; stations and locations are few.
pub const MAX_ENTRIES: u64 = 10_000;

/// Cache whose entries expire `ttl` after insertion.
pub fn ttl_cache<K, V>(ttl: Duration) -> Cache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .max_capacity(MAX_ENTRIES)
        .time_to_live(ttl)
        .build()
}
