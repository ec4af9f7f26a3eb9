//! Cache primitives backing the engine's two tiers.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// A cached value with its insertion time. Entries are never mutated in
/// place; a refresh constructs a new entry and swaps it in.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

impl<V: Clone> CacheEntry<V> {
    fn new(value: V) -> Self {
        CacheEntry {
            value,
            stored_at: Instant::now(),
        }
    }

    fn fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

/// Single-slot cache for the latest snapshot.
///
/// Readers take a short read lock on the fast path. Refreshers serialize on
/// a separate async guard and must re-check freshness after acquiring it: a
/// racing refresher may have already stored a new value.
pub struct SlotCache<V: Clone> {
    slot: RwLock<Option<CacheEntry<V>>>,
    refresh: Mutex<()>,
    ttl: Duration,
}

impl<V: Clone> SlotCache<V> {
    pub fn new(ttl: Duration) -> Self {
        SlotCache {
            slot: RwLock::new(None),
            refresh: Mutex::new(()),
            ttl,
        }
    }

    /// Returns the current value if present and within TTL.
    pub fn fresh(&self) -> Option<V> {
        let slot = self.slot.read().unwrap();
        slot.as_ref()
            .filter(|entry| entry.fresh(self.ttl))
            .map(|entry| entry.value.clone())
    }

    pub fn store(&self, value: V) {
        let mut slot = self.slot.write().unwrap();
        *slot = Some(CacheEntry::new(value));
    }

    /// Serializes refreshers. Hold the guard across the freshness re-check
    /// and the fetch; readers on the fast path are not blocked by it.
    pub async fn refresh_guard(&self) -> MutexGuard<'_, ()> {
        self.refresh.lock().await
    }
}

/// Keyed TTL cache for historical queries. Grows for the process lifetime;
/// stale entries stay in place until the refetch that replaces them. Two
/// concurrent misses on one key may both fetch, which is harmless duplicate
/// work since writes are last-write-wins.
pub struct TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    inner: Mutex<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            inner: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let cache = self.inner.lock().await;
        match cache.get(key) {
            Some(entry) if entry.fresh(self.ttl) => {
                debug!("Cache HIT");
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!("Cache entry expired");
                None
            }
            None => {
                debug!("Cache MISS");
                None
            }
        }
    }

    pub async fn put(&self, key: K, value: V) {
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT");
        cache.insert(key, CacheEntry::new(value));
    }
}
