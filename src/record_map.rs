//! Bounded per-generation deduplication map.
//!
//! `RecordMap<K>` is the cache backing the string and template families:
//! a size-bounded `K -> RecordId` map with approximate-LRU eviction (a
//! hash index of raw list-node pointers next to the intrusive list
//! that owns recency order), guarded by an internal mutex so the whole
//! thing is usable behind a shared reference the way
//! [`crate::generation_index::GenerationIndex`] hands it out.

#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;
#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;

use parking_lot::Mutex;

use crate::entry::CacheEntry;
use crate::list::{Entry, List};
use crate::record::RecordId;

/// Snapshot of a `RecordMap`'s internal counters, used by
/// [`crate::stats::StatsView`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordMapCounters {
    /// Number of `get` calls that found an entry.
    pub hits: u64,
    /// Number of `get` calls that found nothing.
    pub misses: u64,
    /// Number of `put` calls, including overwrites.
    pub loads: u64,
    /// Number of entries evicted to make room for a new one.
    pub evictions: u64,
}

struct Inner<K> {
    index: HashMap<K, *mut Entry<CacheEntry<K, RecordId>>>,
    list: Option<List<CacheEntry<K, RecordId>>>,
    counters: RecordMapCounters,
}

// SAFETY: `Inner` never exposes its raw pointers outside of calls that
// hold `RecordMap`'s mutex, so it is safe to move/share across threads.
unsafe impl<K: Send> Send for Inner<K> {}

/// A bounded, mutex-guarded `K -> RecordId` map with approximate-LRU
/// eviction on overflow.
///
/// Capacity 0 is legal: the map becomes a permanent no-op, every `get`
/// returns `None` and every `put` is dropped silently, matching the
/// behavior the [`crate::manager::CacheManager::empty`] façade needs
/// for its string/template caches.
pub struct RecordMap<K> {
    inner: Mutex<Inner<K>>,
    cap: usize,
}

impl<K> RecordMap<K>
where
    K: Hash + Eq,
{
    /// Creates a map bounded to `cap` entries.
    pub fn new(cap: usize) -> Self {
        let list = NonZeroUsize::new(cap).map(List::new);
        Self {
            inner: Mutex::new(Inner {
                index: HashMap::default(),
                list,
                counters: RecordMapCounters::default(),
            }),
            cap,
        }
    }

    /// Looks up `k`, moving it to the most-recently-used position on a
    /// hit. Updates the hit/miss counters.
    pub fn get<Q>(&self, k: &Q) -> Option<RecordId>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.cap == 0 {
            return None;
        }
        let mut inner = self.inner.lock();
        let node = inner.index.get(k).copied();
        match node {
            Some(node) => {
                let list = inner.list.as_mut().expect("list present when cap > 0");
                // SAFETY: node was inserted into this list and has not been
                // removed; the mutex prevents concurrent mutation.
                let value = unsafe { list.get_value(node) }.map(|e| e.value);
                // SAFETY: same invariant as above.
                unsafe { list.move_to_front(node) };
                inner.counters.hits += 1;
                value
            }
            None => {
                inner.counters.misses += 1;
                None
            }
        }
    }

    /// Inserts or updates `k -> v`, evicting the least-recently-used
    /// entry first if the map is at capacity.
    pub fn put(&self, k: K, v: RecordId)
    where
        K: Clone,
    {
        if self.cap == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        inner.counters.loads += 1;

        if let Some(&node) = inner.index.get(&k) {
            let list = inner.list.as_mut().expect("list present when cap > 0");
            // SAFETY: node belongs to this list and is guarded by the mutex.
            unsafe { list.update(node, CacheEntry::new(k.clone(), v, 1), false) };
            unsafe { list.move_to_front(node) };
            return;
        }

        let list = inner.list.as_mut().expect("list present when cap > 0");
        if list.is_full() {
            if let Some(evicted) = list.remove_last() {
                // SAFETY: `evicted` was just detached from the list, so
                // its value is initialized and owned here.
                let evicted_key = unsafe { evicted.get_value() }.key.clone();
                inner.index.remove(&evicted_key);
                inner.counters.evictions += 1;
            }
        }

        let node = list
            .add(CacheEntry::new(k.clone(), v, 1))
            .expect("capacity freed above when full");
        inner.index.insert(k, node);
    }

    /// Number of entries currently stored.
    pub fn size(&self) -> u64 {
        self.inner.lock().index.len() as u64
    }

    /// Total weight of entries currently stored (sum of per-entry
    /// weight; every `RecordMap` entry contributes weight 1).
    pub fn weight(&self) -> u64 {
        self.size()
    }

    /// Maximum number of entries this map will hold.
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Snapshot of hit/miss/load/eviction counters.
    pub fn counters(&self) -> RecordMapCounters {
        self.inner.lock().counters
    }
}

impl<K> Drop for RecordMap<K> {
    fn drop(&mut self) {
        // `List`'s own `Drop` frees every node; clearing the index map
        // here just avoids leaving dangling pointers reachable from a
        // half-torn-down `Inner` during unwinding.
        let mut inner = self.inner.lock();
        inner.index.clear();
    }
}

impl<K> fmt::Debug for RecordMap<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RecordMap")
            .field("cap", &self.cap)
            .field("len", &inner.index.len())
            .field("counters", &inner.counters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(n: u32) -> RecordId {
        RecordId::new(0, 0, n)
    }

    #[test]
    fn test_zero_capacity_is_permanent_noop() {
        let map: RecordMap<String> = RecordMap::new(0);
        map.put("a".to_string(), rid(1));
        assert_eq!(map.get("a"), None);
        assert_eq!(map.size(), 0);
    }

    #[test]
    fn test_put_then_get() {
        let map: RecordMap<String> = RecordMap::new(2);
        map.put("a".to_string(), rid(1));
        assert_eq!(map.get("a"), Some(rid(1)));
    }

    #[test]
    fn test_borrowed_lookup() {
        let map: RecordMap<String> = RecordMap::new(2);
        map.put("a".to_string(), rid(1));
        assert_eq!(map.get("a"), Some(rid(1)));
    }

    #[test]
    fn test_eviction_on_overflow() {
        let map: RecordMap<String> = RecordMap::new(2);
        map.put("a".to_string(), rid(1));
        map.put("b".to_string(), rid(2));
        // touch "a" so "b" becomes the least-recently-used entry
        assert_eq!(map.get("a"), Some(rid(1)));
        map.put("c".to_string(), rid(3));
        assert_eq!(map.get("b"), None);
        assert_eq!(map.get("a"), Some(rid(1)));
        assert_eq!(map.get("c"), Some(rid(3)));
        assert_eq!(map.counters().evictions, 1);
    }

    #[test]
    fn test_put_overwrite_does_not_evict() {
        let map: RecordMap<String> = RecordMap::new(2);
        map.put("a".to_string(), rid(1));
        map.put("b".to_string(), rid(2));
        map.put("a".to_string(), rid(99));
        assert_eq!(map.get("a"), Some(rid(99)));
        assert_eq!(map.get("b"), Some(rid(2)));
        assert_eq!(map.counters().evictions, 0);
    }

    #[test]
    fn test_counters() {
        let map: RecordMap<String> = RecordMap::new(2);
        map.put("a".to_string(), rid(1));
        map.get("a");
        map.get("missing");
        let counters = map.counters();
        assert_eq!(counters.hits, 1);
        assert_eq!(counters.misses, 1);
        assert_eq!(counters.loads, 1);
    }
}
