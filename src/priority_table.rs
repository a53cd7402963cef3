//! Fixed-capacity, open-addressed, cost-weighted node cache.
//!
//! `PriorityTable<K>` is the shared table behind the node cache family.
//! Unlike [`crate::record_map::RecordMap`] (one instance per
//! generation), a single `PriorityTable` serves every generation at
//! once; entries are distinguished by `(key, generation)` and eviction
//! is driven by a caller-supplied `cost` rather than recency. The table
//! is flat and open-addressed instead of bucket-and-list, keeping the
//! whole structure inline in one fixed-size allocation with no
//! per-entry heap node.

use std::collections::BTreeMap;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};

use parking_lot::Mutex;
use tracing::trace;

use crate::record::RecordId;
use crate::Generation;

/// Number of consecutive slots examined on every lookup or insert.
const PROBE_WINDOW: usize = 4;

#[derive(Clone)]
struct Slot<K> {
    key: K,
    generation: Generation,
    value: RecordId,
    cost: u8,
    priority: u8,
}

/// Snapshot of a `PriorityTable`'s counters and occupancy.
#[derive(Debug, Clone, Default)]
pub struct PriorityTableStats {
    /// Number of `get` calls that found a matching slot.
    pub hits: u64,
    /// Number of `get` calls that found nothing within the probe window.
    pub misses: u64,
    /// Number of `put` calls, whether or not they resulted in an insert.
    pub loads: u64,
    /// Number of slots overwritten, keyed by the priority value that was
    /// evicted. A `BTreeMap` rather than a hash map, for deterministic
    /// iteration order when the output feeds reproducible reporting.
    pub evictions_by_priority: BTreeMap<u8, u64>,
    /// Number of slots currently occupied.
    pub occupancy: usize,
    /// Number of occupied slots, keyed by the slot's current priority.
    /// A `BTreeMap` for the same reason as `evictions_by_priority`.
    pub occupancy_by_priority: BTreeMap<u8, usize>,
}

struct Inner<K> {
    slots: Vec<Option<Slot<K>>>,
    hits: u64,
    misses: u64,
    loads: u64,
    evictions_by_priority: BTreeMap<u8, u64>,
}

/// A fixed-capacity, open-addressed table mapping `(K, Generation)` to
/// `RecordId`, with cost-weighted admission and saturating-priority
/// aging.
pub struct PriorityTable<K> {
    inner: Mutex<Inner<K>>,
    hash_builder: RandomState,
    capacity: usize,
    mask: usize,
}

impl<K> PriorityTable<K>
where
    K: Hash + Eq + Clone,
{
    /// Creates a table with at least `requested_capacity` slots,
    /// rounded up to the next power of two. `requested_capacity` of 0
    /// is special: the table becomes a permanent no-op, holding zero
    /// slots rather than rounding up to one. Every `get` returns `None`
    /// and every `put` is dropped silently, matching the behavior the
    /// [`crate::manager::CacheManager::empty`] façade needs for its
    /// node cache.
    pub fn new(requested_capacity: usize) -> Self {
        let capacity = if requested_capacity == 0 {
            0
        } else {
            requested_capacity.next_power_of_two()
        };
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            inner: Mutex::new(Inner {
                slots,
                hits: 0,
                misses: 0,
                loads: 0,
                evictions_by_priority: BTreeMap::new(),
            }),
            hash_builder: RandomState::new(),
            capacity,
            mask: capacity.saturating_sub(1),
        }
    }

    /// Total number of slots in the table.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn hash(&self, k: &K, g: Generation) -> usize {
        let mut hasher = self.hash_builder.build_hasher();
        k.hash(&mut hasher);
        g.hash(&mut hasher);
        hasher.finish() as usize
    }

    fn probe_positions(&self, k: &K, g: Generation) -> [usize; PROBE_WINDOW] {
        let start = self.hash(k, g);
        let mut positions = [0usize; PROBE_WINDOW];
        for (i, slot) in positions.iter_mut().enumerate() {
            *slot = start.wrapping_add(i) & self.mask;
        }
        positions
    }

    /// Looks up `(k, g)`. On a match the slot's priority is
    /// incremented, saturating at `u8::MAX`, and the stored value is
    /// returned.
    pub fn get(&self, k: &K, g: Generation) -> Option<RecordId> {
        if self.capacity == 0 {
            return None;
        }
        let positions = self.probe_positions(k, g);
        let mut inner = self.inner.lock();
        for pos in positions {
            if let Some(slot) = inner.slots[pos].as_mut() {
                if &slot.key == k && slot.generation == g {
                    slot.priority = slot.priority.saturating_add(1);
                    let value = slot.value;
                    inner.hits += 1;
                    return Some(value);
                }
            }
        }
        inner.misses += 1;
        None
    }

    /// Inserts `(k, g) -> v` with the given admission cost.
    ///
    /// If an existing slot already holds `(k, g)` it is updated in
    /// place. Otherwise the first empty slot in the probe window is
    /// used; failing that, the slot with the lowest priority in the
    /// window is overwritten if its priority is strictly less than
    /// `cost`. If every probed slot has priority >= `cost` the insert
    /// is silently dropped.
    pub fn put(&self, k: K, v: RecordId, g: Generation, cost: u8) {
        if self.capacity == 0 {
            return;
        }
        let positions = self.probe_positions(&k, g);
        let mut inner = self.inner.lock();
        inner.loads += 1;

        for pos in positions {
            if let Some(slot) = inner.slots[pos].as_mut() {
                if slot.key == k && slot.generation == g {
                    slot.value = v;
                    slot.cost = cost;
                    slot.priority = cost;
                    return;
                }
            }
        }

        for pos in positions {
            if inner.slots[pos].is_none() {
                inner.slots[pos] = Some(Slot {
                    key: k,
                    generation: g,
                    value: v,
                    cost,
                    priority: cost,
                });
                return;
            }
        }

        let lowest = positions
            .into_iter()
            .min_by_key(|&pos| inner.slots[pos].as_ref().expect("occupied").priority)
            .expect("probe window is never empty");

        let incumbent_priority = inner.slots[lowest].as_ref().expect("occupied").priority;
        if incumbent_priority < cost {
            *inner.evictions_by_priority.entry(incumbent_priority).or_insert(0) += 1;
            inner.slots[lowest] = Some(Slot {
                key: k,
                generation: g,
                value: v,
                cost,
                priority: cost,
            });
        } else {
            trace!(cost, incumbent_priority, "priority table admission refused");
        }
    }

    /// Clears every slot whose generation satisfies `predicate`.
    pub fn retire<P>(&self, mut predicate: P)
    where
        P: FnMut(Generation) -> bool,
    {
        let mut inner = self.inner.lock();
        for slot in inner.slots.iter_mut() {
            if slot.as_ref().is_some_and(|s| predicate(s.generation)) {
                *slot = None;
            }
        }
    }

    /// Snapshot of counters and a fresh occupancy scan.
    pub fn stats(&self) -> PriorityTableStats {
        let inner = self.inner.lock();
        let mut occupancy = 0;
        let mut occupancy_by_priority = BTreeMap::new();
        for slot in inner.slots.iter().flatten() {
            occupancy += 1;
            *occupancy_by_priority.entry(slot.priority).or_insert(0) += 1;
        }
        PriorityTableStats {
            hits: inner.hits,
            misses: inner.misses,
            loads: inner.loads,
            evictions_by_priority: inner.evictions_by_priority.clone(),
            occupancy,
            occupancy_by_priority,
        }
    }
}

impl<K> std::fmt::Debug for PriorityTable<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityTable")
            .field("capacity", &self.capacity)
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
    fn test_capacity_rounds_up_to_power_of_two() {
        let table: PriorityTable<&str> = PriorityTable::new(5);
        assert_eq!(table.capacity(), 8);
    }

    #[test]
    fn test_zero_capacity_is_permanent_noop() {
        let table: PriorityTable<&str> = PriorityTable::new(0);
        assert_eq!(table.capacity(), 0);
        table.put("a", rid(1), 1, 255);
        assert_eq!(table.get(&"a", 1), None);
        assert_eq!(table.stats().occupancy, 0);
    }

    #[test]
    fn test_put_then_get() {
        let table: PriorityTable<&str> = PriorityTable::new(8);
        table.put("a", rid(1), 1, 10);
        assert_eq!(table.get(&"a", 1), Some(rid(1)));
    }

    #[test]
    fn test_generation_isolation() {
        let table: PriorityTable<&str> = PriorityTable::new(8);
        table.put("a", rid(1), 1, 10);
        assert_eq!(table.get(&"a", 2), None);
    }

    #[test]
    fn test_saturating_priority() {
        let table: PriorityTable<&str> = PriorityTable::new(8);
        table.put("a", rid(1), 1, 250);
        for _ in 0..20 {
            table.get(&"a", 1);
        }
        // priority cannot be directly observed, but repeated gets must
        // not panic or wrap; a following retire+reinsert at max cost
        // should still evict this slot only via priority comparison.
        table.put("b", rid(2), 1, 255);
        // with probe window collisions unlikely at capacity 8 for these
        // two keys, both entries should remain retrievable
        assert_eq!(table.get(&"a", 1), Some(rid(1)));
    }

    #[test]
    fn test_retire_clears_matching_generation() {
        let table: PriorityTable<&str> = PriorityTable::new(8);
        table.put("a", rid(1), 1, 10);
        table.put("b", rid(2), 2, 10);
        table.retire(|g| g == 1);
        assert_eq!(table.get(&"a", 1), None);
        assert_eq!(table.get(&"b", 2), Some(rid(2)));
    }

    #[test]
    fn test_stats_occupancy() {
        let table: PriorityTable<&str> = PriorityTable::new(8);
        table.put("a", rid(1), 1, 10);
        table.put("b", rid(2), 1, 10);
        let stats = table.stats();
        assert_eq!(stats.occupancy, 2);
        assert_eq!(stats.loads, 2);
    }

    // A table whose capacity equals PROBE_WINDOW has exactly one probe
    // window: every key's window covers all four slots, regardless of
    // its hash. This gives deterministic admission behavior without
    // needing to know the hash function.
    #[test]
    fn test_full_window_admission_rule() {
        let table: PriorityTable<&str> = PriorityTable::new(PROBE_WINDOW);
        assert_eq!(table.capacity(), PROBE_WINDOW);
        table.put("a", rid(1), 1, 10);
        table.put("b", rid(2), 1, 10);
        table.put("c", rid(3), 1, 10);
        table.put("d", rid(4), 1, 10);
        assert_eq!(table.stats().occupancy, 4);

        // Every slot holds priority 10; a lower-cost insert must leave
        // the table unchanged. Checked without any intervening `get`,
        // since a hit would bump the incumbents' priority away from 10.
        table.put("e", rid(5), 1, 5);
        assert_eq!(table.stats().occupancy, 4);
        assert_eq!(table.get(&"e", 1), None);

        // A higher-cost insert replaces exactly one incumbent slot.
        table.put("e", rid(5), 1, 20);
        assert_eq!(table.stats().occupancy, 4);
        assert_eq!(table.get(&"e", 1), Some(rid(5)));
        let survivors = ["a", "b", "c", "d"]
            .iter()
            .filter(|k| table.get(k, 1).is_some())
            .count();
        assert_eq!(survivors, 3, "exactly one incumbent is evicted");
        assert_eq!(table.stats().evictions_by_priority.get(&10), Some(&1));
    }
}
