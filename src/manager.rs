//! Top-level façade composing the string, template, and node caches.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::access_tracker::{AccessTracker, TrackedGet};
use crate::config::CacheManagerConfig;
use crate::error::CacheError;
use crate::generation_index::GenerationIndex;
use crate::metrics_sink::{CountingStatsSink, StatsSink};
use crate::priority_table::PriorityTable;
use crate::record::{RecordId, StableId, Template};
use crate::record_map::RecordMap;
use crate::stats::StatsView;
use crate::Generation;

/// Distinguishes the caller's intent for telemetry naming only;
/// `get`/`put` behave identically regardless of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// A write-path lookup or insert.
    Write,
    /// A compaction-path lookup or insert.
    Compact,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Write => "write",
            Operation::Compact => "compact",
        })
    }
}

impl<K> TrackedGet<K, RecordId> for Arc<RecordMap<K>>
where
    K: std::hash::Hash + Eq,
{
    fn tracked_get(&self, k: &K) -> Option<RecordId> {
        self.as_ref().get(k)
    }
}

/// Handle bound to one `(generation, operation)` pair over a
/// [`RecordMap`], reporting telemetry through a wrapped
/// [`AccessTracker`].
pub struct RecordMapHandle<K> {
    tracker: AccessTracker<Arc<RecordMap<K>>>,
}

impl<K> RecordMapHandle<K>
where
    K: std::hash::Hash + Eq + Clone,
{
    fn new(name: String, map: Arc<RecordMap<K>>, sink: Arc<dyn StatsSink>) -> Self {
        Self {
            tracker: AccessTracker::new(name, map, sink),
        }
    }

    /// Looks up `k`, reporting access/miss telemetry.
    pub fn get(&self, k: &K) -> Option<RecordId> {
        self.tracker.get(k)
    }

    /// Inserts or updates `k -> v`.
    pub fn put(&self, k: K, v: RecordId) {
        self.tracker.handle().put(k, v)
    }
}

impl<K: fmt::Debug> fmt::Debug for RecordMapHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordMapHandle").field("tracker", &self.tracker).finish()
    }
}

/// The unwrapped view a [`NodeCacheHandle`] forwards to: a shared
/// [`PriorityTable`] with a generation baked in. Binds `(generation,
/// table)` without cloning or re-deriving the table on every call.
struct NodeCacheView {
    generation: Generation,
    table: Arc<PriorityTable<StableId>>,
}

impl TrackedGet<StableId, RecordId> for NodeCacheView {
    fn tracked_get(&self, k: &StableId) -> Option<RecordId> {
        self.table.get(k, self.generation)
    }
}

impl fmt::Debug for NodeCacheView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCacheView").field("generation", &self.generation).finish()
    }
}

/// Handle bound to one `(generation, operation)` pair over the shared
/// node [`PriorityTable`].
///
/// Exposes only `put(k, v, cost)` as a real inherent method; the bare,
/// two-argument `put(k, v)` shape is deliberately a different method,
/// [`NodeCacheHandle::put_unsupported`], that always returns
/// `Err(CacheError::UnsupportedOperation)` rather than type-checking
/// silently and failing only at runtime.
pub struct NodeCacheHandle {
    tracker: AccessTracker<NodeCacheView>,
}

impl NodeCacheHandle {
    fn new(name: String, generation: Generation, table: Arc<PriorityTable<StableId>>, sink: Arc<dyn StatsSink>) -> Self {
        Self {
            tracker: AccessTracker::new(name, NodeCacheView { generation, table }, sink),
        }
    }

    /// Looks up `k` in this handle's generation, reporting access/miss
    /// telemetry.
    pub fn get(&self, k: &StableId) -> Option<RecordId> {
        self.tracker.get(k)
    }

    /// Inserts `k -> v` with the given admission cost.
    pub fn put(&self, k: StableId, v: RecordId, cost: u8) {
        let view = self.tracker.handle();
        view.table.put(k, v, view.generation, cost)
    }

    /// Always fails: the node cache requires an explicit cost on
    /// insert. Exists so callers reaching for the bare two-argument
    /// `put` get a method that visibly always errors.
    pub fn put_unsupported(&self, _k: StableId, _v: RecordId) -> Result<(), CacheError> {
        warn!(
            handle = self.tracker.name(),
            "put(key, value) without a cost is not supported on the node cache"
        );
        Err(CacheError::UnsupportedOperation)
    }
}

impl fmt::Debug for NodeCacheHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCacheHandle").field("tracker", &self.tracker).finish()
    }
}

/// Façade owning the string and template generation indexes plus the
/// shared node priority table.
pub struct CacheManager {
    strings: GenerationIndex<RecordMap<String>>,
    templates: GenerationIndex<RecordMap<Template>>,
    nodes: Arc<PriorityTable<StableId>>,
    stats_sink: Arc<dyn StatsSink>,
    string_cache_size: usize,
    template_cache_size: usize,
}

impl CacheManager {
    /// Builds a manager from `config`, installing a fresh
    /// [`CountingStatsSink`].
    pub fn new(config: CacheManagerConfig) -> Self {
        Self::with_sink(config, Arc::new(CountingStatsSink::new()))
    }

    /// Builds a manager from `config`, reporting telemetry to
    /// `sink` instead of a fresh in-memory sink.
    pub fn with_sink(config: CacheManagerConfig, sink: Arc<dyn StatsSink>) -> Self {
        let string_cache_size = config.string_cache_size;
        let template_cache_size = config.template_cache_size;
        Self {
            strings: GenerationIndex::new(move || RecordMap::new(string_cache_size)),
            templates: GenerationIndex::new(move || RecordMap::new(template_cache_size)),
            nodes: Arc::new(PriorityTable::new(config.node_cache_size)),
            stats_sink: sink,
            string_cache_size,
            template_cache_size,
        }
    }

    /// A manager that retains nothing on any family: string and
    /// template `put`s are dropped and `get` always misses, and the
    /// node cache's `put` is a no-op whose `get` always returns `None`.
    /// The node cache's bare, uncosted `put` form still always returns
    /// `Err(CacheError::UnsupportedOperation)`, independent of capacity.
    pub fn empty() -> Self {
        Self::new(CacheManagerConfig::empty())
    }

    /// Returns a handle over the string cache for `(g, op)`.
    pub fn string_cache(&self, g: Generation, op: Operation) -> RecordMapHandle<String> {
        let map = self.strings.get_or_create(g);
        RecordMapHandle::new(
            format!("string-deduplication-cache-{op}"),
            map,
            self.stats_sink.clone(),
        )
    }

    /// Returns a handle over the template cache for `(g, op)`.
    pub fn template_cache(&self, g: Generation, op: Operation) -> RecordMapHandle<Template> {
        let map = self.templates.get_or_create(g);
        RecordMapHandle::new(
            format!("template-deduplication-cache-{op}"),
            map,
            self.stats_sink.clone(),
        )
    }

    /// Returns a handle over the shared node cache, scoped to `(g, op)`.
    pub fn node_cache(&self, g: Generation, op: Operation) -> NodeCacheHandle {
        NodeCacheHandle::new(
            format!("node-deduplication-cache-{op}"),
            g,
            self.nodes.clone(),
            self.stats_sink.clone(),
        )
    }

    /// Retires every generation matching `predicate` from the string
    /// and template indexes, and every node-table slot whose
    /// generation matches, logging the counts.
    pub fn retire<P>(&self, mut predicate: P)
    where
        P: FnMut(Generation) -> bool,
    {
        let strings_retired = self.strings.retire(&mut predicate);
        let templates_retired = self.templates.retire(&mut predicate);
        let nodes_before = self.nodes.stats().occupancy;
        self.nodes.retire(&mut predicate);
        let nodes_cleared = nodes_before - self.nodes.stats().occupancy;
        info!(
            strings_retired,
            templates_retired, nodes_cleared, "retired generations from cache manager"
        );
    }

    /// Aggregated stats across every materialized string-cache
    /// generation.
    pub fn string_stats(&self) -> StatsView {
        aggregate_record_map_stats(self.strings.iter())
    }

    /// Aggregated stats across every materialized template-cache
    /// generation.
    pub fn template_stats(&self) -> StatsView {
        aggregate_record_map_stats(self.templates.iter())
    }

    /// Stats for the single shared node table.
    pub fn node_stats(&self) -> StatsView {
        let stats = self.nodes.stats();
        let evictions = stats.evictions_by_priority.values().sum();
        StatsView {
            hits: stats.hits,
            misses: stats.misses,
            loads: stats.loads,
            evictions,
            size: stats.occupancy as u64,
            weight: stats.occupancy as u64,
            total_load_time: 0,
        }
    }

    /// Human-readable summary of node-table occupancy, bucketed by the
    /// priority each occupied slot currently holds.
    pub fn node_occupancy(&self) -> Option<String> {
        let stats = self.nodes.stats();
        if stats.occupancy == 0 {
            return None;
        }
        let buckets = stats
            .occupancy_by_priority
            .iter()
            .map(|(priority, count)| format!("{priority}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(
            "{}/{} slots occupied [{}]",
            stats.occupancy,
            self.nodes.capacity(),
            buckets
        ))
    }

    /// The configured per-generation string-cache capacity.
    pub fn string_cache_size(&self) -> usize {
        self.string_cache_size
    }

    /// The configured per-generation template-cache capacity.
    pub fn template_cache_size(&self) -> usize {
        self.template_cache_size
    }
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("strings", &self.strings)
            .field("templates", &self.templates)
            .field("nodes", &self.nodes)
            .finish()
    }
}

fn aggregate_record_map_stats<K>(maps: Vec<Arc<RecordMap<K>>>) -> StatsView {
    let mut view = StatsView::default();
    for map in maps {
        let counters = map.counters();
        view.hits += counters.hits;
        view.misses += counters.misses;
        view.loads += counters.loads;
        view.evictions += counters.evictions;
        view.size += map.size();
        view.weight += map.weight();
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(n: u32) -> RecordId {
        RecordId::new(0, 0, n)
    }

    #[test]
    fn test_s1_basic_dedup() {
        let manager = CacheManager::new(CacheManagerConfig::default());
        manager.string_cache(5, Operation::Write).put("foo".to_string(), rid(1));
        assert_eq!(manager.string_cache(5, Operation::Write).get(&"foo".to_string()), Some(rid(1)));
        assert_eq!(manager.string_cache(6, Operation::Write).get(&"foo".to_string()), None);
    }

    #[test]
    fn test_s2_retirement() {
        let manager = CacheManager::new(CacheManagerConfig::default());
        manager.string_cache(5, Operation::Write).put("foo".to_string(), rid(1));
        manager.retire(|g| g == 5);
        assert_eq!(manager.string_cache(5, Operation::Write).get(&"foo".to_string()), None);
        manager.string_cache(5, Operation::Write).put("foo".to_string(), rid(2));
        assert_eq!(manager.string_cache(5, Operation::Write).get(&"foo".to_string()), Some(rid(2)));
    }

    #[test]
    fn test_s5_telemetry() {
        let sink = Arc::new(CountingStatsSink::new());
        let manager = CacheManager::with_sink(CacheManagerConfig::default(), sink.clone());
        assert_eq!(manager.string_cache(7, Operation::Write).get(&"x".to_string()), None);
        assert_eq!(sink.count("string-deduplication-cache-write.access-count"), 1);
        assert_eq!(sink.count("string-deduplication-cache-write.miss-count"), 1);

        manager.string_cache(7, Operation::Write).put("x".to_string(), rid(1));
        assert_eq!(manager.string_cache(7, Operation::Write).get(&"x".to_string()), Some(rid(1)));
        assert_eq!(sink.count("string-deduplication-cache-write.access-count"), 2);
        assert_eq!(sink.count("string-deduplication-cache-write.miss-count"), 1);
    }

    #[test]
    fn test_s6_unsupported_put_on_nodes() {
        let manager = CacheManager::new(CacheManagerConfig::default());
        let handle = manager.node_cache(0, Operation::Write);
        assert_eq!(handle.put_unsupported(StableId::new([1; 16]), rid(1)), Err(CacheError::UnsupportedOperation));
        handle.put(StableId::new([1; 16]), rid(1), 1);
        assert_eq!(handle.get(&StableId::new([1; 16])), Some(rid(1)));
    }

    #[test]
    fn test_empty_manager_contract() {
        let manager = CacheManager::empty();
        assert_eq!(manager.string_cache(0, Operation::Write).get(&"x".to_string()), None);
        manager.string_cache(0, Operation::Write).put("x".to_string(), rid(1));
        assert_eq!(manager.string_cache(0, Operation::Write).get(&"x".to_string()), None);

        assert_eq!(manager.template_cache(0, Operation::Write).get(&Template::new(vec![1])), None);
        manager
            .template_cache(0, Operation::Write)
            .put(Template::new(vec![1]), rid(1));
        assert_eq!(manager.template_cache(0, Operation::Write).get(&Template::new(vec![1])), None);

        let handle = manager.node_cache(0, Operation::Write);
        assert_eq!(handle.put_unsupported(StableId::new([2; 16]), rid(2)), Err(CacheError::UnsupportedOperation));
        handle.put(StableId::new([2; 16]), rid(2), 255);
        assert_eq!(handle.get(&StableId::new([2; 16])), None);
        assert_eq!(manager.node_occupancy(), None);
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Write.to_string(), "write");
        assert_eq!(Operation::Compact.to_string(), "compact");
    }

    #[test]
    fn test_node_occupancy_reports_none_when_empty() {
        let manager = CacheManager::new(CacheManagerConfig::default());
        assert_eq!(manager.node_occupancy(), None);
        manager.node_cache(0, Operation::Write).put(StableId::new([1; 16]), rid(1), 1);
        assert!(manager.node_occupancy().is_some());
    }

    #[test]
    fn test_node_occupancy_buckets_by_priority() {
        let manager = CacheManager::new(CacheManagerConfig::default().with_node_cache_size(16));
        manager.node_cache(0, Operation::Write).put(StableId::new([1; 16]), rid(1), 5);
        manager.node_cache(0, Operation::Write).put(StableId::new([2; 16]), rid(2), 9);
        let summary = manager.node_occupancy().expect("occupied");
        assert!(summary.contains("2/16 slots occupied"));
        assert!(summary.contains("5: 1"));
        assert!(summary.contains("9: 1"));
    }
}
