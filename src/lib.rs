//! Deduplication cache manager for a segment-based content store's
//! writer.
//!
//! When the writer serializes nodes, templates, and strings into
//! immutable storage segments, this crate answers: have we already
//! persisted a record with this logical identity in the current
//! generation? A hit returns the existing physical record locator and
//! avoids a duplicate write; a miss forces the writer to allocate and
//! record a new one.
//!
//! Two properties make this worth specifying in isolation from the
//! rest of the writer:
//!
//! - **Generation striping.** The store performs periodic compaction
//!   that assigns every new record to a generation. Records from
//!   older, reclaimable generations must never be reused by a writer
//!   targeting a newer generation, so cache state is partitioned by
//!   generation and can be bulk-retired.
//! - **Concurrent, lazy per-generation creation with priority-weighted
//!   eviction for the node cache.** Multiple writer threads may
//!   simultaneously request a generation that does not yet exist;
//!   exactly one instance is created. The node cache additionally
//!   supports cost-weighted priority eviction across a single table
//!   shared by every generation.
//!
//! # Example
//!
//! ```
//! use dedup_cache_manager::{CacheManager, CacheManagerConfig, Operation, RecordId};
//!
//! let manager = CacheManager::new(CacheManagerConfig::default());
//!
//! let locator = RecordId::new(0, 0, 42);
//! manager.string_cache(5, Operation::Write).put("hello".to_string(), locator);
//! assert_eq!(
//!     manager.string_cache(5, Operation::Write).get(&"hello".to_string()),
//!     Some(locator)
//! );
//! // A different generation never sees this generation's writes.
//! assert_eq!(manager.string_cache(6, Operation::Write).get(&"hello".to_string()), None);
//! ```
//!
//! ## Modules
//!
//! - [`record`]: the fixed-size key/locator types the caches are keyed
//!   and valued by (`RecordId`, `StableId`, `Template`).
//! - [`entry`]: the unified cache entry type backing
//!   [`record_map::RecordMap`]'s eviction list.
//! - [`list`]: the intrusive doubly linked list used for O(1)
//!   least-recently-used eviction.
//! - [`record_map`]: `RecordMap<K>`, the bounded per-generation
//!   deduplication map used by the string and template families.
//! - [`priority_table`]: `PriorityTable<K>`, the shared, cost-weighted
//!   node cache.
//! - [`generation_index`]: `GenerationIndex<V>`, concurrent, lazy,
//!   at-most-once per-generation construction.
//! - [`access_tracker`]: `AccessTracker<H>`, the telemetry wrapper
//!   placed in front of every cache handle.
//! - [`stats`]: `StatsView`, the read-only stats aggregation exposed to
//!   monitoring.
//! - [`metrics_sink`]: the pluggable `StatsSink` trait and its default
//!   in-memory implementation.
//! - [`config`]: `CacheManagerConfig`, the construction-time capacity
//!   knobs.
//! - [`error`]: `CacheError`, the one caller-triggerable fault.
//! - [`manager`]: `CacheManager`, the top-level façade.

pub mod access_tracker;
pub mod config;
pub mod entry;
pub mod error;
pub mod generation_index;
pub(crate) mod list;
pub mod manager;
pub mod metrics_sink;
pub mod priority_table;
pub mod record;
pub mod record_map;
pub mod stats;

/// Monotonic label attached to every record written during a
/// compaction epoch. Generations need not be contiguous; two
/// generations are equal only if their integer values match.
pub type Generation = i64;

pub use config::CacheManagerConfig;
pub use error::CacheError;
pub use manager::{CacheManager, NodeCacheHandle, Operation, RecordMapHandle};
pub use metrics_sink::{CountingStatsSink, NoopStatsSink, StatsSink};
pub use record::{RecordId, StableId, Template};
pub use stats::StatsView;
