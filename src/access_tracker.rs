//! Telemetry wrapper placed between a writer and the cache it talks to.
//!
//! `AccessTracker<H>` wraps a handle `H` and reports `get`/miss counts
//! to a [`StatsSink`] under a fixed name, without the wrapped handle
//! needing any awareness of telemetry itself.

use std::sync::Arc;

use crate::metrics_sink::StatsSink;

/// Wraps a cache handle, reporting `<name>.access-count` on every call
/// and `<name>.miss-count` whenever the wrapped `get` returns nothing.
pub struct AccessTracker<H> {
    name: String,
    handle: H,
    sink: Arc<dyn StatsSink>,
}

impl<H> AccessTracker<H> {
    /// Wraps `handle`, reporting counters under `name` to `sink`.
    pub fn new(name: impl Into<String>, handle: H, sink: Arc<dyn StatsSink>) -> Self {
        Self {
            name: name.into(),
            handle,
            sink,
        }
    }

    /// Looks up `k` via the wrapped handle's `get`, reporting access
    /// and (on a miss) miss counters.
    pub fn get<K, V>(&self, k: &K) -> Option<V>
    where
        H: TrackedGet<K, V>,
    {
        self.sink.increment(&format!("{}.access-count", self.name));
        let result = self.handle.tracked_get(k);
        if result.is_none() {
            self.sink.increment(&format!("{}.miss-count", self.name));
        }
        result
    }

    /// Direct access to the wrapped handle, for `put` and any
    /// handle-specific methods telemetry does not need to observe.
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// The counter name prefix this tracker reports under.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<H: std::fmt::Debug> std::fmt::Debug for AccessTracker<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTracker")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .finish()
    }
}

/// Implemented by handle types that `AccessTracker` can wrap, so the
/// tracker can call `get` generically without knowing the handle's
/// concrete key/value types.
pub trait TrackedGet<K, V> {
    /// The handle's own `get`, forwarded to by
    /// [`AccessTracker::get`].
    fn tracked_get(&self, k: &K) -> Option<V>;
}
