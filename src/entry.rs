//! Unified cache entry type.
//!
//! `CacheEntry<K, V>` is the value a [`crate::list::List`] node holds inside
//! [`crate::record_map::RecordMap`]. It bundles the key (needed so the LRU
//! list can report which key it evicted), the stored [`RecordId`](crate::record::RecordId),
//! a size used for weight accounting, and access timestamps used for
//! diagnostics.
//!
//! # Examples
//!
//! ```
//! use dedup_cache_manager::entry::CacheEntry;
//!
//! let entry = CacheEntry::new("template:42", 1u64, 1);
//! assert_eq!(entry.key, "template:42");
//! assert_eq!(entry.value, 1);
//! ```

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A single slot in a [`RecordMap`](crate::record_map::RecordMap)'s eviction list.
pub struct CacheEntry<K, V> {
    /// The cached key.
    pub key: K,
    /// The cached value (a record locator).
    pub value: V,
    /// Weight this entry contributes to the map's `weight()` total.
    pub size: u64,
    last_accessed: u64,
    create_time: u64,
}

impl<K, V> CacheEntry<K, V> {
    /// Creates a new cache entry with the given size weight.
    #[inline]
    pub fn new(key: K, value: V, size: u64) -> Self {
        let now = Self::now_nanos();
        Self {
            key,
            value,
            size,
            last_accessed: now,
            create_time: now,
        }
    }

    /// Updates the last-accessed timestamp to the current time.
    #[inline]
    pub fn touch(&mut self) {
        self.last_accessed = Self::now_nanos();
    }

    /// Nanoseconds since UNIX epoch at which this entry was last accessed.
    #[inline]
    pub fn last_accessed(&self) -> u64 {
        self.last_accessed
    }

    /// Nanoseconds since UNIX epoch at which this entry was created.
    #[inline]
    pub fn create_time(&self) -> u64 {
        self.create_time
    }

    #[inline]
    fn now_nanos() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

impl<K: Clone, V: Clone> Clone for CacheEntry<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
            size: self.size,
            last_accessed: self.last_accessed,
            create_time: self.create_time,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for CacheEntry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("size", &self.size)
            .field("last_accessed", &self.last_accessed)
            .field("create_time", &self.create_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry() {
        let entry: CacheEntry<&str, i32> = CacheEntry::new("key", 42, 1);
        assert_eq!(entry.key, "key");
        assert_eq!(entry.value, 42);
        assert_eq!(entry.size, 1);
    }

    #[test]
    fn test_touch_updates_last_accessed() {
        let mut entry: CacheEntry<&str, i32> = CacheEntry::new("key", 42, 1);
        let initial = entry.last_accessed();
        entry.touch();
        assert!(entry.last_accessed() >= initial);
    }

    #[test]
    fn test_clone_entry() {
        let entry: CacheEntry<&str, i32> = CacheEntry::new("key", 42, 3);
        let cloned = entry.clone();
        assert_eq!(cloned.key, entry.key);
        assert_eq!(cloned.value, entry.value);
        assert_eq!(cloned.size, entry.size);
    }

    #[test]
    fn test_debug_impl() {
        let entry: CacheEntry<&str, i32> = CacheEntry::new("key", 42, 1);
        let debug_str = std::format!("{:?}", entry);
        assert!(debug_str.contains("CacheEntry"));
    }
}
