//! Construction-time configuration for [`crate::manager::CacheManager`].

use tracing::debug;

/// Default maximum entries per string-cache generation.
pub const DEFAULT_STRING_CACHE_SIZE: usize = 15_000;
/// Default maximum entries per template-cache generation.
pub const DEFAULT_TEMPLATE_CACHE_SIZE: usize = 3_000;
/// Default total slots in the shared node priority table.
pub const DEFAULT_NODE_CACHE_SIZE: usize = 1_048_576;

/// The three capacity knobs a [`crate::manager::CacheManager`] is
/// built from: a `Default` carrying the documented defaults, plus
/// `with_*` builders for host overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheManagerConfig {
    /// Max entries per string-cache generation.
    pub string_cache_size: usize,
    /// Max entries per template-cache generation.
    pub template_cache_size: usize,
    /// Total slots in the shared node priority table. Rounded up to
    /// the next power of two at construction.
    pub node_cache_size: usize,
}

impl CacheManagerConfig {
    /// Builds a config, rounding `node_cache_size` up to the next
    /// power of two if it is not already one.
    pub fn new(string_cache_size: usize, template_cache_size: usize, node_cache_size: usize) -> Self {
        let rounded = node_cache_size.max(1).next_power_of_two();
        if rounded != node_cache_size {
            debug!(
                requested = node_cache_size,
                rounded, "rounded node_cache_size up to a power of two"
            );
        }
        Self {
            string_cache_size,
            template_cache_size,
            node_cache_size: rounded,
        }
    }

    /// Returns a copy with `string_cache_size` set to `size`.
    pub fn with_string_cache_size(mut self, size: usize) -> Self {
        self.string_cache_size = size;
        self
    }

    /// Returns a copy with `template_cache_size` set to `size`.
    pub fn with_template_cache_size(mut self, size: usize) -> Self {
        self.template_cache_size = size;
        self
    }

    /// Returns a copy with `node_cache_size` set to `size`, rounded up
    /// to the next power of two.
    pub fn with_node_cache_size(mut self, size: usize) -> Self {
        let rounded = size.max(1).next_power_of_two();
        if rounded != size {
            debug!(requested = size, rounded, "rounded node_cache_size up to a power of two");
        }
        self.node_cache_size = rounded;
        self
    }

    /// A config with all three sizes set to zero, used by
    /// [`crate::manager::CacheManager::empty`] to disable every family's
    /// retention outright.
    pub fn empty() -> Self {
        Self {
            string_cache_size: 0,
            template_cache_size: 0,
            node_cache_size: 0,
        }
    }
}

impl Default for CacheManagerConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_STRING_CACHE_SIZE,
            DEFAULT_TEMPLATE_CACHE_SIZE,
            DEFAULT_NODE_CACHE_SIZE,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_documented_values() {
        let config = CacheManagerConfig::default();
        assert_eq!(config.string_cache_size, 15_000);
        assert_eq!(config.template_cache_size, 3_000);
        assert_eq!(config.node_cache_size, 1_048_576);
    }

    #[test]
    fn test_node_cache_size_rounds_up() {
        let config = CacheManagerConfig::new(1, 1, 5);
        assert_eq!(config.node_cache_size, 8);
    }

    #[test]
    fn test_with_builders() {
        let config = CacheManagerConfig::default()
            .with_string_cache_size(1)
            .with_template_cache_size(2)
            .with_node_cache_size(3);
        assert_eq!(config.string_cache_size, 1);
        assert_eq!(config.template_cache_size, 2);
        assert_eq!(config.node_cache_size, 4);
    }

    #[test]
    fn test_empty_config() {
        let config = CacheManagerConfig::empty();
        assert_eq!(config.string_cache_size, 0);
        assert_eq!(config.template_cache_size, 0);
        assert_eq!(config.node_cache_size, 0);
    }
}
