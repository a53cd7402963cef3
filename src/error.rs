//! The one caller-triggerable fault this crate defines.

/// Errors returned by [`crate::manager::CacheManager`] and its handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// Raised when a caller invokes the bare `put(key, value)` form on
    /// a node-cache handle, which requires an explicit cost.
    #[error("put(key, value) without a cost is not supported on the node cache; use put(key, value, cost)")]
    UnsupportedOperation,
}
