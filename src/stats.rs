//! Read-only aggregated view over a cache family's counters.

/// Aggregated hit/miss/load/eviction counters for one cache family,
/// exposed for monitoring.
///
/// `total_load_time` is always 0: this subsystem does not measure load
/// latency, so the field exists to satisfy the external telemetry
/// contract without inventing a number.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsView {
    /// Total hits across every materialized generation (or, for
    /// nodes, the single shared table).
    pub hits: u64,
    /// Total misses across every materialized generation.
    pub misses: u64,
    /// Total `put` calls (loads) across every materialized generation.
    pub loads: u64,
    /// Total entries evicted across every materialized generation.
    pub evictions: u64,
    /// Total number of entries currently stored.
    pub size: u64,
    /// Total weight of entries currently stored.
    pub weight: u64,
    /// Always 0; load latency is not tracked by this subsystem.
    pub total_load_time: u64,
}

impl StatsView {
    /// Fraction of `get` calls that were hits, or 0.0 if there have
    /// been no calls yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_with_no_requests() {
        let stats = StatsView::default();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_computation() {
        let stats = StatsView {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_total_load_time_is_always_zero() {
        let stats = StatsView::default();
        assert_eq!(stats.total_load_time, 0);
    }
}
