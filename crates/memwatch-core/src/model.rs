//! Point-in-time statistics reading.

use serde::{Deserialize, Serialize};

/// One reading of process memory and concurrency statistics.
///
/// Produced fresh by every [`Monitor::snapshot`](crate::Monitor::snapshot)
/// call and never mutated afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Bytes currently allocated and not yet freed.
    pub allocated_bytes: u64,
    /// Cumulative bytes allocated, including freed ones.
    pub total_allocated_bytes: u64,
    /// Bytes obtained from the operating system.
    pub system_bytes: u64,
    /// Completed collection (purge) cycles reported by the allocator.
    pub gc_count: u32,
    /// Fraction of CPU time spent in collection. In `[0, 1]` by convention only.
    pub gc_cpu_fraction: f64,
    /// Live concurrently schedulable units (tasks or threads).
    pub live_units: i64,
}

impl Snapshot {
    /// Whether `allocated_bytes` exceeds `threshold` of `system_bytes`.
    ///
    /// A threshold `<= 0` never crosses.
    pub fn crosses(&self, threshold: f64) -> bool {
        threshold > 0.0 && self.allocated_bytes as f64 > threshold * self.system_bytes as f64
    }
}
