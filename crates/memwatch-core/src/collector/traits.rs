//! The statistics source abstraction.
//!
//! The `StatsSource` trait lets the monitor read allocator statistics from the
//! real allocator in production and from scripted sources in tests.

use std::path::Path;
use std::sync::Arc;

use crate::model::Snapshot;

use super::procfs;

/// A capability that returns a point-in-time statistics reading.
///
/// Sources are total: they never fail. A source that cannot read one of its
/// counters reports zero for it.
pub trait StatsSource: Send + Sync {
    /// Takes one reading.
    fn sample(&self) -> Snapshot;

    /// Number of live execution units, without a full reading.
    fn live_units(&self) -> i64 {
        current_live_units()
    }
}

impl<S: StatsSource + ?Sized> StatsSource for Arc<S> {
    fn sample(&self) -> Snapshot {
        (**self).sample()
    }

    fn live_units(&self) -> i64 {
        (**self).live_units()
    }
}

/// Counts live execution units of the current process.
///
/// Inside a tokio runtime this is the number of alive tasks. Outside one it is
/// the OS thread count from `/proc/self/status`, or 1 when that is unreadable.
pub fn current_live_units() -> i64 {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        return handle.metrics().num_alive_tasks() as i64;
    }
    procfs::read_thread_count(Path::new("/proc/self/status"))
        .map(|n| n as i64)
        .unwrap_or(1)
}
