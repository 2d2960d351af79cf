//! jemalloc-backed statistics source.
//!
//! Reads `stats.allocated` and `stats.mapped` after advancing the stats epoch.
//! jemalloc has no garbage collector; its closest equivalent is the purge
//! sweep that returns dirty and muzzy pages to the OS, so the collection
//! counter is the merged `dirty_npurge + muzzy_npurge` across all arenas.
//! jemalloc does not account CPU time spent purging, so `gc_cpu_fraction` is
//! always 0.

use tikv_jemalloc_ctl::{epoch, epoch_mib, stats};
use tracing::warn;

use crate::model::Snapshot;

use super::alloc::AllocationCounter;
use super::traits::{StatsSource, current_live_units};

// MALLCTL_ARENAS_ALL: merged statistics of every arena.
const DIRTY_NPURGE: &[u8] = b"stats.arenas.4096.dirty_npurge\0";
const MUZZY_NPURGE: &[u8] = b"stats.arenas.4096.muzzy_npurge\0";

pub struct JemallocSource {
    epoch: epoch_mib,
    allocated: stats::allocated_mib,
    mapped: stats::mapped_mib,
    counter: Option<&'static AllocationCounter>,
}

impl JemallocSource {
    pub fn new() -> Result<Self, tikv_jemalloc_ctl::Error> {
        Ok(Self {
            epoch: epoch::mib()?,
            allocated: stats::allocated::mib()?,
            mapped: stats::mapped::mib()?,
            counter: None,
        })
    }

    /// Reports cumulative allocations from `counter`, typically the one of a
    /// [`CountingAllocator`](super::CountingAllocator) installed as global allocator.
    pub fn with_allocation_counter(mut self, counter: &'static AllocationCounter) -> Self {
        self.counter = Some(counter);
        self
    }

    fn purge_count(&self) -> u64 {
        let read = |name: &[u8]| -> u64 {
            // SAFETY: both names are NUL-terminated and refer to uint64_t counters.
            match unsafe { tikv_jemalloc_ctl::raw::read::<u64>(name) } {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "jemalloc purge counter unavailable");
                    0
                }
            }
        };
        read(DIRTY_NPURGE).saturating_add(read(MUZZY_NPURGE))
    }
}

impl StatsSource for JemallocSource {
    fn sample(&self) -> Snapshot {
        if let Err(e) = self.epoch.advance() {
            warn!(error = %e, "jemalloc epoch advance failed, stats may be stale");
        }
        let allocated = self.allocated.read().unwrap_or_else(|e| {
            warn!(error = %e, "jemalloc stats.allocated unavailable");
            0
        });
        let mapped = self.mapped.read().unwrap_or_else(|e| {
            warn!(error = %e, "jemalloc stats.mapped unavailable");
            0
        });

        Snapshot {
            allocated_bytes: allocated as u64,
            total_allocated_bytes: self.counter.map_or(0, |c| c.total()),
            system_bytes: mapped as u64,
            gc_count: self.purge_count().min(u32::MAX as u64) as u32,
            gc_cpu_fraction: 0.0,
            live_units: current_live_units(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jemalloc_source_samples() {
        let source = JemallocSource::new().unwrap();
        let snap = source.sample();
        assert_eq!(snap.gc_cpu_fraction, 0.0);
        assert_eq!(snap.total_allocated_bytes, 0);
        assert!(snap.live_units >= 1);
    }

    #[test]
    fn test_jemalloc_source_reports_counter() {
        static COUNTER: AllocationCounter = AllocationCounter::new();
        COUNTER.record(1024);
        let source = JemallocSource::new()
            .unwrap()
            .with_allocation_counter(&COUNTER);
        assert_eq!(source.sample().total_allocated_bytes, 1024);
    }
}
