//! Shared application state, global allocator, and stats source selection.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

use memwatch_core::collector::CountingAllocator;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: CountingAllocator<Jemalloc> = CountingAllocator::new(Jemalloc);

#[cfg(target_env = "msvc")]
#[global_allocator]
static GLOBAL: CountingAllocator<std::alloc::System> = CountingAllocator::new(std::alloc::System);

use std::sync::Arc;

use axum::extract::State;
use tracing::info;

use memwatch_core::collector::ProcfsSource;
use memwatch_core::{Monitor, SnapshotLogger, StatsSource};

#[derive(Clone)]
pub(crate) struct WebState {
    pub(crate) monitor: Arc<Monitor>,
    pub(crate) logger: Arc<SnapshotLogger>,
}

pub(crate) type AppState = State<WebState>;

/// Picks the allocator-backed source, falling back to `/proc` readings when
/// jemalloc statistics are unavailable.
pub(crate) fn build_source() -> Arc<dyn StatsSource> {
    #[cfg(not(target_env = "msvc"))]
    match memwatch_core::collector::JemallocSource::new() {
        Ok(source) => {
            info!("using jemalloc statistics");
            return Arc::new(source.with_allocation_counter(GLOBAL.counter()));
        }
        Err(e) => tracing::warn!(error = %e, "jemalloc statistics unavailable, falling back to /proc"),
    }

    info!("using /proc statistics");
    Arc::new(ProcfsSource::new("/proc").with_allocation_counter(GLOBAL.counter()))
}
