//! Statistics sources for the monitor.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                       Monitor                        │
//! └──────────────────────────┬───────────────────────────┘
//!                            │
//!                     ┌──────▼──────┐
//!                     │ StatsSource │ (trait)
//!                     └──────┬──────┘
//!              ┌─────────────┼───────────────┐
//!       ┌──────▼───────┐ ┌───▼────────┐ ┌────▼──────────┐
//!       │JemallocSource│ │ProcfsSource│ │ScriptedSource │
//!       │ (allocator)  │ │ (/proc)    │ │ (testing)     │
//!       └──────┬───────┘ └────────────┘ └───────────────┘
//!              │
//!     ┌────────▼─────────┐
//!     │CountingAllocator │ cumulative bytes
//!     └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use memwatch_core::collector::StatsSource;
//! use memwatch_core::mock::ScriptedSource;
//!
//! let source = ScriptedSource::allocations(&[10, 20]);
//! assert_eq!(source.sample().allocated_bytes, 10);
//! assert_eq!(source.sample().allocated_bytes, 20);
//! ```

pub mod alloc;
#[cfg(feature = "jemalloc")]
pub mod jemalloc;
pub mod procfs;
pub mod traits;

pub use alloc::{AllocationCounter, CountingAllocator};
#[cfg(feature = "jemalloc")]
pub use jemalloc::JemallocSource;
pub use procfs::ProcfsSource;
pub use traits::{StatsSource, current_live_units};
