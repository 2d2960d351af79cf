//! memwatch-core — runtime memory observability for long-running services.
//!
//! Provides:
//! - `collector` — allocator/runtime statistics sources (`StatsSource`)
//! - `monitor` — shared peak tracking, threshold alerting, periodic sampling
//! - `alert` — alert sink capability and stock sinks
//! - `logger` — periodic snapshot persistence and log queries
//! - `storage` — log entry model and log stores (in-memory, file)
//! - `instrument` — per-request before/after deltas
//! - `fmt` — byte, signed and duration rendering
//! - `mock` — scripted sources and recording sinks for tests
//!
//! With `api` feature:
//! - `api` — JSON-serializable health report types

pub mod alert;
pub mod collector;
pub mod config;
pub mod fmt;
pub mod instrument;
pub mod logger;
pub mod mock;
pub mod model;
pub mod monitor;
pub mod storage;

#[cfg(feature = "api")]
pub mod api;

pub use alert::{AlertSink, LogAlertSink, NoopAlertSink};
pub use collector::StatsSource;
pub use config::MonitorConfig;
pub use logger::{PersistDiagnostics, PersistFailure, SnapshotLogger, TracingDiagnostics};
pub use model::Snapshot;
pub use monitor::Monitor;
pub use storage::{LogEntry, LogStore, StoreError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
