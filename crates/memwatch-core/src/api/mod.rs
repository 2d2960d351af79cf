//! API types for memwatch-web JSON serialization.
//!
//! Byte counts in health reports are pre-rendered with `format_bytes`;
//! log entries are returned raw (see [`LogEntry`](crate::LogEntry)).

pub mod health;
pub mod logs;

pub use health::{HealthReport, MemoryReport, ServiceHealth};
pub use logs::PurgeResult;
