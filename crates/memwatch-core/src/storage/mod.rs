//! Durable log of monitor snapshots.
//!
//! - `entry` — the persisted [`LogEntry`] record
//! - `memory` — [`InMemoryLogStore`], process-local, for tests and store-less runs
//! - `file` — [`FileLogStore`], append-only framed log on disk

pub mod entry;
pub mod file;
pub mod memory;

use chrono::{DateTime, Utc};

pub use entry::LogEntry;
pub use file::FileLogStore;
pub use memory::InMemoryLogStore;

/// Error raised by a log store operation.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// I/O error while reading or writing the log.
    Io(String),
    /// A record could not be encoded or decoded.
    Codec(String),
    /// The store cannot serve requests right now.
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "I/O error: {}", msg),
            StoreError::Codec(msg) => write!(f, "Codec error: {}", msg),
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<postcard::Error> for StoreError {
    fn from(e: postcard::Error) -> Self {
        StoreError::Codec(e.to_string())
    }
}

/// Append-only collection of [`LogEntry`] records, queried by time range.
///
/// Stores assign `id` and `timestamp` on append when the entry arrives
/// without them, and return the stored entry. Ordering of query results is
/// insertion order for the stores in this crate.
pub trait LogStore: Send + Sync {
    fn append(&self, entry: LogEntry) -> Result<LogEntry, StoreError>;

    fn query_all(&self) -> Result<Vec<LogEntry>, StoreError>;

    /// Entries with `start <= timestamp <= end`.
    fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>, StoreError> {
        let mut entries = self.query_all()?;
        entries.retain(|e| e.timestamp >= start && e.timestamp <= end);
        Ok(entries)
    }

    /// Removes entries with `timestamp < cutoff` and returns how many.
    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
