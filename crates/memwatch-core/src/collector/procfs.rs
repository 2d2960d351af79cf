//! `/proc/self/status` based readings.
//!
//! Used for live-unit counts outside a tokio runtime and as a fallback source
//! on platforms where jemalloc is not the allocator.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::model::Snapshot;

use super::alloc::AllocationCounter;
use super::traits::{StatsSource, current_live_units};

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Memory and thread fields of `/proc/[pid]/status`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcStatus {
    /// Resident set size in bytes.
    pub vm_rss: u64,
    /// Virtual memory size in bytes.
    pub vm_size: u64,
    /// Data segment size in bytes.
    pub vm_data: u64,
    pub threads: u64,
}

/// Parses `/proc/[pid]/status` content.
///
/// Format is key:\tvalue pairs, one per line. Memory fields are in kB.
pub fn parse_status(content: &str) -> Result<ProcStatus, ParseError> {
    let mut fields: HashMap<&str, &str> = HashMap::new();
    for line in content.lines() {
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(key.trim(), value.trim());
        }
    }

    let threads = fields
        .get("Threads")
        .ok_or_else(|| ParseError::new("missing Threads field"))?
        .parse()
        .map_err(|_| ParseError::new("invalid Threads field"))?;

    let parse_kb = |key: &str| -> u64 {
        fields
            .get(key)
            .and_then(|s| s.split_whitespace().next())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0)
            * 1024
    };

    Ok(ProcStatus {
        vm_rss: parse_kb("VmRSS"),
        vm_size: parse_kb("VmSize"),
        vm_data: parse_kb("VmData"),
        threads,
    })
}

/// Reads the `Threads:` count from a status file.
pub fn read_thread_count(path: &Path) -> Option<u64> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_status(&content).ok().map(|s| s.threads)
}

/// Source backed by a `/proc/[pid]/status` file.
///
/// Reports resident bytes as allocated and virtual size as system bytes.
/// Collection counters are always zero.
pub struct ProcfsSource {
    status_path: PathBuf,
    counter: Option<&'static AllocationCounter>,
}

impl ProcfsSource {
    /// Creates a source reading `<proc_path>/self/status`.
    pub fn new(proc_path: impl AsRef<Path>) -> Self {
        Self::from_status_file(proc_path.as_ref().join("self").join("status"))
    }

    pub fn from_status_file(status_path: impl Into<PathBuf>) -> Self {
        Self {
            status_path: status_path.into(),
            counter: None,
        }
    }

    /// Reports cumulative allocations from `counter`.
    pub fn with_allocation_counter(mut self, counter: &'static AllocationCounter) -> Self {
        self.counter = Some(counter);
        self
    }

    fn read_status(&self) -> ProcStatus {
        match std::fs::read_to_string(&self.status_path) {
            Ok(content) => parse_status(&content).unwrap_or_else(|e| {
                warn!(path = %self.status_path.display(), error = %e, "unparsable status file");
                ProcStatus::default()
            }),
            Err(e) => {
                warn!(path = %self.status_path.display(), error = %e, "status file unreadable");
                ProcStatus::default()
            }
        }
    }
}

impl StatsSource for ProcfsSource {
    fn sample(&self) -> Snapshot {
        let status = self.read_status();
        Snapshot {
            allocated_bytes: status.vm_rss,
            total_allocated_bytes: self.counter.map_or(0, |c| c.total()),
            system_bytes: status.vm_size,
            gc_count: 0,
            gc_cpu_fraction: 0.0,
            live_units: current_live_units(),
        }
    }
}
