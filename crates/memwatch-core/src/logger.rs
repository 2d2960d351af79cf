//! Periodic snapshot persistence and log queries.
//!
//! The logger samples its bound [`Monitor`] on each tick and appends the
//! result to a [`LogStore`]. Persistence is best-effort: a failed append is
//! reported through [`PersistDiagnostics`] and the loop carries on. Appends
//! run on the blocking pool, so store I/O never stalls the async runtime.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::fmt::{format_bytes, format_fraction};
use crate::model::Snapshot;
use crate::monitor::Monitor;
use crate::storage::{LogEntry, LogStore, StoreError};

/// A failed append, as seen by diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistFailure {
    /// When the tick that failed took its snapshot.
    pub timestamp: DateTime<Utc>,
    pub error: StoreError,
}

impl std::fmt::Display for PersistFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to persist snapshot taken at {}: {}", self.timestamp, self.error)
    }
}

/// Receiver of soft persistence failures.
pub trait PersistDiagnostics: Send + Sync {
    fn report(&self, failure: &PersistFailure);
}

/// Logs each failure at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl PersistDiagnostics for TracingDiagnostics {
    fn report(&self, failure: &PersistFailure) {
        error!(
            error = %failure.error,
            timestamp = %failure.timestamp,
            "failed to save memory log"
        );
    }
}

pub struct SnapshotLogger {
    monitor: Arc<Monitor>,
    store: Arc<dyn LogStore>,
    diagnostics: Arc<dyn PersistDiagnostics>,
}

impl SnapshotLogger {
    pub fn new(monitor: Arc<Monitor>, store: Arc<dyn LogStore>) -> Self {
        Self::with_diagnostics(monitor, store, Arc::new(TracingDiagnostics))
    }

    pub fn with_diagnostics(
        monitor: Arc<Monitor>,
        store: Arc<dyn LogStore>,
        diagnostics: Arc<dyn PersistDiagnostics>,
    ) -> Self {
        Self {
            monitor,
            store,
            diagnostics,
        }
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    /// Takes one snapshot and appends it synchronously.
    ///
    /// Failures are reported to diagnostics and also returned.
    pub fn log_once(&self) -> Result<LogEntry, PersistFailure> {
        let snapshot = self.monitor.snapshot();
        let now = Utc::now();
        log_stats(&snapshot);
        persist(&*self.store, &snapshot, now).inspect_err(|failure| {
            self.diagnostics.report(failure);
        })
    }

    /// Persists one snapshot every `interval` until `cancel` fires.
    ///
    /// The first entry is written one interval after the call.
    pub async fn run_periodic(&self, cancel: CancellationToken, interval: Duration) {
        let mut tick = tokio::time::interval_at(Instant::now() + interval, interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = interval.as_millis() as u64, "memory logging started");

        let mut persisted: u64 = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    let snapshot = self.monitor.snapshot();
                    let now = Utc::now();
                    log_stats(&snapshot);

                    let store = self.store.clone();
                    let result = tokio::task::spawn_blocking(move || persist(&*store, &snapshot, now))
                        .await
                        .unwrap_or_else(|e| {
                            Err(PersistFailure {
                                timestamp: now,
                                error: StoreError::Unavailable(format!("append task failed: {e}")),
                            })
                        });

                    match result {
                        Ok(entry) => {
                            persisted += 1;
                            debug!(id = %entry.id, persisted, "memory log saved");
                        }
                        Err(failure) => self.diagnostics.report(&failure),
                    }
                }
            }
        }

        info!(persisted, "memory logging stopped");
    }

    pub fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>, StoreError> {
        self.store.query_range(start, end)
    }

    pub fn query_all(&self) -> Result<Vec<LogEntry>, StoreError> {
        self.store.query_all()
    }

    pub fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.store.purge_older_than(cutoff)
    }
}

fn persist(
    store: &dyn LogStore,
    snapshot: &Snapshot,
    now: DateTime<Utc>,
) -> Result<LogEntry, PersistFailure> {
    store
        .append(LogEntry::from_snapshot(snapshot).at(now))
        .map_err(|error| PersistFailure {
            timestamp: now,
            error,
        })
}

fn log_stats(snapshot: &Snapshot) {
    info!(
        alloc = %format_bytes(snapshot.allocated_bytes),
        total_alloc = %format_bytes(snapshot.total_allocated_bytes),
        sys = %format_bytes(snapshot.system_bytes),
        num_gc = snapshot.gc_count,
        gc_cpu_fraction = %format_fraction(snapshot.gc_cpu_fraction),
        live_units = snapshot.live_units,
        "memory stats"
    );
}
