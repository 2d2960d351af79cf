//! Test doubles shared by this crate and its dependents.
//!
//! `ScriptedSource` replays snapshots instead of reading the allocator, so
//! monitor behavior can be asserted on exact values. The recording and
//! failing types capture what the monitor and logger hand to their
//! collaborators.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::alert::AlertSink;
use crate::collector::StatsSource;
use crate::logger::{PersistDiagnostics, PersistFailure};
use crate::model::Snapshot;
use crate::storage::{LogEntry, LogStore, StoreError};

enum Script {
    /// Replays the samples in order, wrapping around.
    Cycle(Vec<Snapshot>),
    /// The n-th call (1-based) reports `n * step` allocated bytes.
    Increasing { step: u64 },
}

/// A [`StatsSource`] returning scripted readings.
pub struct ScriptedSource {
    script: Script,
    calls: AtomicUsize,
    live_units: AtomicI64,
}

impl ScriptedSource {
    /// Cycles through `samples`. Panics on an empty script.
    pub fn new(samples: Vec<Snapshot>) -> Self {
        assert!(!samples.is_empty(), "scripted source needs at least one sample");
        Self::with_script(Script::Cycle(samples))
    }

    /// Cycles through readings with the given allocated bytes and twice as
    /// many system bytes.
    pub fn allocations(allocated: &[u64]) -> Self {
        Self::new(
            allocated
                .iter()
                .map(|&a| Snapshot {
                    allocated_bytes: a,
                    total_allocated_bytes: a,
                    system_bytes: a.saturating_mul(2),
                    ..Snapshot::default()
                })
                .collect(),
        )
    }

    /// Each call reports `step` more allocated bytes than the previous one,
    /// so concurrent callers each observe a distinct value.
    pub fn increasing(step: u64) -> Self {
        Self::with_script(Script::Increasing { step })
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            live_units: AtomicI64::new(1),
        }
    }

    /// Number of `sample()` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sets the value returned by `live_units()`.
    pub fn set_live_units(&self, n: i64) {
        self.live_units.store(n, Ordering::SeqCst);
    }
}

impl StatsSource for ScriptedSource {
    fn sample(&self) -> Snapshot {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Cycle(samples) => samples[n % samples.len()],
            Script::Increasing { step } => {
                let allocated = step.saturating_mul(n as u64 + 1);
                Snapshot {
                    allocated_bytes: allocated,
                    total_allocated_bytes: allocated,
                    system_bytes: allocated.saturating_mul(2),
                    live_units: self.live_units.load(Ordering::SeqCst),
                    ..Snapshot::default()
                }
            }
        }
    }

    fn live_units(&self) -> i64 {
        self.live_units.load(Ordering::SeqCst)
    }
}

/// Records every alerted snapshot.
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<Snapshot>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Snapshot> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.alerts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl AlertSink for RecordingAlertSink {
    fn alert(&self, snapshot: &Snapshot) {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*snapshot);
    }
}

/// Records every reported persistence failure.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    failures: Mutex<Vec<PersistFailure>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<PersistFailure> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PersistDiagnostics for RecordingDiagnostics {
    fn report(&self, failure: &PersistFailure) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure.clone());
    }
}

/// A store whose every operation fails with the same I/O error.
#[derive(Debug, Clone)]
pub struct FailingLogStore {
    message: String,
}

impl FailingLogStore {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn error(&self) -> StoreError {
        StoreError::Io(self.message.clone())
    }
}

impl LogStore for FailingLogStore {
    fn append(&self, _entry: LogEntry) -> Result<LogEntry, StoreError> {
        Err(self.error())
    }

    fn query_all(&self) -> Result<Vec<LogEntry>, StoreError> {
        Err(self.error())
    }

    fn purge_older_than(&self, _cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        Err(self.error())
    }
}
