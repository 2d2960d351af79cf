//! Shared memory monitor: peak tracking, threshold alerting and the
//! periodic sampling loop.
//!
//! One `Monitor` is built at startup and shared through `Arc` by the request
//! instrumentation, the sampling loop and the snapshot logger.
//!
//! # Locking
//!
//! The peak and the sink reference live behind one `RwLock`. `snapshot()`
//! samples the source outside the lock, then takes the write lock once to
//! raise the peak and clone the sink. The sink runs after the lock is
//! released, so a slow sink delays only the caller that crossed the
//! threshold. Consequently another caller may raise the peak between this
//! caller's update and its sink call; the sink always receives the snapshot
//! that crossed, never the peak.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::alert::AlertSink;
use crate::collector::StatsSource;
use crate::model::Snapshot;

struct MonitorState {
    max_allocated_bytes: u64,
    alert_sink: Option<Arc<dyn AlertSink>>,
}

pub struct Monitor {
    source: Arc<dyn StatsSource>,
    alert_threshold: f64,
    state: RwLock<MonitorState>,
}

impl Monitor {
    /// Creates a monitor alerting above `alert_threshold` of system bytes.
    /// A threshold `<= 0` disables alerting.
    pub fn new(source: Arc<dyn StatsSource>, alert_threshold: f64) -> Self {
        Self {
            source,
            alert_threshold,
            state: RwLock::new(MonitorState {
                max_allocated_bytes: 0,
                alert_sink: None,
            }),
        }
    }

    pub fn alert_threshold(&self) -> f64 {
        self.alert_threshold
    }

    pub fn source(&self) -> &Arc<dyn StatsSource> {
        &self.source
    }

    /// Samples the source, raises the peak and alerts when the sample crosses
    /// the threshold. Always returns the sample.
    pub fn snapshot(&self) -> Snapshot {
        let snapshot = self.source.sample();

        let sink = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if snapshot.allocated_bytes > state.max_allocated_bytes {
                state.max_allocated_bytes = snapshot.allocated_bytes;
            }
            if snapshot.crosses(self.alert_threshold) {
                state.alert_sink.clone()
            } else {
                None
            }
        };

        if let Some(sink) = sink {
            sink.alert(&snapshot);
        }
        snapshot
    }

    /// Highest `allocated_bytes` returned by any `snapshot()` so far.
    pub fn peak_allocated(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .max_allocated_bytes
    }

    /// Replaces the alert sink. Last writer wins.
    pub fn set_alert_sink(&self, sink: Arc<dyn AlertSink>) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .alert_sink = Some(sink);
    }

    /// Removes the alert sink.
    pub fn clear_alert_sink(&self) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .alert_sink = None;
    }

    /// Live execution units, without a full sample or touching the lock.
    pub fn live_units(&self) -> i64 {
        self.source.live_units()
    }

    /// Samples every `interval` until `cancel` fires.
    ///
    /// The first sample is taken one interval after the call. Results are
    /// discarded; peak tracking and alerting are the point.
    pub async fn run_periodic(&self, cancel: CancellationToken, interval: Duration) {
        let mut tick = tokio::time::interval_at(Instant::now() + interval, interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            interval_ms = interval.as_millis() as u64,
            threshold = self.alert_threshold,
            "memory monitoring started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    let snap = self.snapshot();
                    debug!(
                        alloc = snap.allocated_bytes,
                        sys = snap.system_bytes,
                        peak = self.peak_allocated(),
                        "monitor tick"
                    );
                }
            }
        }

        info!("memory monitoring stopped");
    }
}
