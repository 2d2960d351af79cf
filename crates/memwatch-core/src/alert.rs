//! Alert sinks invoked when allocated bytes cross the configured threshold.

use tracing::warn;

use crate::fmt::format_bytes;
use crate::model::Snapshot;

/// Receiver of threshold-crossing snapshots.
///
/// Invoked synchronously by [`Monitor::snapshot`](crate::Monitor::snapshot),
/// at most once per call, outside the monitor's lock. Implementations must be
/// fast and must not panic: the monitor neither retries, queues nor isolates
/// sink calls, so sink latency is paid by every caller that crossed.
pub trait AlertSink: Send + Sync {
    fn alert(&self, snapshot: &Snapshot);
}

impl<F> AlertSink for F
where
    F: Fn(&Snapshot) + Send + Sync,
{
    fn alert(&self, snapshot: &Snapshot) {
        self(snapshot)
    }
}

/// Discards every alert.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAlertSink;

impl AlertSink for NoopAlertSink {
    fn alert(&self, _snapshot: &Snapshot) {}
}

/// Emits a warning with rendered allocated and system bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn alert(&self, snapshot: &Snapshot) {
        warn!(
            alloc = %format_bytes(snapshot.allocated_bytes),
            sys = %format_bytes(snapshot.system_bytes),
            "high memory usage detected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn closures_are_sinks() {
        let seen = AtomicU64::new(0);
        let sink = |s: &Snapshot| {
            seen.store(s.allocated_bytes, Ordering::SeqCst);
        };
        sink.alert(&Snapshot {
            allocated_bytes: 7,
            ..Snapshot::default()
        });
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn stock_sinks_accept_snapshots() {
        let snap = Snapshot::default();
        NoopAlertSink.alert(&snap);
        LogAlertSink.alert(&snap);
    }
}
