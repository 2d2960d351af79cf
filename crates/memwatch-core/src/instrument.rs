//! Per-request memory and live-unit deltas.
//!
//! Two independent hooks wrap one unit of work:
//!
//! - [`measure`] / [`measure_async`] take a monitor snapshot before and after
//!   the work and time it, producing a [`RequestDelta`].
//! - [`measure_live_units`] / [`measure_live_units_async`] only count live
//!   execution units before and after, producing a [`LiveUnitsDelta`].
//!
//! Both return the wrapped output untouched next to the delta. They add no
//! failure path of their own. Deltas render into response header pairs; the
//! hooks never look at the body.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::collector::StatsSource;
use crate::fmt::{format_bytes, format_duration, format_signed};
use crate::model::Snapshot;
use crate::monitor::Monitor;

pub const HEADER_MEMORY_BEFORE: &str = "x-memory-before";
pub const HEADER_MEMORY_AFTER: &str = "x-memory-after";
pub const HEADER_MEMORY_DIFF: &str = "x-memory-diff";
pub const HEADER_REQUEST_DURATION: &str = "x-request-duration";
pub const HEADER_LIVE_UNITS: &str = "x-live-units";
pub const HEADER_LIVE_UNITS_BEFORE: &str = "x-live-units-before";
pub const HEADER_LIVE_UNITS_AFTER: &str = "x-live-units-after";
pub const HEADER_LIVE_UNITS_DIFF: &str = "x-live-units-diff";

/// Memory and timing observed around one unit of work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestDelta {
    pub before: Snapshot,
    pub after: Snapshot,
    pub duration: Duration,
}

impl RequestDelta {
    /// `after.allocated_bytes - before.allocated_bytes`, saturated to `i64`.
    pub fn allocated_diff(&self) -> i64 {
        let diff = self.after.allocated_bytes as i128 - self.before.allocated_bytes as i128;
        diff.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn headers(&self) -> [(&'static str, String); 5] {
        [
            (HEADER_MEMORY_BEFORE, format_bytes(self.before.allocated_bytes)),
            (HEADER_MEMORY_AFTER, format_bytes(self.after.allocated_bytes)),
            (HEADER_MEMORY_DIFF, format_signed(self.allocated_diff())),
            (HEADER_REQUEST_DURATION, format_duration(self.duration)),
            (HEADER_LIVE_UNITS, self.after.live_units.to_string()),
        ]
    }
}

/// Live execution units counted around one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveUnitsDelta {
    pub before: i64,
    pub after: i64,
}

impl LiveUnitsDelta {
    pub fn diff(&self) -> i64 {
        self.after.saturating_sub(self.before)
    }

    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            (HEADER_LIVE_UNITS_BEFORE, self.before.to_string()),
            (HEADER_LIVE_UNITS_AFTER, self.after.to_string()),
            (HEADER_LIVE_UNITS_DIFF, self.diff().to_string()),
        ]
    }
}

pub fn measure<T>(monitor: &Monitor, work: impl FnOnce() -> T) -> (T, RequestDelta) {
    let before = monitor.snapshot();
    let start = Instant::now();
    let output = work();
    let duration = start.elapsed();
    let after = monitor.snapshot();
    (
        output,
        RequestDelta {
            before,
            after,
            duration,
        },
    )
}

pub async fn measure_async<F: Future>(monitor: &Monitor, work: F) -> (F::Output, RequestDelta) {
    let before = monitor.snapshot();
    let start = Instant::now();
    let output = work.await;
    let duration = start.elapsed();
    let after = monitor.snapshot();
    (
        output,
        RequestDelta {
            before,
            after,
            duration,
        },
    )
}

pub fn measure_live_units<S, T>(source: &S, work: impl FnOnce() -> T) -> (T, LiveUnitsDelta)
where
    S: StatsSource + ?Sized,
{
    let before = source.live_units();
    let output = work();
    let after = source.live_units();
    (output, LiveUnitsDelta { before, after })
}

pub async fn measure_live_units_async<S, F>(source: &S, work: F) -> (F::Output, LiveUnitsDelta)
where
    S: StatsSource + ?Sized,
    F: Future,
{
    let before = source.live_units();
    let output = work.await;
    let after = source.live_units();
    (output, LiveUnitsDelta { before, after })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedSource;
    use std::sync::Arc;

    fn snap(allocated: u64, live_units: i64) -> Snapshot {
        Snapshot {
            allocated_bytes: allocated,
            system_bytes: allocated * 4,
            live_units,
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_measure_passes_output_through() {
        let monitor = Monitor::new(Arc::new(ScriptedSource::new(vec![snap(2048, 3), snap(1024, 4)])), 0.0);

        let (out, delta) = measure(&monitor, || Err::<(), _>("boom"));
        assert_eq!(out, Err("boom"));
        assert_eq!(delta.before.allocated_bytes, 2048);
        assert_eq!(delta.after.allocated_bytes, 1024);
        assert_eq!(delta.allocated_diff(), -1024);
    }

    #[test]
    fn test_request_headers() {
        let delta = RequestDelta {
            before: snap(1024, 2),
            after: snap(3072, 5),
            duration: Duration::from_millis(12),
        };
        let headers = delta.headers();
        assert_eq!(headers[0], (HEADER_MEMORY_BEFORE, "1.0 KB".to_string()));
        assert_eq!(headers[1], (HEADER_MEMORY_AFTER, "3.0 KB".to_string()));
        assert_eq!(headers[2], (HEADER_MEMORY_DIFF, "+2048".to_string()));
        assert_eq!(headers[3], (HEADER_REQUEST_DURATION, "12ms".to_string()));
        assert_eq!(headers[4], (HEADER_LIVE_UNITS, "5".to_string()));
    }

    #[test]
    fn test_diff_is_signed_and_saturating() {
        let zero = RequestDelta {
            before: snap(5, 0),
            after: snap(5, 0),
            duration: Duration::ZERO,
        };
        assert_eq!(zero.headers()[2].1, "+0");

        let huge = RequestDelta {
            before: snap(0, 0),
            after: Snapshot {
                allocated_bytes: u64::MAX,
                ..Snapshot::default()
            },
            duration: Duration::ZERO,
        };
        assert_eq!(huge.allocated_diff(), i64::MAX);
    }

    #[test]
    fn test_measure_feeds_monitor_peak() {
        let monitor = Monitor::new(Arc::new(ScriptedSource::allocations(&[10, 500])), 0.0);
        let _ = measure(&monitor, || ());
        assert_eq!(monitor.peak_allocated(), 500);
    }

    #[tokio::test]
    async fn test_measure_async_times_the_future() {
        let monitor = Monitor::new(Arc::new(ScriptedSource::allocations(&[1, 2])), 0.0);
        let (out, delta) = measure_async(&monitor, async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            7
        })
        .await;
        assert_eq!(out, 7);
        assert!(delta.duration >= Duration::from_millis(5));
        assert_eq!(delta.allocated_diff(), 1);
    }

    #[tokio::test]
    async fn test_live_unit_hook() {
        let source = ScriptedSource::increasing(1);
        source.set_live_units(4);
        let (out, delta) = measure_live_units_async(&source, async {
            source.set_live_units(6);
            "ok"
        })
        .await;
        assert_eq!(out, "ok");
        assert_eq!(delta, LiveUnitsDelta { before: 4, after: 6 });
        assert_eq!(
            delta.headers(),
            [
                (HEADER_LIVE_UNITS_BEFORE, "4".to_string()),
                (HEADER_LIVE_UNITS_AFTER, "6".to_string()),
                (HEADER_LIVE_UNITS_DIFF, "2".to_string()),
            ]
        );
        // Only live units are read, never a full sample.
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn test_hooks_compose() {
        let source = Arc::new(ScriptedSource::increasing(100));
        let monitor = Monitor::new(source.clone(), 0.0);
        let ((out, inner), outer) =
            measure_live_units(&*source, || measure(&monitor, || 1 + 1));
        assert_eq!(out, 2);
        assert_eq!(inner.allocated_diff(), 100);
        assert_eq!(outer.diff(), 0);
    }
}
