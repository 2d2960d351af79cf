//! Health documents returned by `GET /api/v1/health` and
//! `GET /api/v1/health/memory`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::fmt::{format_bytes, format_fraction};
use crate::model::Snapshot;

pub const STATUS_HEALTHY: &str = "healthy";

/// Liveness document.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceHealth {
    /// Always "healthy" while the process serves requests.
    pub status: String,
    pub message: String,
}

impl ServiceHealth {
    pub fn healthy() -> Self {
        Self {
            status: STATUS_HEALTHY.to_string(),
            message: "Service is running".to_string(),
        }
    }
}

/// Memory health document.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthReport {
    pub status: String,
    pub memory: MemoryReport,
    /// UTC time the report was built.
    pub timestamp: DateTime<Utc>,
}

/// Human-readable rendering of one snapshot plus the monitor peak.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemoryReport {
    /// Currently allocated bytes (e.g. "12.3 MB").
    pub alloc: String,
    /// Cumulative allocated bytes.
    #[serde(rename = "totalAlloc")]
    pub total_alloc: String,
    /// Bytes obtained from the operating system.
    pub sys: String,
    /// Completed collection (purge) cycles.
    #[serde(rename = "numGC")]
    pub num_gc: u32,
    /// Fraction of CPU spent collecting, four decimals.
    #[serde(rename = "gcCPUFraction")]
    pub gc_cpu_fraction: String,
    /// Live execution units.
    #[serde(rename = "numGoroutine")]
    pub live_units: i64,
    /// Highest allocated bytes observed by the monitor.
    #[serde(rename = "maxAlloc")]
    pub max_alloc: String,
}

impl HealthReport {
    pub fn from_snapshot(snapshot: &Snapshot, peak_allocated: u64, now: DateTime<Utc>) -> Self {
        Self {
            status: STATUS_HEALTHY.to_string(),
            memory: MemoryReport {
                alloc: format_bytes(snapshot.allocated_bytes),
                total_alloc: format_bytes(snapshot.total_allocated_bytes),
                sys: format_bytes(snapshot.system_bytes),
                num_gc: snapshot.gc_count,
                gc_cpu_fraction: format_fraction(snapshot.gc_cpu_fraction),
                live_units: snapshot.live_units,
                max_alloc: format_bytes(peak_allocated),
            },
            timestamp: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_report_json_shape() {
        let snapshot = Snapshot {
            allocated_bytes: 1536,
            total_allocated_bytes: 3 * 1024 * 1024,
            system_bytes: 512,
            gc_count: 7,
            gc_cpu_fraction: 0.012345,
            live_units: 12,
        };
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        let json = serde_json::to_value(HealthReport::from_snapshot(&snapshot, 4096, now)).unwrap();

        assert_eq!(json["status"], "healthy");
        assert_eq!(json["timestamp"], "2026-10-19T08:30:00Z");
        let memory = &json["memory"];
        assert_eq!(memory["alloc"], "1.5 KB");
        assert_eq!(memory["totalAlloc"], "3.0 MB");
        assert_eq!(memory["sys"], "512 B");
        assert_eq!(memory["numGC"], 7);
        assert_eq!(memory["gcCPUFraction"], "0.0123");
        assert_eq!(memory["numGoroutine"], 12);
        assert_eq!(memory["maxAlloc"], "4.0 KB");
    }

    #[test]
    fn test_service_health() {
        let json = serde_json::to_value(ServiceHealth::healthy()).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["message"], "Service is running");
    }
}
