use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Snapshot;

/// A persisted snapshot.
///
/// JSON field names follow the log store schema
/// (`alloc`, `totalAlloc`, `sys`, `numGC`, `gcCPUFraction`, `numGoroutine`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct LogEntry {
    /// Opaque identifier; empty until stored.
    pub id: String,
    /// Unix epoch until stored.
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "alloc")]
    pub allocated_bytes: u64,
    #[serde(rename = "totalAlloc")]
    pub total_allocated_bytes: u64,
    #[serde(rename = "sys")]
    pub system_bytes: u64,
    #[serde(rename = "numGC")]
    pub gc_count: u32,
    #[serde(rename = "gcCPUFraction")]
    pub gc_cpu_fraction: f64,
    #[serde(rename = "numGoroutine")]
    pub live_units: i64,
}

impl LogEntry {
    /// Unstamped entry carrying the snapshot's fields.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            id: String::new(),
            timestamp: DateTime::<Utc>::default(),
            allocated_bytes: snapshot.allocated_bytes,
            total_allocated_bytes: snapshot.total_allocated_bytes,
            system_bytes: snapshot.system_bytes,
            gc_count: snapshot.gc_count,
            gc_cpu_fraction: snapshot.gc_cpu_fraction,
            live_units: snapshot.live_units,
        }
    }

    /// Same entry with an explicit timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            allocated_bytes: self.allocated_bytes,
            total_allocated_bytes: self.total_allocated_bytes,
            system_bytes: self.system_bytes,
            gc_count: self.gc_count,
            gc_cpu_fraction: self.gc_cpu_fraction,
            live_units: self.live_units,
        }
    }

    /// Assigns a fresh id when empty and `now` when the timestamp is unset.
    /// Already assigned values are kept.
    pub fn stamp(&mut self, now: DateTime<Utc>) {
        if self.id.is_empty() {
            self.id = uuid::Uuid::new_v4().simple().to_string();
        }
        if self.timestamp == DateTime::<Utc>::default() {
            self.timestamp = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot() -> Snapshot {
        Snapshot {
            allocated_bytes: 1,
            total_allocated_bytes: 2,
            system_bytes: 3,
            gc_count: 4,
            gc_cpu_fraction: 0.5,
            live_units: 6,
        }
    }

    #[test]
    fn test_stamp_assigns_missing_fields() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let mut entry = LogEntry::from_snapshot(&snapshot());
        entry.stamp(now);
        assert_eq!(entry.id.len(), 32);
        assert_eq!(entry.timestamp, now);
        assert_eq!(entry.snapshot(), snapshot());
    }

    #[test]
    fn test_stamp_keeps_assigned_fields() {
        let then = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut entry = LogEntry::from_snapshot(&snapshot()).at(then);
        entry.id = "fixed".to_string();
        entry.stamp(then + chrono::Duration::hours(1));
        assert_eq!(entry.id, "fixed");
        assert_eq!(entry.timestamp, then);
    }

    #[test]
    fn test_json_shape() {
        let then = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut entry = LogEntry::from_snapshot(&snapshot()).at(then);
        entry.id = "abc".to_string();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["timestamp"], "2026-01-01T00:00:00Z");
        assert_eq!(json["alloc"], 1);
        assert_eq!(json["totalAlloc"], 2);
        assert_eq!(json["sys"], 3);
        assert_eq!(json["numGC"], 4);
        assert_eq!(json["gcCPUFraction"], 0.5);
        assert_eq!(json["numGoroutine"], 6);
    }
}
