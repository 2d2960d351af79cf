use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use super::{LogEntry, LogStore, StoreError};

/// Process-local log store. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    entries: Mutex<Vec<LogEntry>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogStore for InMemoryLogStore {
    fn append(&self, mut entry: LogEntry) -> Result<LogEntry, StoreError> {
        entry.stamp(Utc::now());
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        Ok(entry)
    }

    fn query_all(&self) -> Result<Vec<LogEntry>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|e| e.timestamp >= cutoff);
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Snapshot;
    use chrono::TimeZone;

    fn entry_at(hour: u32, alloc: u64) -> LogEntry {
        LogEntry::from_snapshot(&Snapshot {
            allocated_bytes: alloc,
            ..Snapshot::default()
        })
        .at(Utc.with_ymd_and_hms(2026, 10, 19, hour, 0, 0).unwrap())
    }

    #[test]
    fn test_append_stamps_and_keeps_order() {
        let store = InMemoryLogStore::new();
        let stored = store.append(entry_at(1, 10)).unwrap();
        store.append(entry_at(2, 20)).unwrap();

        assert!(!stored.id.is_empty());
        let all = store.query_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], stored);
        assert_eq!(all[1].allocated_bytes, 20);
    }

    #[test]
    fn test_append_assigns_now_when_unset() {
        let store = InMemoryLogStore::new();
        let before = Utc::now();
        let stored = store
            .append(LogEntry::from_snapshot(&Snapshot::default()))
            .unwrap();
        assert!(stored.timestamp >= before);
        assert!(stored.timestamp <= Utc::now());
    }

    #[test]
    fn test_query_range_is_inclusive() {
        let store = InMemoryLogStore::new();
        for hour in 1..=5 {
            store.append(entry_at(hour, hour as u64)).unwrap();
        }
        let start = Utc.with_ymd_and_hms(2026, 10, 19, 2, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 10, 19, 4, 0, 0).unwrap();
        let hits: Vec<u64> = store
            .query_range(start, end)
            .unwrap()
            .iter()
            .map(|e| e.allocated_bytes)
            .collect();
        assert_eq!(hits, vec![2, 3, 4]);
    }

    #[test]
    fn test_purge_is_exclusive_and_idempotent() {
        let store = InMemoryLogStore::new();
        for hour in 1..=5 {
            store.append(entry_at(hour, hour as u64)).unwrap();
        }
        let cutoff = Utc.with_ymd_and_hms(2026, 10, 19, 3, 30, 0).unwrap();
        assert_eq!(store.purge_older_than(cutoff).unwrap(), 3);
        assert_eq!(store.purge_older_than(cutoff).unwrap(), 0);
        assert!(
            store
                .query_range(DateTime::<Utc>::MIN_UTC, cutoff)
                .unwrap()
                .is_empty()
        );
        assert_eq!(store.len(), 2);
    }
}
