//! Append-only on-disk log store.
//!
//! Layout: a single `memory_log.wal` file in the store directory holding
//! consecutive frames
//!
//! ```text
//! ┌──────────────┬──────────────┬─────────────────────────┐
//! │ length: u32  │ crc32: u32   │ postcard(LogEntry)      │
//! │ little-end.  │ of payload   │ `length` bytes          │
//! └──────────────┴──────────────┴─────────────────────────┘
//! ```
//!
//! A torn or corrupted tail (crash mid-append) is truncated on open, and a
//! failed append rolls the file back to the last complete frame. Purge
//! rewrites the surviving frames into `memory_log.tmp` and atomically renames
//! it over the log.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::{LogEntry, LogStore, StoreError};

pub const LOG_FILE_NAME: &str = "memory_log.wal";
const FRAME_HEADER_SIZE: usize = 8;
const MAX_ENTRY_SIZE: u32 = 1024 * 1024;

struct LogFile {
    file: File,
    /// End of the last complete frame. Bytes past it are never kept.
    valid_len: u64,
}

pub struct FileLogStore {
    path: PathBuf,
    inner: Mutex<LogFile>,
}

impl FileLogStore {
    /// Opens (creating if needed) the log in `dir`, removing a stale purge
    /// file and truncating a corrupted tail.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let path = dir.join(LOG_FILE_NAME);
        // Leftover of an interrupted purge.
        let tmp_path = path.with_extension("tmp");
        match std::fs::remove_file(&tmp_path) {
            Ok(()) => info!(path = %tmp_path.display(), "removed stale purge file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %tmp_path.display(), error = %e, "failed to remove stale purge file"),
        }

        let file = open_append(&path)?;
        let valid_len = recover(&path, &file)?;
        Ok(Self {
            path,
            inner: Mutex::new(LogFile { file, valid_len }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, LogFile> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_entries(&self, _guard: &MutexGuard<'_, LogFile>) -> Result<Vec<LogEntry>, StoreError> {
        let data = match std::fs::read(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(decode_frames(&data).0)
    }
}

/// Truncates garbage after the last valid frame and returns its end offset.
fn recover(path: &Path, file: &File) -> Result<u64, StoreError> {
    let data = std::fs::read(path)?;
    if data.is_empty() {
        return Ok(0);
    }

    let (entries, valid_end) = decode_frames(&data);
    let file_size = data.len() as u64;
    if valid_end < file_size {
        warn!(
            garbage_bytes = file_size - valid_end,
            valid_records = entries.len(),
            "memory log corruption detected, truncating"
        );
        file.set_len(valid_end)?;
        file.sync_all()?;
    }
    Ok(valid_end)
}

impl LogStore for FileLogStore {
    fn append(&self, mut entry: LogEntry) -> Result<LogEntry, StoreError> {
        entry.stamp(Utc::now());
        let frame = encode_frame(&entry)?;

        let mut log = self.lock();
        // A torn frame left by an earlier failed write would hide every
        // later frame from readers.
        let on_disk = log.file.metadata()?.len();
        if on_disk != log.valid_len {
            warn!(
                garbage_bytes = on_disk.saturating_sub(log.valid_len),
                "memory log has a partial frame, truncating before append"
            );
            log.file.set_len(log.valid_len)?;
        }

        let written = log.file.write_all(&frame).and_then(|()| log.file.sync_data());
        if let Err(e) = written {
            if let Err(trunc) = log.file.set_len(log.valid_len) {
                error!(error = %trunc, "failed to roll back partial memory log frame");
            }
            return Err(e.into());
        }
        log.valid_len += frame.len() as u64;
        Ok(entry)
    }

    fn query_all(&self) -> Result<Vec<LogEntry>, StoreError> {
        let guard = self.lock();
        self.read_entries(&guard)
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut log = self.lock();
        let entries = self.read_entries(&log)?;
        let total = entries.len();
        let kept: Vec<&LogEntry> = entries.iter().filter(|e| e.timestamp >= cutoff).collect();
        let removed = (total - kept.len()) as u64;
        if removed == 0 {
            return Ok(0);
        }

        let tmp_path = self.path.with_extension("tmp");
        let mut valid_len = 0u64;
        {
            let mut tmp = File::create(&tmp_path)?;
            for entry in &kept {
                let frame = encode_frame(entry)?;
                tmp.write_all(&frame)?;
                valid_len += frame.len() as u64;
            }
            tmp.sync_all()?;
        }
        // Open the replacement before renaming so a failure leaves the old
        // log and handle in place.
        let file = open_append(&tmp_path)?;
        std::fs::rename(&tmp_path, &self.path)?;
        *log = LogFile { file, valid_len };

        info!(removed, remaining = kept.len(), cutoff = %cutoff, "memory log purged");
        Ok(removed)
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .read(true)
        .open(path)
}

fn encode_frame(entry: &LogEntry) -> Result<Vec<u8>, StoreError> {
    let payload = postcard::to_allocvec(entry)?;
    let length = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_ENTRY_SIZE)
        .ok_or_else(|| StoreError::Codec(format!("entry too large: {} bytes", payload.len())))?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes consecutive frames, stopping at the first invalid one.
/// Returns the entries and the byte offset where valid data ends.
pub fn decode_frames(data: &[u8]) -> (Vec<LogEntry>, u64) {
    let mut entries = Vec::new();
    let mut pos = 0usize;

    while pos + FRAME_HEADER_SIZE <= data.len() {
        let length = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
        let crc = u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]);
        let start = pos + FRAME_HEADER_SIZE;
        let end = start + length as usize;
        if length > MAX_ENTRY_SIZE || end > data.len() {
            break;
        }
        let payload = &data[start..end];
        if crc32fast::hash(payload) != crc {
            break;
        }
        match postcard::from_bytes::<LogEntry>(payload) {
            Ok(entry) => entries.push(entry),
            Err(_) => break,
        }
        pos = end;
    }

    (entries, pos as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Snapshot;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn entry_at(minute: u32, alloc: u64) -> LogEntry {
        LogEntry::from_snapshot(&Snapshot {
            allocated_bytes: alloc,
            system_bytes: alloc * 2,
            gc_cpu_fraction: 0.25,
            live_units: 3,
            ..Snapshot::default()
        })
        .at(Utc.with_ymd_and_hms(2026, 10, 19, 12, minute, 0).unwrap())
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let stored = {
            let store = FileLogStore::open(dir.path()).unwrap();
            let a = store.append(entry_at(1, 100)).unwrap();
            let b = store.append(entry_at(2, 200)).unwrap();
            vec![a, b]
        };

        let store = FileLogStore::open(dir.path()).unwrap();
        assert_eq!(store.query_all().unwrap(), stored);
    }

    #[test]
    fn test_query_range_on_disk() {
        let dir = tempdir().unwrap();
        let store = FileLogStore::open(dir.path()).unwrap();
        for minute in 0..10 {
            store.append(entry_at(minute, minute as u64)).unwrap();
        }
        let start = Utc.with_ymd_and_hms(2026, 10, 19, 12, 3, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 10, 19, 12, 5, 0).unwrap();
        let hits: Vec<u64> = store
            .query_range(start, end)
            .unwrap()
            .iter()
            .map(|e| e.allocated_bytes)
            .collect();
        assert_eq!(hits, vec![3, 4, 5]);
    }

    #[test]
    fn test_corrupted_tail_is_truncated_on_open() {
        let dir = tempdir().unwrap();
        {
            let store = FileLogStore::open(dir.path()).unwrap();
            store.append(entry_at(1, 1)).unwrap();
            store.append(entry_at(2, 2)).unwrap();
        }
        let path = dir.path().join(LOG_FILE_NAME);
        let valid_len = std::fs::metadata(&path).unwrap().len();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[0x10, 0, 0, 0, 0xde, 0xad]).unwrap();
        }

        let store = FileLogStore::open(dir.path()).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), valid_len);
        assert_eq!(store.query_all().unwrap().len(), 2);

        // Appends after recovery land on a clean frame boundary.
        store.append(entry_at(3, 3)).unwrap();
        assert_eq!(store.query_all().unwrap().len(), 3);
    }

    #[test]
    fn test_crc_mismatch_stops_decoding() {
        let mut data = encode_frame(&entry_at(1, 1)).unwrap();
        let second = encode_frame(&entry_at(2, 2)).unwrap();
        let flip = data.len() + FRAME_HEADER_SIZE;
        data.extend_from_slice(&second);
        data[flip] ^= 0xff;

        let (entries, valid_end) = decode_frames(&data);
        assert_eq!(entries.len(), 1);
        assert_eq!(valid_end as usize, flip - FRAME_HEADER_SIZE);
    }

    #[test]
    fn test_purge_rewrites_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = FileLogStore::open(dir.path()).unwrap();
        for minute in 0..6 {
            store.append(entry_at(minute, minute as u64)).unwrap();
        }
        let cutoff = Utc.with_ymd_and_hms(2026, 10, 19, 12, 3, 30).unwrap();

        assert_eq!(store.purge_older_than(cutoff).unwrap(), 4);
        assert_eq!(store.purge_older_than(cutoff).unwrap(), 0);
        assert!(
            store
                .query_range(DateTime::<Utc>::MIN_UTC, cutoff)
                .unwrap()
                .is_empty()
        );

        // Store keeps appending to the rewritten file.
        store.append(entry_at(7, 7)).unwrap();
        let remaining: Vec<u64> = store
            .query_all()
            .unwrap()
            .iter()
            .map(|e| e.allocated_bytes)
            .collect();
        assert_eq!(remaining, vec![4, 5, 7]);
        assert!(!dir.path().join("memory_log.tmp").exists());
    }

    #[test]
    fn test_stale_tmp_is_removed_on_open() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("memory_log.tmp"), b"junk").unwrap();
        let _store = FileLogStore::open(dir.path()).unwrap();
        assert!(!dir.path().join("memory_log.tmp").exists());
    }

    #[test]
    fn test_open_keeps_unrelated_tmp_files() {
        let dir = tempdir().unwrap();
        let foreign = dir.path().join("unrelated-upload.tmp");
        std::fs::write(&foreign, b"not ours").unwrap();

        let _store = FileLogStore::open(dir.path()).unwrap();
        assert_eq!(std::fs::read(&foreign).unwrap(), b"not ours");
    }

    #[test]
    fn test_partial_frame_does_not_hide_later_appends() {
        let dir = tempdir().unwrap();
        let store = FileLogStore::open(dir.path()).unwrap();
        store.append(entry_at(1, 1)).unwrap();

        // A write that died halfway through a frame.
        let path = dir.path().join(LOG_FILE_NAME);
        OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(&[0x40, 0, 0, 0, 0xbe, 0xef])
            .unwrap();

        store.append(entry_at(2, 2)).unwrap();
        let visible: Vec<u64> = store
            .query_all()
            .unwrap()
            .iter()
            .map(|e| e.allocated_bytes)
            .collect();
        assert_eq!(visible, vec![1, 2]);

        drop(store);
        let reopened = FileLogStore::open(dir.path()).unwrap();
        assert_eq!(reopened.query_all().unwrap().len(), 2);
    }

    #[test]
    fn test_appends_after_purge_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileLogStore::open(dir.path()).unwrap();
            for minute in 0..4 {
                store.append(entry_at(minute, minute as u64)).unwrap();
            }
            let cutoff = Utc.with_ymd_and_hms(2026, 10, 19, 12, 2, 0).unwrap();
            assert_eq!(store.purge_older_than(cutoff).unwrap(), 2);
            store.append(entry_at(9, 9)).unwrap();
        }

        let store = FileLogStore::open(dir.path()).unwrap();
        let remaining: Vec<u64> = store
            .query_all()
            .unwrap()
            .iter()
            .map(|e| e.allocated_bytes)
            .collect();
        assert_eq!(remaining, vec![2, 3, 9]);
    }
}
