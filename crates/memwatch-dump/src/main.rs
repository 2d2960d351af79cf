use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use memwatch_core::fmt::{format_bytes, format_fraction};
use memwatch_core::storage::file::{LOG_FILE_NAME, decode_frames};
use memwatch_core::{LogEntry, LogStore};
use memwatch_core::storage::FileLogStore;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "memwatch-dump", about = "Inspect and prune memwatch memory logs", version = memwatch_core::VERSION)]
struct Cli {
    /// Memory log directory (as passed to memwatch-web --data-dir)
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print stored entries (read-only; a corrupted tail is reported, not repaired)
    List {
        /// Inclusive lower bound (RFC 3339)
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        /// Inclusive upper bound (RFC 3339)
        #[arg(long)]
        end: Option<DateTime<Utc>>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove entries older than a cutoff
    Purge {
        /// RFC 3339 instant, or an age such as 7d, 12h, 30m
        #[arg(long)]
        older_than: String,
    },
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Command::List { start, end, json } => list(&cli.dir, start, end, json),
        Command::Purge { ref older_than } => {
            let cutoff = parse_cutoff(older_than, Utc::now()).unwrap_or_else(|e| {
                eprintln!("Invalid --older-than: {e}");
                std::process::exit(2);
            });
            purge(&cli.dir, cutoff);
        }
    }
}

// ── Cutoff parsing ───────────────────────────────────────────────────────────

/// Parses an RFC 3339 instant or a relative age (`<n>d`, `<n>h`, `<n>m`)
/// counted back from `now`.
fn parse_cutoff(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    let input = input.trim();
    let Some(unit) = input.chars().last() else {
        return Err("empty value".to_string());
    };
    let amount: i64 = input[..input.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| format!("expected RFC 3339 or <n>d/<n>h/<n>m, got {input:?}"))?;
    if amount <= 0 {
        return Err(format!("age must be positive, got {input:?}"));
    }
    let age = match unit {
        'd' => Duration::try_days(amount),
        'h' => Duration::try_hours(amount),
        'm' => Duration::try_minutes(amount),
        _ => return Err(format!("unknown unit {unit:?} (use d, h or m)")),
    }
    .ok_or_else(|| format!("age out of range: {input}"))?;

    now.checked_sub_signed(age)
        .ok_or_else(|| format!("cutoff out of range: {input}"))
}

// ── list ─────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ListJson {
    file: String,
    file_size: u64,
    garbage_bytes: u64,
    total_entries: usize,
    entries: Vec<LogEntry>,
}

struct Listing {
    file_size: u64,
    garbage_bytes: u64,
    total_entries: usize,
    entries: Vec<LogEntry>,
}

fn read_listing(
    path: &Path,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> std::io::Result<Listing> {
    let data = match fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e),
    };
    let (mut entries, valid_end) = decode_frames(&data);
    let total_entries = entries.len();
    let start = start.unwrap_or(DateTime::<Utc>::MIN_UTC);
    let end = end.unwrap_or(DateTime::<Utc>::MAX_UTC);
    entries.retain(|e| e.timestamp >= start && e.timestamp <= end);

    Ok(Listing {
        file_size: data.len() as u64,
        garbage_bytes: data.len() as u64 - valid_end,
        total_entries,
        entries,
    })
}

fn list(dir: &Path, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>, json: bool) {
    let path = dir.join(LOG_FILE_NAME);
    let listing = read_listing(&path, start, end).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", path.display());
        std::process::exit(1);
    });

    if json {
        let out = ListJson {
            file: path.display().to_string(),
            file_size: listing.file_size,
            garbage_bytes: listing.garbage_bytes,
            total_entries: listing.total_entries,
            entries: listing.entries,
        };
        match serde_json::to_string_pretty(&out) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Error encoding JSON: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!(
        "File: {} ({}, {} entries)",
        path.display(),
        format_bytes(listing.file_size),
        listing.total_entries
    );
    if listing.garbage_bytes > 0 {
        println!(
            "Warning: {} of unreadable data after the last valid entry",
            format_bytes(listing.garbage_bytes)
        );
    }
    if listing.entries.is_empty() {
        println!("No entries in range.");
        return;
    }

    println!(
        "{:<20} {:>10} {:>10} {:>10} {:>6} {:>8} {:>6}",
        "TIMESTAMP", "ALLOC", "TOTAL", "SYS", "GC", "GC_CPU", "UNITS"
    );
    for e in &listing.entries {
        println!(
            "{:<20} {:>10} {:>10} {:>10} {:>6} {:>8} {:>6}",
            e.timestamp.format("%Y-%m-%d %H:%M:%S"),
            format_bytes(e.allocated_bytes),
            format_bytes(e.total_allocated_bytes),
            format_bytes(e.system_bytes),
            e.gc_count,
            format_fraction(e.gc_cpu_fraction),
            e.live_units
        );
    }

    let peak = listing
        .entries
        .iter()
        .map(|e| e.allocated_bytes)
        .max()
        .unwrap_or(0);
    println!("\nShown: {}  Peak alloc: {}", listing.entries.len(), format_bytes(peak));
}

// ── purge ────────────────────────────────────────────────────────────────────

fn purge(dir: &Path, cutoff: DateTime<Utc>) {
    if !dir.join(LOG_FILE_NAME).exists() {
        eprintln!("No memory log in {}", dir.display());
        std::process::exit(1);
    }
    let store = FileLogStore::open(dir).unwrap_or_else(|e| {
        eprintln!("Error opening {}: {e}", dir.display());
        std::process::exit(1);
    });
    match store.purge_older_than(cutoff) {
        Ok(removed) => println!("Removed {removed} entries older than {}", cutoff.to_rfc3339()),
        Err(e) => {
            eprintln!("Purge failed: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use memwatch_core::Snapshot;
    use std::io::Write;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_cutoff_rfc3339() {
        let cutoff = parse_cutoff("2026-10-18T10:00:00+02:00", now()).unwrap();
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_cutoff_relative() {
        assert_eq!(
            parse_cutoff("7d", now()).unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 12, 12, 0, 0).unwrap()
        );
        assert_eq!(
            parse_cutoff("12h", now()).unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_cutoff("30m", now()).unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 19, 11, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_cutoff_rejects_garbage() {
        assert!(parse_cutoff("", now()).is_err());
        assert!(parse_cutoff("7w", now()).is_err());
        assert!(parse_cutoff("xd", now()).is_err());
        assert!(parse_cutoff("yesterday", now()).is_err());
    }

    #[test]
    fn test_parse_cutoff_rejects_non_positive_age() {
        assert!(parse_cutoff("-7d", now()).is_err());
        assert!(parse_cutoff("0h", now()).is_err());
        assert!(parse_cutoff("-30m", now()).is_err());
    }

    #[test]
    fn test_listing_filters_and_reports_garbage() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileLogStore::open(dir.path()).unwrap();
            for hour in 1..=3 {
                let ts = Utc.with_ymd_and_hms(2026, 10, 19, hour, 0, 0).unwrap();
                store
                    .append(LogEntry::from_snapshot(&Snapshot::default()).at(ts))
                    .unwrap();
            }
        }
        let path = dir.path().join(LOG_FILE_NAME);
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(&[1, 2, 3])
            .unwrap();

        let start = Utc.with_ymd_and_hms(2026, 10, 19, 2, 0, 0).unwrap();
        let listing = read_listing(&path, Some(start), None).unwrap();
        assert_eq!(listing.total_entries, 3);
        assert_eq!(listing.entries.len(), 2);
        assert_eq!(listing.garbage_bytes, 3);
        // Listing never repairs the file.
        assert_eq!(fs::metadata(&path).unwrap().len(), listing.file_size);
    }

    #[test]
    fn test_listing_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let listing = read_listing(&dir.path().join(LOG_FILE_NAME), None, None).unwrap();
        assert_eq!(listing.total_entries, 0);
        assert_eq!(listing.file_size, 0);
    }
}
