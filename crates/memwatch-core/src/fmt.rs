//! Shared formatting helpers for health reports, headers and log lines.
//!
//! All functions are pure and allocation-light; none depend on the monitor.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Bytes
// ---------------------------------------------------------------------------

const UNIT_PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

/// Format byte count as human-readable size with 1024-based prefixes.
///
/// `"0 B"`, `"1023 B"`, `"1.0 KB"`, `"1.5 KB"`, `"1.0 MB"`, ... `"16.0 EB"`
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", bytes as f64 / div as f64, UNIT_PREFIXES[exp])
}

/// Format a signed value always showing its sign: `"+512"`, `"-3"`, `"+0"`.
pub fn format_signed(value: i64) -> String {
    format!("{:+}", value)
}

/// Format a fraction with four decimals: `"0.0123"`.
pub fn format_fraction(value: f64) -> String {
    format!("{:.4}", value)
}

// ---------------------------------------------------------------------------
// Durations
// ---------------------------------------------------------------------------

/// Format duration as a compact human-readable string.
///
/// Sub-second: `"750ns"`, `"1.5µs"`, `"12.345ms"`.
/// Otherwise: `"2.5s"`, `"1m30s"`, `"1h2m3.25s"`. Zero is `"0s"`.
/// Fractions are exact (nanosecond precision) with trailing zeros removed.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{}ns", nanos);
    }
    if nanos < 1_000_000 {
        return format!("{}µs", decimal(nanos, 1_000, 3));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", decimal(nanos, 1_000_000, 6));
    }

    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs_nanos = (total_secs % 60) as u128 * 1_000_000_000 + d.subsec_nanos() as u128;
    let secs = format!("{}s", decimal(secs_nanos, 1_000_000_000, 9));

    if hours > 0 {
        format!("{}h{}m{}", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m{}", minutes, secs)
    } else {
        secs
    }
}

/// Renders `value / unit` with up to `digits` fractional digits, trailing
/// zeros trimmed.
fn decimal(value: u128, unit: u128, digits: usize) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = digits);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
