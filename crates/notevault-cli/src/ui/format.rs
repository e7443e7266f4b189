//! Formatting helpers for table cells and receipts.

use chrono::{Local, TimeZone};

/// Truncate to `max` characters, ending with "..." when shortened.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 3 {
        return ".".repeat(max);
    }
    let kept: String = text.chars().take(max - 3).collect();
    format!("{}...", kept)
}

/// Collapse line breaks and runs of whitespace into single spaces.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Human-readable byte count using binary units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Local time for epoch milliseconds.
pub fn format_millis(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => millis.to_string(),
    }
}
