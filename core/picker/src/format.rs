//! Text shown under each entry.

use chrono::{DateTime, Utc};

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// `size / unit` rounded to one decimal.
fn round_tenth(size: u64, unit: u64) -> f64 {
    (size as f64 / unit as f64 * 10.0).round() / 10.0
}

/// Human-readable size: `1GB`, `1.5MB`, `0.5KB`.
///
/// Whole numbers print without a trailing `.0`. Absent or zero sizes
/// produce an empty string.
pub fn format_size(size: Option<u64>) -> String {
    match size {
        None | Some(0) => String::new(),
        Some(size) if size >= GB => format!("{}GB", round_tenth(size, GB)),
        Some(size) if size >= MB => format!("{}MB", round_tenth(size, MB)),
        Some(size) => format!("{}KB", round_tenth(size, KB)),
    }
}

/// Modification date as `dd/mm/yy`, empty when unknown.
pub fn format_modified(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%d/%m/%y").to_string())
        .unwrap_or_default()
}
