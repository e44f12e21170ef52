//! Human-facing formatting helpers.

use std::sync::OnceLock;

use regex::Regex;

const UNITS: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Format a byte count with binary prefixes, one decimal place.
///
/// Values below 1 KiB are rendered as plain bytes (`"512 B"`).
#[must_use]
pub fn human_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Extract the trailing extension run of a file name.
///
/// Matches one or more trailing dot-segments of 3 to 4 alphanumeric
/// characters, so `archive.tar.bz2` yields `.tar.bz2` while `a.b` and
/// `readme` yield nothing. Used only for the filtered-extension hint
/// report, never for filtering decisions.
#[must_use]
pub fn extension(file_name: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(\.[0-9A-Za-z]{3,4})+$").unwrap_or_else(|e| panic!("{}", e))
    });

    pattern.find(file_name).map(|m| m.as_str().to_string())
}
