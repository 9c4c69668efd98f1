//! Pull numeric metrics out of free-form diagnostic text.
//!
//! Pure functions: malformed or unexpected input yields `None`, never an
//! error. Whether a snapshot with missing metrics is worth keeping is the
//! caller's call.

use regex::Regex;
use std::sync::LazyLock;

static BATTERY_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\blevel:\s*(\d+)\b").expect("battery pattern must compile")
});

static MEMORY_TOTAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Total\s+RAM|MemTotal)\s*:\s*([\d,]+)\s*k").expect("total pattern must compile")
});

/// Free-memory labels in order of preference.
static MEMORY_FREE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)Free\s+RAM\s*:\s*([\d,]+)\s*k",
        r"(?i)MemAvailable\s*:\s*([\d,]+)\s*k",
        r"(?i)MemFree\s*:\s*([\d,]+)\s*k",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("free pattern must compile"))
    .collect()
});

/// Battery charge in percent from `dumpsys battery` output.
///
/// Looks for a `level: <digits>` field. Values outside 0..=100 are rejected.
pub fn parse_battery(text: &str) -> Option<u8> {
    let caps = BATTERY_LEVEL.captures(text)?;
    let level: u32 = caps.get(1)?.as_str().parse().ok()?;
    u8::try_from(level).ok().filter(|l| *l <= 100)
}

/// Used memory in whole megabytes from a meminfo report.
///
/// Needs both a total and a free (or available) figure in kilobytes; digits
/// may carry thousands separators. Megabytes here are decimal
/// (1 MB = 1000 kB), rounded to the nearest whole number.
pub fn parse_memory(text: &str) -> Option<u64> {
    let total = capture_kb(&MEMORY_TOTAL, text)?;
    let free = MEMORY_FREE.iter().find_map(|re| capture_kb(re, text))?;
    let used = total.checked_sub(free)?;
    Some((used + 500) / 1000)
}

fn capture_kb(re: &Regex, text: &str) -> Option<u64> {
    let raw = re.captures(text)?.get(1)?.as_str();
    let digits: String = raw.chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}
