//! Duration-string parsing for the `set_next_sleep` tool.

use std::sync::OnceLock;

use chrono::Duration;
use regex::Regex;

fn component_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").unwrap())
}

/// Parses a Go-style duration string (`"5m"`, `"2m30s"`, `"1h"`) or a bare
/// numeric value interpreted as minutes (`"30"`, `"2.5"`).
pub fn parse_duration(input: &str) -> Option<Duration> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(minutes) = trimmed.parse::<f64>() {
        return Some(Duration::milliseconds((minutes * 60_000.0) as i64));
    }

    let caps = component_pattern().captures(trimmed)?;
    let hours: i64 = caps.get(1).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
    let minutes: i64 = caps.get(2).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
    let seconds: i64 = caps.get(3).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);

    if hours == 0 && minutes == 0 && seconds == 0 {
        return None;
    }

    Some(Duration::hours(hours) + Duration::minutes(minutes) + Duration::seconds(seconds))
}
