//! Timestamp and duration utilities

use chrono::{DateTime, Utc};

/// Milliseconds per second
pub const MS_PER_SECOND: i64 = 1_000;

/// Milliseconds per minute
pub const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert whole minutes to milliseconds
pub fn minutes_to_ms(minutes: i64) -> i64 {
    minutes.saturating_mul(MS_PER_MINUTE)
}

/// Convert whole seconds to milliseconds
pub fn seconds_to_ms(seconds: i64) -> i64 {
    seconds.saturating_mul(MS_PER_SECOND)
}

/// Format a millisecond duration for track listings
///
/// Sub-second remainders are truncated.
/// - Under one hour: `M:SS`
/// - One hour or more: `H:MM:SS`
///
/// # Examples
///
/// ```
/// use grimnir_common::time::format_duration_ms;
///
/// assert_eq!(format_duration_ms(225_000), "3:45");
/// assert_eq!(format_duration_ms(3_600_000), "1:00:00");
/// assert_eq!(format_duration_ms(-2_000), "-0:02");
/// ```
pub fn format_duration_ms(ms: i64) -> String {
    let is_negative = ms < 0;
    let total_seconds = ms.abs() / MS_PER_SECOND;

    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let formatted = if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    };

    if is_negative {
        format!("-{}", formatted)
    } else {
        formatted
    }
}
