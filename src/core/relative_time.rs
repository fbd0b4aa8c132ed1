// Human relative time - "3 minutes ago" style rendering of stored timestamps

use super::types::Timestamp;

const SECOND: i64 = 1_000;
const MINUTE: i64 = 60 * SECOND;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

const UNITS: [(i64, &str); 7] = [
    (YEAR, "year"),
    (MONTH, "month"),
    (WEEK, "week"),
    (DAY, "day"),
    (HOUR, "hour"),
    (MINUTE, "minute"),
    (SECOND, "second"),
];

/// Describe `then` relative to `now`, e.g. `"2 hours ago"` or `"1 day from now"`.
///
/// Only the largest whole unit is reported; anything under a second is "just now".
pub fn human_since(then: Timestamp, now: Timestamp) -> String {
    let delta = now - then;
    let magnitude = delta.abs();

    let Some((size, unit)) = UNITS.iter().find(|(size, _)| magnitude >= *size) else {
        return "just now".to_string();
    };

    let count = magnitude / size;
    let plural = if count == 1 { "" } else { "s" };
    let direction = if delta >= 0 { "ago" } else { "from now" };
    format!("{} {}{} {}", count, unit, plural, direction)
}
