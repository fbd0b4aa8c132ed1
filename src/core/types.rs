// Identifier and timestamp aliases used across the store and services

/// User identity, generated by the snowflake id generator.
pub type UserId = i64;

pub type PostId = i64;

pub type CommentId = i64;

pub type NotificationId = i64;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Current time in milliseconds since Unix epoch
pub fn current_time_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// Render a millisecond timestamp as RFC 3339 for API responses.
pub fn to_rfc3339(timestamp: Timestamp) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(timestamp)
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc3339_rendering() {
        assert_eq!(to_rfc3339(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(to_rfc3339(1_500), "1970-01-01T00:00:01.500Z");
    }
}
