use chrono::{DateTime, Utc};

/// Current UTC time truncated to milliseconds (matches the wire precision)
pub fn now_utc() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
