//! Time helpers. Storage uses Unix milliseconds, DTOs use `DateTime<Utc>`.

use chrono::{DateTime, TimeZone, Utc};

/// Current time in Unix milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert stored milliseconds to UTC. Out-of-range values clamp to the epoch.
pub fn from_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

pub fn to_ms(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}
