use chrono::{DateTime, Duration, Utc};

/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns the current UTC wall-clock time.
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Returns a stamp strictly later than `previous`.
///
/// Uses the wall clock when it has moved past `previous`, otherwise bumps
/// `previous` by one microsecond so back-to-back mutations stay ordered.
pub fn monotonic_utc_after(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = utc_now();
    match previous {
        Some(previous) if now <= previous => previous + Duration::microseconds(1),
        _ => now,
    }
}
