//! Time utilities: bank-local wall clock and epoch timestamps.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Resolve a bank-local date and time to UTC.
///
/// Returns `None` for wall-clock times skipped by a DST transition; ambiguous
/// times (the repeated autumn hour) resolve to the earlier instant.
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse epoch seconds written as a float, e.g. `1.727111551661E9`.
///
/// Precision is kept to the millisecond.
pub fn parse_epoch_seconds(s: &str) -> Option<DateTime<Utc>> {
    let secs: f64 = s.trim().parse().ok()?;
    if !secs.is_finite() {
        return None;
    }
    let millis = (secs * 1000.0).round();
    if millis < i64::MIN as f64 || millis > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}
