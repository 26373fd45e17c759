//! Time helpers

use chrono::{DateTime, Utc};

/// Epoch seconds at 00:00:00 UTC on the day of `now`
///
/// Deletion schedules are anchored to the day boundary rather than the
/// wall-clock instant, so every record created on the same calendar day
/// shares the same day-granularity precision.
#[must_use]
pub fn start_of_day_utc(now: DateTime<Utc>) -> i64 {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
        .and_utc();
    midnight.timestamp()
}
