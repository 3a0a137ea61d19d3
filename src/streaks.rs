//! Consecutive-day streak logic
//!
//! Streaks compare calendar days in UTC, never wall-clock durations: an
//! award at 23:59 followed by one at 00:01 still extends the streak.
//! Callers must evaluate the streak against the *previous* activity
//! timestamp before stamping the new one.

use chrono::{DateTime, NaiveDate, Utc};

/// Calendar day (UTC) of a Unix-ms timestamp. None for unset (<= 0) or
/// out-of-range stamps.
pub fn day_of_timestamp(ms: i64) -> Option<NaiveDate> {
    if ms <= 0 {
        return None;
    }
    DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

/// Next streak value for an award happening at `now`, given the streak
/// counter and activity stamp as they were before this award.
///
/// - same day: unchanged (a day only counts once)
/// - exactly one day later: extended
/// - anything else (gap, no prior activity): restarts at 1
pub fn next_streak(current: u32, last_activity_at: i64, now: DateTime<Utc>) -> u32 {
    let today = now.date_naive();
    let Some(last_day) = day_of_timestamp(last_activity_at) else {
        return 1;
    };

    match (today - last_day).num_days() {
        0 => {
            // A profile stamped at creation has never actually been counted;
            // its first award starts the streak.
            if current == 0 { 1 } else { current }
        }
        1 => current + 1,
        _ => 1,
    }
}
