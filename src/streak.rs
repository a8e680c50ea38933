//! Streak calculator: length of the current consecutive-day run.
//!
//! Pure calendar arithmetic; the caller supplies the distinct activity days
//! (sorted descending, already deduplicated by the day-grouping query) and
//! the reference "today". The one-day grace rule: a streak is alive if its
//! most recent day is today *or yesterday*, so a user who logged activity
//! yesterday but not yet today has not lost their run. This is a wall-clock
//! date check in the configured reference zone, not a rolling 24h window.

use chrono::{Duration, NaiveDate};

/// Length of the current streak ending today or yesterday.
///
/// `days_desc` must be distinct calendar days sorted descending. Returns 0
/// for an empty set or a run whose most recent day is older than yesterday;
/// a stale run further in the past does not count.
pub fn streak_length(days_desc: &[NaiveDate], today: NaiveDate) -> u32 {
    let Some(&most_recent) = days_desc.first() else {
        return 0;
    };

    let yesterday = today - Duration::days(1);
    if most_recent != today && most_recent != yesterday {
        return 0;
    }

    let mut streak = 1u32;
    for pair in days_desc.windows(2) {
        if (pair[0] - pair[1]).num_days() == 1 {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}
