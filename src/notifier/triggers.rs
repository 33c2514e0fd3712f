//! Trigger-time arithmetic.
//!
//! Trigger times are wall-clock times of day in the source timezone. For a
//! reference instant this module finds the surrounding trigger instants
//! and derives the shifted selection window.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::settings::{Settings, WINDOW_SHIFT_FACTOR};

/// The trigger instants surrounding a reference time: `current` is the
/// latest trigger at or before it, `previous` the one before that, `next`
/// the first one after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerInfo {
    pub previous: DateTime<Utc>,
    pub current: DateTime<Utc>,
    pub next: DateTime<Utc>,
}

pub fn trigger_info(times: &[NaiveTime], tz: Tz, now: DateTime<Utc>) -> TriggerInfo {
    let local_today = now.with_timezone(&tz).date_naive();

    // Materialize candidate instants over enough local days that two full
    // trigger days lie behind `now` even with a single daily trigger.
    let mut instants: Vec<DateTime<Utc>> = Vec::with_capacity(times.len() * 4);
    for offset in -2..=1_i64 {
        let date = local_today + Duration::days(offset);
        for time in times {
            // A trigger falling into a DST gap does not exist that day; on
            // a fold the earlier occurrence wins.
            if let Some(local) = tz.from_local_datetime(&date.and_time(*time)).earliest() {
                instants.push(local.with_timezone(&Utc));
            }
        }
    }
    instants.sort();

    let idx = instants.partition_point(|instant| *instant <= now);
    TriggerInfo {
        previous: instants[idx - 2],
        current: instants[idx - 1],
        next: instants[idx],
    }
}

/// Backward safety shift applied to the previous trigger so that articles
/// still being synchronized or analyzed at trigger time are not lost.
pub fn window_shift(settings: &Settings) -> Duration {
    Duration::seconds((WINDOW_SHIFT_FACTOR * settings.check_updates_interval) as i64)
}

/// Start of the selection window for the trigger cycle containing `now`.
pub fn shifted_window_start(settings: &Settings, now: DateTime<Utc>) -> DateTime<Utc> {
    let info = trigger_info(
        &settings.notifier.trigger_times,
        settings.source_timezone,
        now,
    );
    info.previous - window_shift(settings)
}
