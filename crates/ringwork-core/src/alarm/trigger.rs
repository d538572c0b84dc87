//! Trigger-time calculation.
//!
//! Pure functions over a caller-supplied `now`. Both work in whatever time
//! zone `now` carries, so the wall-clock `hour:minute` is interpreted in that
//! zone.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};

/// Next instant at `hour:minute` strictly after `now`.
///
/// Tries today first; if that moment is not in the future, the same time on
/// the following calendar day is used. Seconds and sub-seconds are zero.
pub fn next_trigger<Tz: TimeZone>(hour: u8, minute: u8, now: &DateTime<Tz>) -> DateTime<Tz> {
    let today = now.date_naive();
    let candidate = at_wall_clock(&now.timezone(), today, hour, minute);
    if candidate <= *now {
        at_wall_clock(&now.timezone(), next_day(today), hour, minute)
    } else {
        candidate
    }
}

/// `hour:minute` on the calendar day after `now`, unconditionally.
pub fn tomorrow_at<Tz: TimeZone>(hour: u8, minute: u8, now: &DateTime<Tz>) -> DateTime<Tz> {
    at_wall_clock(&now.timezone(), next_day(now.date_naive()), hour, minute)
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

fn at_wall_clock<Tz: TimeZone>(tz: &Tz, date: NaiveDate, hour: u8, minute: u8) -> DateTime<Tz> {
    let time = NaiveTime::from_hms_opt(u32::from(hour.min(23)), u32::from(minute.min(59)), 0)
        .unwrap_or(NaiveTime::MIN);
    let naive = date.and_time(time);
    // A wall-clock time skipped by a DST jump resolves to the hour after it.
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike, Utc};
    use proptest::prelude::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn later_today_stays_today() {
        let now = utc(2024, 3, 10, 7, 15, 42);
        assert_eq!(next_trigger(8, 0, &now), utc(2024, 3, 10, 8, 0, 0));
    }

    #[test]
    fn passed_time_rolls_to_tomorrow() {
        let now = utc(2024, 3, 10, 8, 5, 0);
        assert_eq!(next_trigger(8, 0, &now), utc(2024, 3, 11, 8, 0, 0));
    }

    #[test]
    fn exact_match_rolls_to_tomorrow() {
        let now = utc(2024, 3, 10, 8, 0, 0);
        assert_eq!(next_trigger(8, 0, &now), utc(2024, 3, 11, 8, 0, 0));
    }

    #[test]
    fn rolls_across_month_and_year() {
        let now = utc(2024, 12, 31, 23, 30, 0);
        assert_eq!(next_trigger(6, 45, &now), utc(2025, 1, 1, 6, 45, 0));
    }

    #[test]
    fn tomorrow_ignores_whether_today_passed() {
        let now = utc(2024, 3, 10, 5, 0, 0);
        assert_eq!(tomorrow_at(8, 0, &now), utc(2024, 3, 11, 8, 0, 0));
    }

    #[test]
    fn wall_clock_is_read_in_the_callers_zone() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let next = next_trigger(8, 0, &now);
        assert_eq!(next.hour(), 8);
        assert_eq!(next.with_timezone(&Utc), utc(2024, 3, 11, 5, 0, 0));
    }

    proptest! {
        #[test]
        fn next_trigger_is_within_a_day_and_on_the_minute(
            hour in 0u8..24,
            minute in 0u8..60,
            secs in 0i64..4_102_444_800,
            offset_hours in -12i32..=14,
        ) {
            let tz = FixedOffset::east_opt(offset_hours * 3600).unwrap();
            let now = tz.timestamp_opt(secs, 0).unwrap();
            let t = next_trigger(hour, minute, &now);

            prop_assert!(t > now);
            prop_assert!(t.clone() - now.clone() < Duration::hours(24) + Duration::seconds(1));
            prop_assert_eq!(t.hour(), u32::from(hour));
            prop_assert_eq!(t.minute(), u32::from(minute));
            prop_assert_eq!(t.second(), 0);
        }
    }
}
