//! Daily trigger math.
//! A trigger fires once per day at `HH:MM` wall-clock time in a given timezone.
//!
//! Local times that do not exist (DST spring-forward) skip to the next day;
//! ambiguous times (DST fall-back) fire on the earlier instant.

use apodbot_core::time::SendTime;
use chrono::{DateTime, Days, NaiveTime, TimeZone};

/// Next fire strictly after `after` for a daily trigger at `at`.
pub fn next_daily_run<Tz: TimeZone>(at: SendTime, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let time = NaiveTime::from_hms_opt(at.hour(), at.minute(), 0)?;
    let tz = after.timezone();
    let mut day = after.date_naive();

    // Two days covers "later today" and "tomorrow"; the rest absorb DST gaps.
    for _ in 0..4 {
        let naive = day.and_time(time);
        if let Some(candidate) = tz.from_local_datetime(&naive).earliest()
            && candidate > *after
        {
            return Some(candidate);
        }
        day = day.checked_add_days(Days::new(1))?;
    }

    tracing::warn!("Could not compute next run for {at}");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike, Utc};

    fn t(s: &str) -> SendTime {
        SendTime::parse(s).unwrap()
    }

    #[test]
    fn test_later_today() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 7, 0, 0).unwrap();
        let next = next_daily_run(t("08:00"), &after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 22, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_already_passed_rolls_to_tomorrow() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 13, 31, 0).unwrap();
        let next = next_daily_run(t("13:30"), &after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 23, 13, 30, 0).unwrap());
    }

    #[test]
    fn test_exact_instant_is_not_next() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 13, 30, 0).unwrap();
        let next = next_daily_run(t("13:30"), &after).unwrap();
        assert_eq!(next.date_naive().to_string(), "2026-02-23");
    }

    #[test]
    fn test_month_end() {
        let after = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 30).unwrap();
        let next = next_daily_run(t("0:00"), &after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_fixed_offset_keeps_wall_clock() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        let after = tz.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let next = next_daily_run(t("13:00"), &after).unwrap();
        assert_eq!(next.hour(), 13);
        assert_eq!(next.minute(), 0);
    }
}
