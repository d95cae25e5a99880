//! Cadence eligibility: may the user complete a goal right now?
//!
//! The backend can send an explicit `next_eligible_at`; when it parses it
//! always wins. Otherwise a goal never completed is eligible, a daily goal
//! is eligible once the calendar date changed since the last completion and
//! a weekly goal once the ISO-8601 week changed.
//!
//! All calendar arithmetic happens in the timezone of the `now` argument:
//! completion timestamps are converted into that zone before their date is
//! taken, and ISO weeks are computed on plain calendar dates. Pass
//! `Local::now()` for the user's wall clock.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::models::{Cadence, UserGoal};

/// Naive formats accepted besides RFC 3339, read in the caller's zone
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Anything that carries a completion schedule.
pub trait CompletionSchedule {
    fn cadence(&self) -> Cadence;
    fn last_completed_at(&self) -> Option<&str>;
    fn next_eligible_at(&self) -> Option<&str>;
}

impl CompletionSchedule for UserGoal {
    fn cadence(&self) -> Cadence {
        self.effective_cadence()
    }

    fn last_completed_at(&self) -> Option<&str> {
        self.last_completed()
    }

    fn next_eligible_at(&self) -> Option<&str> {
        self.next_eligible_at.as_deref().filter(|s| !s.is_empty())
    }
}

/// Parse a backend timestamp into `tz`. Returns `None` for anything that
/// does not parse; callers treat that as "no timestamp".
pub fn parse_timestamp<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Tz>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(tz));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return tz.from_local_datetime(&naive).earliest();
        }
    }
    // Date-only values are midnight UTC
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive).with_timezone(tz))
}

/// ISO-8601 `(week-year, week)` of a calendar date.
///
/// The date is moved to the Thursday of its Monday-based week; that
/// Thursday's year is the ISO year and its day-of-year gives the week as
/// `ceil(day_of_year / 7)`. At the edges of the representable range,
/// where that Thursday does not exist, chrono's own ISO week is used.
pub fn iso_week(date: NaiveDate) -> (i32, u32) {
    let day_num = i64::from(date.weekday().number_from_monday());
    match date.checked_add_signed(Duration::days(4 - day_num)) {
        Some(thursday) => (thursday.year(), (thursday.ordinal() + 6) / 7),
        None => {
            let week = date.iso_week();
            (week.year(), week.week())
        }
    }
}

pub fn is_same_day<Tz: TimeZone>(a: &DateTime<Tz>, b: &DateTime<Tz>) -> bool {
    a.date_naive() == b.date_naive()
}

pub fn is_same_iso_week<Tz: TimeZone>(a: &DateTime<Tz>, b: &DateTime<Tz>) -> bool {
    iso_week(a.date_naive()) == iso_week(b.date_naive())
}

/// Whether `goal` can be completed at `now`.
pub fn is_eligible<G, Tz>(goal: &G, now: &DateTime<Tz>) -> bool
where
    G: CompletionSchedule + ?Sized,
    Tz: TimeZone,
{
    let tz = now.timezone();

    if let Some(next) = goal
        .next_eligible_at()
        .and_then(|raw| parse_timestamp(raw, &tz))
    {
        return next <= *now;
    }

    let Some(last) = goal
        .last_completed_at()
        .and_then(|raw| parse_timestamp(raw, &tz))
    else {
        return true;
    };

    match goal.cadence() {
        Cadence::Daily => !is_same_day(&last, now),
        Cadence::Weekly => !is_same_iso_week(&last, now),
    }
}

/// `is_eligible` against the local wall clock
pub fn is_eligible_now<G: CompletionSchedule + ?Sized>(goal: &G) -> bool {
    is_eligible(goal, &Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    struct Goal {
        cadence: Cadence,
        last: Option<&'static str>,
        next: Option<&'static str>,
    }

    impl CompletionSchedule for Goal {
        fn cadence(&self) -> Cadence {
            self.cadence
        }
        fn last_completed_at(&self) -> Option<&str> {
            self.last
        }
        fn next_eligible_at(&self) -> Option<&str> {
            self.next
        }
    }

    fn goal(cadence: Cadence, last: Option<&'static str>, next: Option<&'static str>) -> Goal {
        Goal { cadence, last, next }
    }

    fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    #[test]
    fn test_never_completed_is_eligible() {
        let now = at("2025-06-11T09:00:00+00:00");
        assert!(is_eligible(&goal(Cadence::Daily, None, None), &now));
        assert!(is_eligible(&goal(Cadence::Weekly, None, None), &now));
    }

    #[test]
    fn test_daily_same_date_not_eligible_until_next_day() {
        let g = goal(Cadence::Daily, Some("2025-06-11T07:15:00+00:00"), None);
        assert!(!is_eligible(&g, &at("2025-06-11T07:16:00+00:00")));
        assert!(!is_eligible(&g, &at("2025-06-11T23:59:59+00:00")));
        assert!(is_eligible(&g, &at("2025-06-12T00:00:00+00:00")));
    }

    #[test]
    fn test_daily_uses_zone_of_now() {
        // 23:30 UTC is already 01:30 the next day at +02:00
        let g = goal(Cadence::Daily, Some("2025-03-10T23:30:00Z"), None);
        assert!(!is_eligible(&g, &at("2025-03-11T08:00:00+02:00")));
        assert!(is_eligible(&g, &at("2025-03-11T08:00:00+00:00")));
    }

    #[test]
    fn test_weekly_same_iso_week() {
        // Monday 2025-06-09 .. Sunday 2025-06-15
        let g = goal(Cadence::Weekly, Some("2025-06-09T10:00:00+00:00"), None);
        assert!(!is_eligible(&g, &at("2025-06-12T10:00:00+00:00")));
        assert!(!is_eligible(&g, &at("2025-06-15T22:00:00+00:00")));
        assert!(is_eligible(&g, &at("2025-06-16T00:00:01+00:00")));
    }

    #[test]
    fn test_weekly_sunday_then_monday_is_eligible() {
        let g = goal(Cadence::Weekly, Some("2025-06-15T20:00:00+00:00"), None);
        assert!(is_eligible(&g, &at("2025-06-16T08:00:00+00:00")));
    }

    #[test]
    fn test_weekly_across_calendar_year_in_same_iso_week() {
        // Tue 2024-12-31 and Wed 2025-01-01 are both in 2025-W01
        let g = goal(Cadence::Weekly, Some("2024-12-31T12:00:00+00:00"), None);
        assert!(!is_eligible(&g, &at("2025-01-01T12:00:00+00:00")));
        assert!(is_eligible(&g, &at("2025-01-06T12:00:00+00:00")));
    }

    #[test]
    fn test_weekly_same_week_number_different_year() {
        let g = goal(Cadence::Weekly, Some("2024-06-12T12:00:00+00:00"), None);
        assert_eq!(iso_week(NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()).1, 24);
        assert_eq!(iso_week(NaiveDate::from_ymd_opt(2025, 6, 11).unwrap()).1, 24);
        assert!(is_eligible(&g, &at("2025-06-11T12:00:00+00:00")));
    }

    #[test]
    fn test_next_eligible_at_overrides_cadence() {
        let now = at("2025-06-11T12:00:00+00:00");
        // Never completed, but the server says later
        let g = goal(Cadence::Daily, None, Some("2025-06-11T12:00:01+00:00"));
        assert!(!is_eligible(&g, &now));
        // Completed today, but the server says the window is open
        let g = goal(Cadence::Daily, Some("2025-06-11T08:00:00+00:00"), Some("2025-06-11T09:00:00+00:00"));
        assert!(is_eligible(&g, &now));
        // Equal to now counts as open
        let g = goal(Cadence::Weekly, None, Some("2025-06-11T12:00:00+00:00"));
        assert!(is_eligible(&g, &now));
    }

    #[test]
    fn test_malformed_next_eligible_falls_through() {
        let now = at("2025-06-11T12:00:00+00:00");
        let g = goal(Cadence::Daily, Some("2025-06-11T08:00:00+00:00"), Some("not a date"));
        assert!(!is_eligible(&g, &now));
        let g = goal(Cadence::Daily, None, Some("soon"));
        assert!(is_eligible(&g, &now));
    }

    #[test]
    fn test_malformed_last_completion_counts_as_absent() {
        let now = at("2025-06-11T12:00:00+00:00");
        assert!(is_eligible(&goal(Cadence::Daily, Some("yesterday-ish"), None), &now));
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let naive = parse_timestamp("2025-06-11 08:30:00", &tz).unwrap();
        assert_eq!(naive.to_rfc3339(), "2025-06-11T08:30:00+02:00");

        let fractional = parse_timestamp("2025-06-11T08:30:00.250", &tz).unwrap();
        assert_eq!(fractional.timestamp_subsec_millis(), 250);

        let date_only = parse_timestamp("2025-06-11", &tz).unwrap();
        assert_eq!(date_only.to_rfc3339(), "2025-06-11T02:00:00+02:00");

        assert!(parse_timestamp("", &tz).is_none());
        assert!(parse_timestamp("11/06/2025", &tz).is_none());
    }

    #[test]
    fn test_iso_week_matches_chrono_for_a_decade() {
        let mut date = NaiveDate::from_ymd_opt(2019, 12, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2031, 1, 31).unwrap();
        while date <= end {
            let expected = date.iso_week();
            assert_eq!(iso_week(date), (expected.year(), expected.week()), "{}", date);
            date += Duration::days(1);
        }
    }

    #[test]
    fn test_iso_week_known_values() {
        let d = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(iso_week(d(2021, 1, 3)), (2020, 53));
        assert_eq!(iso_week(d(2021, 1, 4)), (2021, 1));
        assert_eq!(iso_week(d(2026, 12, 31)), (2026, 53));
        assert_eq!(iso_week(d(2027, 1, 1)), (2026, 53));
    }

    #[test]
    fn test_iso_week_at_calendar_limits() {
        for date in [NaiveDate::MAX, NaiveDate::MIN] {
            let expected = date.iso_week();
            assert_eq!(iso_week(date), (expected.year(), expected.week()), "{}", date);
        }
    }

    #[test]
    fn test_extreme_completion_years_do_not_panic() {
        let now = at("2025-06-11T12:00:00+02:00");
        for last in ["+262142-12-31T00:00:00", "+262142-12-31 23:59:59"] {
            assert!(is_eligible(&goal(Cadence::Weekly, Some(last), None), &now), "{}", last);
            assert!(is_eligible(&goal(Cadence::Daily, Some(last), None), &now), "{}", last);
        }
    }

    #[test]
    fn test_user_goal_implements_schedule() {
        let g: UserGoal = serde_json::from_value(serde_json::json!({
            "id": 1,
            "schedule": { "cadence": "WEEKLY" },
            "lastCompletedAt": "2025-06-09T10:00:00Z",
            "next_eligible_at": ""
        }))
        .unwrap();
        assert!(!is_eligible(&g, &at("2025-06-10T10:00:00+00:00")));
        assert!(is_eligible(&g, &at("2025-06-17T10:00:00+00:00")));
    }
}
