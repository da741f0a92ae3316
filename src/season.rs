//! NFL regular season calendar: which week a date falls in, and the bounds of a week.

use chrono::{DateTime, Duration, FixedOffset, Utc};

pub const FIRST_WEEK: i32 = 1;
pub const LAST_WEEK: i32 = 18;

/// Thursday September 4th 2025, midnight Eastern (EDT)
fn season_start() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2025-09-04T00:00:00-04:00").expect("valid season start")
}

pub fn is_valid_week(week: i32) -> bool {
    (FIRST_WEEK..=LAST_WEEK).contains(&week)
}

/// Week in progress at `now`. Weeks run Thursday to Wednesday.
pub fn current_week(now: DateTime<Utc>) -> i32 {
    let start = season_start().with_timezone(&Utc);
    if now < start {
        return FIRST_WEEK;
    }
    let days = (now - start).num_days();
    let week = (days / 7) as i32 + 1;
    week.min(LAST_WEEK)
}

/// First and last instant of a week, in Eastern time
pub fn week_range(week: i32) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
    let start = season_start() + Duration::days(7 * i64::from(week - 1));
    let end = start + Duration::days(7) - Duration::milliseconds(1);
    (start, end)
}

pub fn week_label(week: i32) -> String {
    let (start, end) = week_range(week);
    format!("Week {} ({} - {})", week, start.format("%b %-d"), end.format("%b %-d"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn before_season_is_week_one() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(current_week(now), 1);
    }

    #[test]
    fn week_boundaries() {
        // Wednesday night, still week 1
        let now = Utc.with_ymd_and_hms(2025, 9, 11, 3, 59, 0).unwrap();
        assert_eq!(current_week(now), 1);
        // Thursday midnight EDT starts week 2
        let now = Utc.with_ymd_and_hms(2025, 9, 11, 4, 0, 0).unwrap();
        assert_eq!(current_week(now), 2);
    }

    #[test]
    fn capped_at_last_week() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(current_week(now), LAST_WEEK);
    }

    #[test]
    fn labels() {
        assert_eq!(week_label(1), "Week 1 (Sep 4 - Sep 10)");
        assert_eq!(week_label(4), "Week 4 (Sep 25 - Oct 1)");
    }

    #[test]
    fn valid_weeks() {
        assert!(is_valid_week(1));
        assert!(is_valid_week(18));
        assert!(!is_valid_week(0));
        assert!(!is_valid_week(19));
    }
}
