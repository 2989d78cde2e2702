use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

/// Lowercase weekday name as used as a key into a weekly pattern
/// (`"monday"`, … `"sunday"`).
pub fn weekday_key(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Default handoff time/location for a day that turns out to be a handoff
/// day: noon at an unspecified location on weekends, 5pm at daycare on
/// weekdays. Shared by generation (C3) and adjacency repair (C4) so both
/// paths fill the same defaults.
pub fn default_handoff(date: NaiveDate) -> (NaiveTime, &'static str) {
    if is_weekend(date) {
        (NaiveTime::from_hms_opt(12, 0, 0).unwrap(), "other")
    } else {
        (NaiveTime::from_hms_opt(17, 0, 0).unwrap(), "daycare")
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResult {
    pub created: usize,
    pub affected_months: Vec<(i32, u32)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_key_lowercases_correctly() {
        let monday = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        assert_eq!(weekday_key(monday), "monday");
    }

    #[test]
    fn default_handoff_weekend_is_noon_other() {
        let saturday = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let (time, location) = default_handoff(saturday);
        assert_eq!(time, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert_eq!(location, "other");
    }

    #[test]
    fn default_handoff_weekday_is_5pm_daycare() {
        let tuesday = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let (time, location) = default_handoff(tuesday);
        assert_eq!(time, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
        assert_eq!(location, "daycare");
    }
}
