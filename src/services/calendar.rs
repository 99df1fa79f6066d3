// src/services/calendar.rs
use chrono::{Datelike, Duration, Utc, Weekday};
use chrono_tz::Asia::Shanghai;

use crate::models::MarketDateKey;

/// The day before `date`, rolled back to Friday when that lands on a weekend.
/// Holidays are not considered.
pub fn previous_business_day(date: &MarketDateKey) -> MarketDateKey {
    let mut day = date.date() - Duration::days(1);
    match day.weekday() {
        Weekday::Sun => day -= Duration::days(2),
        Weekday::Sat => day -= Duration::days(1),
        _ => {}
    }
    MarketDateKey::new(day)
}

/// Current calendar date on the exchange's clock.
pub fn exchange_today() -> MarketDateKey {
    MarketDateKey::new(Utc::now().with_timezone(&Shanghai).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> MarketDateKey {
        s.parse().unwrap()
    }

    #[test]
    fn weekday_steps_back_one_day() {
        assert_eq!(previous_business_day(&key("2024-03-06")), key("2024-03-05"));
        assert_eq!(previous_business_day(&key("2024-03-02")), key("2024-03-01"));
    }

    #[test]
    fn monday_rolls_back_to_friday() {
        assert_eq!(previous_business_day(&key("2024-03-04")), key("2024-03-01"));
    }

    #[test]
    fn sunday_rolls_back_to_friday() {
        assert_eq!(previous_business_day(&key("2024-03-03")), key("2024-03-01"));
    }
}
