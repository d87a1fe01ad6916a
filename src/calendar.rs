use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::ConfigError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Monday of the week containing `date`.
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn is_monday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Mon
}

pub fn is_sunday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sun
}

pub fn next_day(date: NaiveDate) -> NaiveDate {
    date + Duration::days(1)
}

pub fn add_weeks(date: NaiveDate, weeks: i64) -> NaiveDate {
    date + Duration::weeks(weeks)
}

/// Week starts from the Monday of `from`'s week, stepping 7 days while
/// strictly before `until`.
pub fn week_starts(from: NaiveDate, until: NaiveDate) -> Vec<NaiveDate> {
    let mut weeks = Vec::new();
    let mut current = start_of_week(from);
    while current < until {
        weeks.push(current);
        current = add_weeks(current, 1);
    }
    weeks
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|source| ConfigError::InvalidDate {
        value: value.to_string(),
        source,
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Midnight UTC timestamp for a calendar date, as the GraphQL API expects.
pub fn utc_midnight(date: NaiveDate) -> String {
    format!("{}T00:00:00Z", format_date(date))
}
