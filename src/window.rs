use chrono::{Duration, NaiveDate};

use crate::calendar;
use crate::error::ConfigError;
use crate::models::{Program, WeekWindow};

/// The week before the one containing `reference`.
pub fn previous_week(reference: NaiveDate) -> WeekWindow {
    WeekWindow::starting(calendar::start_of_week(reference) - Duration::days(7))
}

/// Weekly windows covering `[start, end + 1 day)`. `start` must be a Monday
/// and `end` a Sunday.
pub fn explicit_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<WeekWindow>, ConfigError> {
    let end_exclusive = calendar::next_day(end);
    if !calendar::is_monday(start) {
        return Err(ConfigError::RangeStartNotMonday(start));
    }
    if !calendar::is_monday(end_exclusive) {
        return Err(ConfigError::RangeEndNotSunday(end));
    }
    if start >= end_exclusive {
        return Err(ConfigError::EmptyRange { start, end });
    }

    Ok(calendar::week_starts(start, end_exclusive)
        .into_iter()
        .map(WeekWindow::starting)
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRange {
    PreviousWeek(WeekWindow),
    Explicit {
        start: NaiveDate,
        end: NaiveDate,
        windows: Vec<WeekWindow>,
    },
}

impl FetchRange {
    /// Neither bound selects the previous week of `reference`; both bounds
    /// select an explicit range; one alone is a configuration error.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        reference: NaiveDate,
    ) -> Result<Self, ConfigError> {
        match (start, end) {
            (None, None) => Ok(FetchRange::PreviousWeek(previous_week(reference))),
            (Some(start), Some(end)) => Ok(FetchRange::Explicit {
                start,
                end,
                windows: explicit_range(start, end)?,
            }),
            (start, end) => Err(ConfigError::PartialRange { start, end }),
        }
    }

    pub fn windows(&self) -> &[WeekWindow] {
        match self {
            FetchRange::PreviousWeek(window) => std::slice::from_ref(window),
            FetchRange::Explicit { windows, .. } => windows,
        }
    }

    /// Windows lying fully inside the program's active period.
    pub fn windows_for(&self, program: &Program) -> Vec<WeekWindow> {
        self.windows()
            .iter()
            .filter(|window| window.within(program))
            .copied()
            .collect()
    }

    pub fn describe(&self) -> String {
        match self {
            FetchRange::PreviousWeek(window) => format!("{} to {}", window.start, window.end),
            FetchRange::Explicit { start, end, .. } => {
                format!("{} to {}", start, calendar::next_day(*end))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn date(value: &str) -> NaiveDate {
        calendar::parse_date(value).unwrap()
    }

    #[test]
    fn previous_week_for_every_weekday() {
        // 2024-01-08 .. 2024-01-14 is week W; following Monday is 2024-01-15.
        for offset in 0..7 {
            let reference = date("2024-01-08") + Duration::days(offset);
            let window = previous_week(reference);
            assert_eq!(window.start, date("2024-01-15") - Duration::days(14));
            assert_eq!(window.end - window.start, Duration::days(7));
            assert_eq!(window.start.weekday(), chrono::Weekday::Mon);
        }
    }

    #[test]
    fn resolve_requires_both_bounds() {
        let reference = date("2024-01-10");
        assert!(matches!(
            FetchRange::resolve(Some(date("2024-01-01")), None, reference),
            Err(ConfigError::PartialRange { .. })
        ));
        assert!(matches!(
            FetchRange::resolve(None, Some(date("2024-01-14")), reference),
            Err(ConfigError::PartialRange { .. })
        ));

        let range = FetchRange::resolve(None, None, reference).unwrap();
        assert_eq!(range.windows(), &[WeekWindow::starting(date("2024-01-01"))]);
    }

    #[test]
    fn explicit_range_validates_alignment() {
        assert!(matches!(
            explicit_range(date("2024-01-02"), date("2024-01-14")),
            Err(ConfigError::RangeStartNotMonday(_))
        ));
        assert!(matches!(
            explicit_range(date("2024-01-01"), date("2024-01-15")),
            Err(ConfigError::RangeEndNotSunday(_))
        ));
    }

    #[test]
    fn explicit_range_rejects_reversed_bounds() {
        let err = explicit_range(date("2024-02-05"), date("2024-01-07")).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRange { .. }));
        assert!(err.to_string().contains("2024-02-05"));
        assert!(err.to_string().contains("2024-01-07"));

        assert!(matches!(
            FetchRange::resolve(Some(date("2024-01-08")), Some(date("2024-01-07")), date("2024-06-01")),
            Err(ConfigError::EmptyRange { .. })
        ));
    }

    #[test]
    fn explicit_range_is_contiguous_and_covering() {
        let windows = explicit_range(date("2024-01-01"), date("2024-02-04")).unwrap();
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[0].start, date("2024-01-01"));
        assert_eq!(windows[4].end, date("2024-02-05"));
        assert!(windows.windows(2).all(|pair| pair[0].end == pair[1].start));
    }

    #[test]
    fn windows_are_clipped_to_program() {
        let program = Program {
            term: "S24".to_string(),
            start_date: date("2024-01-08"),
            end_date: date("2024-01-21"),
            cohort: Vec::new(),
        };
        let range = FetchRange::resolve(
            Some(date("2024-01-01")),
            Some(date("2024-01-28")),
            date("2024-06-01"),
        )
        .unwrap();

        let kept: Vec<NaiveDate> = range.windows_for(&program).iter().map(|w| w.start).collect();
        assert_eq!(kept, vec![date("2024-01-08"), date("2024-01-15")]);
        assert_eq!(range.describe(), "2024-01-01 to 2024-01-29");
    }

    #[test]
    fn previous_week_keeps_program_final_week() {
        let program = Program {
            term: "S24".to_string(),
            start_date: date("2024-01-01"),
            end_date: date("2024-01-14"),
            cohort: Vec::new(),
        };
        let range = FetchRange::resolve(None, None, date("2024-01-17")).unwrap();
        assert_eq!(range.windows_for(&program).len(), 1);

        let range = FetchRange::resolve(None, None, date("2024-01-24")).unwrap();
        assert!(range.windows_for(&program).is_empty());
    }
}
