use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizations: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub term: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub cohort: Vec<Member>,
}

impl Program {
    /// Exclusive upper bound of the active period.
    pub fn end_exclusive(&self) -> NaiveDate {
        calendar::next_day(self.end_date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedProgram {
    #[serde(flatten)]
    pub program: Program,
    pub weeks: Vec<NaiveDate>,
}

/// Half-open `[start, end)` week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekWindow {
    pub fn starting(start: NaiveDate) -> Self {
        Self {
            start,
            end: start + Duration::days(7),
        }
    }

    pub fn within(&self, program: &Program) -> bool {
        self.start >= program.start_date && self.end <= program.end_exclusive()
    }

    pub fn label(&self) -> String {
        calendar::format_date(self.start)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub originating_task_id: Option<Uuid>,
    pub username: String,
    pub since: NaiveDate,
    pub until: NaiveDate,
    pub term: String,
    pub week_of: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizations: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub mentee: serde_json::Value,
    pub term: String,
    pub week_of: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizations: Option<Vec<String>>,
}

/// One line of a run output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEntry {
    pub task_id: Uuid,
    pub result: ResultRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContributionTotals {
    pub commits: i64,
    pub issues: i64,
    pub pull_requests: i64,
    pub reviews: i64,
}

impl ContributionTotals {
    pub fn total(&self) -> i64 {
        self.commits + self.issues + self.pull_requests + self.reviews
    }
}

#[derive(Debug, Clone)]
pub struct WeeklyActivity {
    pub week_of: String,
    pub username: String,
    pub totals: ContributionTotals,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn program_round_trips_calendar_dates() {
        let program: Program = serde_json::from_value(json!({
            "term": "S24",
            "startDate": "2024-01-01",
            "endDate": "2024-01-14",
            "cohort": [{ "username": "alice", "mentors": ["bob"] }]
        }))
        .unwrap();

        assert_eq!(program.end_exclusive().to_string(), "2024-01-15");
        assert_eq!(program.cohort[0].mentors, Some(vec!["bob".to_string()]));
        assert_eq!(program.cohort[0].organizations, None);

        let value = serde_json::to_value(&program).unwrap();
        assert_eq!(value["startDate"], "2024-01-01");
        assert!(value["cohort"][0].get("organizations").is_none());
    }

    #[test]
    fn window_containment_uses_exclusive_program_end() {
        let program = Program {
            term: "S24".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 14).unwrap(),
            cohort: Vec::new(),
        };

        let last = WeekWindow::starting(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert!(last.within(&program));
        assert_eq!(last.label(), "2024-01-08");

        let after = WeekWindow::starting(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert!(!after.within(&program));

        let before = WeekWindow::starting(NaiveDate::from_ymd_opt(2023, 12, 25).unwrap());
        assert!(!before.within(&program));
    }

    #[test]
    fn task_spec_serializes_null_lineage() {
        let spec = TaskSpec {
            id: Uuid::new_v4(),
            parent_id: None,
            originating_task_id: None,
            username: "alice".to_string(),
            since: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            until: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            term: "S24".to_string(),
            week_of: "2024-01-01".to_string(),
            mentors: None,
            organizations: None,
        };

        let value = serde_json::to_value(&spec).unwrap();
        assert!(value["parentId"].is_null());
        assert!(value["originatingTaskId"].is_null());
        assert_eq!(value["weekOf"], "2024-01-01");
        assert_eq!(value["until"], "2024-01-08");
    }
}
