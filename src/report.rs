use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::models::{ContributionTotals, ResultRecord, WeeklyActivity};

fn total_field(collection: Option<&Value>, field: &str) -> i64 {
    collection
        .and_then(|c| c.get(field))
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

pub fn totals_of(record: &ResultRecord) -> ContributionTotals {
    let collection = record.mentee.get("contributionsCollection");
    ContributionTotals {
        commits: total_field(collection, "totalCommitContributions"),
        issues: total_field(collection, "totalIssueContributions"),
        pull_requests: total_field(collection, "totalPullRequestContributions"),
        reviews: total_field(collection, "totalPullRequestReviewContributions"),
    }
}

fn username_of(record: &ResultRecord) -> String {
    record
        .mentee
        .get("login")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string()
}

/// One row per record, ordered by week then username.
pub fn weekly_activity(records: &[ResultRecord]) -> Vec<WeeklyActivity> {
    let mut rows: Vec<WeeklyActivity> = records
        .iter()
        .map(|record| WeeklyActivity {
            week_of: record.week_of.clone(),
            username: username_of(record),
            totals: totals_of(record),
        })
        .collect();
    rows.sort_by(|a, b| {
        a.week_of
            .cmp(&b.week_of)
            .then_with(|| a.username.cmp(&b.username))
    });
    rows
}

pub fn build_report(term: &str, records: &[ResultRecord]) -> String {
    let rows = weekly_activity(records);

    let mut output = String::new();
    let _ = writeln!(output, "# Cohort Activity Report");
    let _ = writeln!(output, "Generated for {} ({} weekly summaries)", term, rows.len());
    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Totals");

    let mut weeks: BTreeMap<&str, (usize, usize, ContributionTotals)> = BTreeMap::new();
    for row in &rows {
        let entry = weeks
            .entry(row.week_of.as_str())
            .or_insert((0, 0, ContributionTotals::default()));
        entry.0 += 1;
        if row.totals.total() > 0 {
            entry.1 += 1;
        }
        entry.2.commits += row.totals.commits;
        entry.2.issues += row.totals.issues;
        entry.2.pull_requests += row.totals.pull_requests;
        entry.2.reviews += row.totals.reviews;
    }

    if weeks.is_empty() {
        let _ = writeln!(output, "No activity recorded for this term.");
    } else {
        for (week_of, (members, active, totals)) in &weeks {
            let _ = writeln!(
                output,
                "- week of {}: {}/{} members active, {} commits, {} issues, {} pull requests, {} reviews",
                week_of,
                active,
                members,
                totals.commits,
                totals.issues,
                totals.pull_requests,
                totals.reviews
            );
        }
    }

    let mut by_member: HashMap<&str, i64> = HashMap::new();
    for row in &rows {
        *by_member.entry(row.username.as_str()).or_insert(0) += row.totals.total();
    }
    let mut ranked: Vec<(&str, i64)> = by_member.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Active Members");
    if ranked.is_empty() {
        let _ = writeln!(output, "No members recorded for this term.");
    } else {
        for (username, total) in ranked.iter().take(10) {
            let _ = writeln!(output, "- {username}: {total} contributions");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Quiet Members");
    match weeks.keys().next_back() {
        None => {
            let _ = writeln!(output, "No activity recorded for this term.");
        }
        Some(latest) => {
            let quiet: Vec<&str> = rows
                .iter()
                .filter(|row| row.week_of == *latest && row.totals.total() == 0)
                .map(|row| row.username.as_str())
                .collect();
            if quiet.is_empty() {
                let _ = writeln!(output, "Everyone contributed in the week of {latest}.");
            } else {
                let _ = writeln!(output, "No contributions in the week of {latest}:");
                for username in quiet {
                    let _ = writeln!(output, "- {username}");
                }
            }
        }
    }

    output
}

#[derive(Serialize)]
struct CsvRow<'a> {
    week_of: &'a str,
    username: &'a str,
    commits: i64,
    issues: i64,
    pull_requests: i64,
    reviews: i64,
}

pub fn write_csv(records: &[ResultRecord], out: &Path) -> Result<usize> {
    let rows = weekly_activity(records);
    let mut writer = csv::Writer::from_path(out)?;
    for row in &rows {
        writer.serialize(CsvRow {
            week_of: &row.week_of,
            username: &row.username,
            commits: row.totals.commits,
            issues: row.totals.issues,
            pull_requests: row.totals.pull_requests,
            reviews: row.totals.reviews,
        })?;
    }
    writer.flush().map_err(|e| crate::error::Error::io(out, e))?;
    Ok(rows.len())
}
