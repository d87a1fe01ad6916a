use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::calendar;
use crate::error::ConfigError;
use crate::models::{ExpandedProgram, TaskSpec};
use crate::window::FetchRange;

/// Contribution summary of one user over `[since, until)`. Collections are
/// capped at 100 repositories and 100 items; `pageInfo` is only read to
/// detect truncation.
pub const SUMMARY_QUERY: &str = r#"query GetSummary($username: String!, $since: DateTime!, $until: DateTime!) {
    rateLimit {
        cost
        limit
        nodeCount
        remaining
        resetAt
        used
    }
    user(login: $username) {
        login
        name
        contributionsCollection(from: $since, to: $until) {
            startedAt
            endedAt
            hasAnyContributions

            totalCommitContributions
            totalIssueContributions
            totalPullRequestContributions
            totalPullRequestReviewContributions

            totalRepositoriesWithContributedCommits
            totalRepositoriesWithContributedIssues

            commitContributionsByRepository(maxRepositories: 100) {
                repository {
                    owner {
                        login
                    }
                    nameWithOwner
                    url
                }
                url
                contributions(first: 100) {
                    pageInfo {
                        hasNextPage
                    }
                    totalCount
                }
            }
            issueContributionsByRepository(maxRepositories: 100) {
                repository {
                    owner {
                        login
                    }
                    nameWithOwner
                    url
                }
                contributions(first: 100) {
                    pageInfo {
                        hasNextPage
                    }
                    totalCount
                    nodes {
                        issue {
                            number
                        }
                    }
                }
            }
            pullRequestContributionsByRepository(maxRepositories: 100) {
                repository {
                    owner {
                        login
                    }
                    nameWithOwner
                    url
                }
                contributions(first: 100) {
                    pageInfo {
                        hasNextPage
                    }
                    totalCount
                    nodes {
                        pullRequest {
                            number
                        }
                    }
                }
            }
            pullRequestReviewContributionsByRepository(maxRepositories: 100) {
                repository {
                    owner {
                        login
                    }
                    nameWithOwner
                    url
                }
                contributions(first: 100) {
                    pageInfo {
                        hasNextPage
                    }
                    totalCount
                    nodes {
                        pullRequestReview {
                            url
                            pullRequest {
                                number
                            }
                        }
                    }
                }
            }
        }
    }
}"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryVariables {
    pub username: String,
    pub since: String,
    pub until: String,
}

/// What the engine sends for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRequest {
    pub query: &'static str,
    pub variables: QueryVariables,
}

pub fn query_variables(spec: &TaskSpec) -> QueryVariables {
    QueryVariables {
        username: spec.username.clone(),
        since: calendar::utc_midnight(spec.since),
        until: calendar::utc_midnight(spec.until),
    }
}

pub fn summary_request(spec: &TaskSpec) -> SummaryRequest {
    SummaryRequest {
        query: SUMMARY_QUERY,
        variables: query_variables(spec),
    }
}

pub fn select_programs<'a>(
    programs: &'a [ExpandedProgram],
    term: Option<&str>,
) -> Result<Vec<&'a ExpandedProgram>, ConfigError> {
    match term {
        None => Ok(programs.iter().collect()),
        Some(term) => programs
            .iter()
            .find(|p| p.program.term == term)
            .map(|p| vec![p])
            .ok_or_else(|| ConfigError::UnknownTerm(term.to_string())),
    }
}

/// One task per (program, window inside the program, member).
pub fn generate_tasks(programs: &[&ExpandedProgram], range: &FetchRange) -> Vec<TaskSpec> {
    let mut specs = Vec::new();

    for expanded in programs {
        let program = &expanded.program;
        let windows = range.windows_for(program);
        if windows.is_empty() {
            info!(
                term = %program.term,
                "Skipping {} as the fetch range {} is outside the term",
                program.term,
                range.describe()
            );
            continue;
        }

        for window in windows {
            for member in &program.cohort {
                debug!(
                    term = %program.term,
                    username = %member.username,
                    since = %window.start,
                    until = %window.end,
                    "Creating fetch task"
                );
                specs.push(TaskSpec {
                    id: Uuid::new_v4(),
                    parent_id: None,
                    originating_task_id: None,
                    username: member.username.clone(),
                    since: window.start,
                    until: window.end,
                    term: program.term.clone(),
                    week_of: window.label(),
                    mentors: member.mentors.clone(),
                    organizations: member.organizations.clone(),
                });
            }
        }
    }

    specs
}
