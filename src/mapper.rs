use serde::Deserialize;
use serde_json::Value;

use crate::error::TaskError;
use crate::models::{ResultRecord, TaskSpec};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionProbe {
    commit_contributions_by_repository: Option<Vec<RepositoryProbe>>,
    issue_contributions_by_repository: Option<Vec<RepositoryProbe>>,
    pull_request_contributions_by_repository: Option<Vec<RepositoryProbe>>,
    pull_request_review_contributions_by_repository: Option<Vec<RepositoryProbe>>,
}

#[derive(Debug, Deserialize)]
struct RepositoryProbe {
    repository: Option<RepositoryRef>,
    contributions: Option<ConnectionProbe>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryRef {
    name_with_owner: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionProbe {
    page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    #[serde(default)]
    has_next_page: bool,
}

impl RepositoryProbe {
    fn has_next_page(&self) -> bool {
        self.contributions
            .as_ref()
            .and_then(|c| c.page_info.as_ref())
            .is_some_and(|p| p.has_next_page)
    }

    fn name(&self) -> String {
        self.repository
            .as_ref()
            .and_then(|r| r.name_with_owner.clone())
            .unwrap_or_else(|| "<unknown repository>".to_string())
    }
}

fn user_payload<'a>(spec: &TaskSpec, raw: &'a Value) -> Result<&'a Value, TaskError> {
    match raw.get("user") {
        Some(user) if user.is_object() => Ok(user),
        _ => Err(TaskError::MissingUser {
            username: spec.username.clone(),
            term: spec.term.clone(),
            week_of: spec.week_of.clone(),
        }),
    }
}

/// Fails when any contribution collection needs another page. Sub-collection
/// pagination is unsupported, so a truncated window must be narrowed rather
/// than retried.
pub fn check_complete(spec: &TaskSpec, raw: &Value) -> Result<(), TaskError> {
    let user = user_payload(spec, raw)?;
    let collection = match user.get("contributionsCollection") {
        None | Some(Value::Null) => return Ok(()),
        Some(value) => value,
    };
    let probe: CollectionProbe =
        serde_json::from_value(collection.clone()).map_err(|source| TaskError::Malformed {
            username: spec.username.clone(),
            term: spec.term.clone(),
            week_of: spec.week_of.clone(),
            source,
        })?;

    let collections = [
        ("commitContributionsByRepository", &probe.commit_contributions_by_repository),
        ("issueContributionsByRepository", &probe.issue_contributions_by_repository),
        (
            "pullRequestContributionsByRepository",
            &probe.pull_request_contributions_by_repository,
        ),
        (
            "pullRequestReviewContributionsByRepository",
            &probe.pull_request_review_contributions_by_repository,
        ),
    ];

    for (name, repositories) in collections {
        let truncated = repositories
            .iter()
            .flatten()
            .find(|repository| repository.has_next_page());
        if let Some(repository) = truncated {
            return Err(TaskError::Truncated {
                username: spec.username.clone(),
                term: spec.term.clone(),
                week_of: spec.week_of.clone(),
                collection: name,
                repository: repository.name(),
            });
        }
    }

    Ok(())
}

pub fn map_result(spec: &TaskSpec, raw: &Value) -> Result<ResultRecord, TaskError> {
    check_complete(spec, raw)?;
    let user = user_payload(spec, raw)?;

    Ok(ResultRecord {
        mentee: user.clone(),
        term: spec.term.clone(),
        week_of: spec.week_of.clone(),
        mentors: spec.mentors.clone(),
        organizations: spec.organizations.clone(),
    })
}
