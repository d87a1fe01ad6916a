//! Seam to the external task-queue engine.
//!
//! The engine owns transport, rate limiting and retries. This module only
//! describes what it must provide, where run output lives on disk, and how a
//! batch of task specs flows through the result mapper into a run.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result, TaskError};
use crate::mapper;
use crate::models::{OutputEntry, ResultRecord, TaskSpec};
use crate::tasks::{self, SummaryRequest};

pub const STATE_FILE: &str = "state.json";
pub const OUTPUT_FILE: &str = "output.json";

/// Executes one GraphQL request for a task and returns the raw `data` object.
#[async_trait]
pub trait TaskEngine: Send + Sync {
    async fn execute(
        &self,
        spec: &TaskSpec,
        request: &SummaryRequest,
    ) -> std::result::Result<Value, TaskError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub id: String,
    pub dir: PathBuf,
}

/// Run-scoped persistence written by the engine and read by the aggregator.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// All runs, oldest first.
    async fn list_runs(&self) -> Result<Vec<RunHandle>>;

    /// The run's state marker. Missing, unreadable or `null` is
    /// [`Error::MissingState`].
    async fn read_state(&self, run: &RunHandle) -> Result<Value>;

    async fn read_output(&self, run: &RunHandle) -> Result<Vec<OutputEntry>>;

    async fn write_state(&self, run_id: &str, state: &RunState) -> Result<()>;

    async fn persist_output(&self, run_id: &str, entry: &OutputEntry) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub task_count: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunState {
    pub fn started(task_count: usize, now: DateTime<Utc>) -> Self {
        Self {
            status: RunStatus::Running,
            started_at: now,
            updated_at: now,
            task_count,
            succeeded: 0,
            failed: 0,
        }
    }
}

/// Lexical order of these ids is chronological.
pub fn new_run_id(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d-%H-%M-%S").to_string()
}

/// `<process_dir>/<run_id>/state.json` plus `output*.json` files holding one
/// `{ taskId, result }` entry per line.
#[derive(Debug, Clone)]
pub struct FileRunStore {
    process_dir: PathBuf,
}

impl FileRunStore {
    pub fn new(process_dir: impl Into<PathBuf>) -> Self {
        Self {
            process_dir: process_dir.into(),
        }
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.process_dir.join(run_id)
    }

    async fn output_files(&self, run: &RunHandle) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&run.dir)
            .await
            .map_err(|e| Error::io(&run.dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io(&run.dir, e))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("output") && name.ends_with(".json") {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

fn entries_from_value(path: &Path, value: Value) -> Result<Vec<OutputEntry>> {
    let values = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    values
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(|e| Error::json(path, e)))
        .collect()
}

/// Accepts a JSON array of entries or one entry per line. A malformed final
/// line is an interrupted append and is dropped; anything earlier is an error.
fn parse_entries(path: &Path, content: &str) -> Result<Vec<OutputEntry>> {
    if content.trim_start().starts_with('[') {
        let value = serde_json::from_str(content).map_err(|e| Error::json(path, e))?;
        return entries_from_value(path, value);
    }

    let lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();
    let last = lines.len().saturating_sub(1);

    let mut entries = Vec::new();
    for (position, (index, line)) in lines.into_iter().enumerate() {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => entries.extend(entries_from_value(path, value)?),
            Err(e) if position == last => {
                warn!(
                    path = %path.display(),
                    line = index + 1,
                    "Dropping incomplete trailing output entry: {e}"
                );
            }
            Err(e) => return Err(Error::json(path, e)),
        }
    }
    Ok(entries)
}

#[async_trait]
impl RunStore for FileRunStore {
    async fn list_runs(&self) -> Result<Vec<RunHandle>> {
        let mut entries = match tokio::fs::read_dir(&self.process_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %self.process_dir.display(), "No process directory yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::io(&self.process_dir, e)),
        };

        let mut runs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io(&self.process_dir, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| Error::io(entry.path(), e))?;
            if file_type.is_dir() {
                runs.push(RunHandle {
                    id: entry.file_name().to_string_lossy().into_owned(),
                    dir: entry.path(),
                });
            }
        }
        runs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(runs)
    }

    async fn read_state(&self, run: &RunHandle) -> Result<Value> {
        let path = run.dir.join(STATE_FILE);
        let missing = |reason: String| Error::MissingState {
            run: run.id.clone(),
            reason,
        };
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(missing(format!("no {STATE_FILE}")))
            }
            Err(e) => return Err(missing(format!("cannot read {}: {e}", path.display()))),
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Null) => Err(missing(format!("{STATE_FILE} is null"))),
            Ok(state) => Ok(state),
            Err(e) => Err(missing(format!("cannot parse {}: {e}", path.display()))),
        }
    }

    async fn read_output(&self, run: &RunHandle) -> Result<Vec<OutputEntry>> {
        let mut entries = Vec::new();
        for path in self.output_files(run).await? {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::io(&path, e))?;
            entries.extend(parse_entries(&path, &content)?);
        }
        Ok(entries)
    }

    async fn write_state(&self, run_id: &str, state: &RunState) -> Result<()> {
        let dir = self.run_dir(run_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::io(&dir, e))?;

        let path = dir.join(STATE_FILE);
        let tmp = dir.join(format!(".{STATE_FILE}.tmp-{}", std::process::id()));
        let content = serde_json::to_string_pretty(state).map_err(|e| Error::json(&path, e))?;
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| Error::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::io(&path, e))?;
        Ok(())
    }

    async fn persist_output(&self, run_id: &str, entry: &OutputEntry) -> Result<()> {
        let dir = self.run_dir(run_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::io(&dir, e))?;

        let path = dir.join(OUTPUT_FILE);
        let mut line = serde_json::to_string(entry).map_err(|e| Error::json(&path, e))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| Error::io(&path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| Error::io(&path, e))?;
        file.flush().await.map_err(|e| Error::io(&path, e))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub task_id: Uuid,
    pub username: String,
    pub term: String,
    pub week_of: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub succeeded: usize,
    pub failures: Vec<TaskFailure>,
}

/// Maps one raw engine result and appends it to the run output.
pub async fn record_result<S: RunStore + ?Sized>(
    store: &S,
    run_id: &str,
    spec: &TaskSpec,
    raw: &Value,
) -> Result<ResultRecord> {
    let record = mapper::map_result(spec, raw)?;
    store
        .persist_output(
            run_id,
            &OutputEntry {
                task_id: spec.id,
                result: record.clone(),
            },
        )
        .await?;
    Ok(record)
}

/// Entry point for an embedding engine: runs every task through it in order.
/// A failing task is recorded in the summary and never stops its siblings;
/// store failures are fatal.
pub async fn run_tasks<E, S>(
    engine: &E,
    store: &S,
    run_id: &str,
    specs: &[TaskSpec],
) -> Result<RunSummary>
where
    E: TaskEngine + ?Sized,
    S: RunStore + ?Sized,
{
    let mut state = RunState::started(specs.len(), Utc::now());
    store.write_state(run_id, &state).await?;
    info!(run_id, tasks = specs.len(), "Starting fetch run");

    let mut summary = RunSummary {
        run_id: run_id.to_string(),
        succeeded: 0,
        failures: Vec::new(),
    };

    for spec in specs {
        let request = tasks::summary_request(spec);
        let outcome = match engine.execute(spec, &request).await {
            Ok(raw) => record_result(store, run_id, spec, &raw).await,
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(_) => summary.succeeded += 1,
            Err(Error::Task(e)) => {
                warn!(
                    task_id = %spec.id,
                    username = %spec.username,
                    term = %spec.term,
                    week_of = %spec.week_of,
                    "Task failed: {e}"
                );
                summary.failures.push(TaskFailure {
                    task_id: spec.id,
                    username: spec.username.clone(),
                    term: spec.term.clone(),
                    week_of: spec.week_of.clone(),
                    error: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    state.status = RunStatus::Completed;
    state.updated_at = Utc::now();
    state.succeeded = summary.succeeded;
    state.failed = summary.failures.len();
    store.write_state(run_id, &state).await?;
    info!(
        run_id,
        succeeded = summary.succeeded,
        failed = summary.failures.len(),
        "Fetch run finished"
    );

    Ok(summary)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers from a canned payload per username; unknown users fail.
    #[derive(Default)]
    pub struct FakeEngine {
        payloads: HashMap<String, Value>,
        calls: Mutex<usize>,
    }

    impl FakeEngine {
        pub fn with(mut self, username: &str, payload: Value) -> Self {
            self.payloads.insert(username.to_string(), payload);
            self
        }

        pub fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TaskEngine for FakeEngine {
        async fn execute(
            &self,
            spec: &TaskSpec,
            request: &SummaryRequest,
        ) -> std::result::Result<Value, TaskError> {
            *self.calls.lock().unwrap() += 1;
            assert_eq!(request.variables.username, spec.username);
            self.payloads
                .get(&spec.username)
                .cloned()
                .ok_or_else(|| TaskError::Engine {
                    username: spec.username.clone(),
                    term: spec.term.clone(),
                    week_of: spec.week_of.clone(),
                    message: "HTTP 502".to_string(),
                })
        }
    }
}
