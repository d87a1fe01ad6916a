use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::engine::RunStore;
use crate::error::{Error, Result};
use crate::files;
use crate::models::ResultRecord;

/// Records grouped by term, terms in first-seen order, records in scan
/// order.
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    pub by_term: IndexMap<String, Vec<ResultRecord>>,
    pub runs_read: usize,
    pub runs_skipped: Vec<String>,
}

impl Aggregate {
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.by_term.keys().map(String::as_str)
    }

    pub fn record_count(&self) -> usize {
        self.by_term.values().map(Vec::len).sum()
    }
}

/// Reads every run in chronological order. Runs without a readable state
/// marker are skipped.
pub async fn collect<S: RunStore + ?Sized>(store: &S) -> Result<Aggregate> {
    let mut aggregate = Aggregate::default();

    for run in store.list_runs().await? {
        match store.read_state(&run).await {
            Ok(_) => {}
            Err(Error::MissingState { run: id, reason }) => {
                warn!(run = %id, "Skipping {}: {reason}", run.dir.display());
                aggregate.runs_skipped.push(id);
                continue;
            }
            Err(e) => return Err(e),
        }

        let entries = store.read_output(&run).await?;
        debug!(run = %run.id, entries = entries.len(), "Read run output");
        for entry in entries {
            aggregate
                .by_term
                .entry(entry.result.term.clone())
                .or_default()
                .push(entry.result);
        }
        aggregate.runs_read += 1;
    }

    Ok(aggregate)
}

/// Overwrites `<term>.json` for every term in the aggregate.
pub fn write_aggregates(aggregate: &Aggregate, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (term, records) in &aggregate.by_term {
        let path = out_dir.join(files::term_file_name(term)?);
        files::write_json_atomic(&path, records)?;
        info!(term = %term, records = records.len(), "Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{FileRunStore, RunState, OUTPUT_FILE, STATE_FILE};
    use crate::models::OutputEntry;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn entry(term: &str, login: &str, week_of: &str) -> OutputEntry {
        OutputEntry {
            task_id: Uuid::new_v4(),
            result: ResultRecord {
                mentee: json!({ "login": login, "name": null }),
                term: term.to_string(),
                week_of: week_of.to_string(),
                mentors: None,
                organizations: Some(vec!["org".to_string()]),
            },
        }
    }

    async fn seeded_store(dir: &Path) -> FileRunStore {
        let store = FileRunStore::new(dir);
        let state = RunState::started(2, Utc::now());

        store.write_state("2024-01-09-00-00-00", &state).await.unwrap();
        for e in [entry("S24", "alice", "2024-01-01"), entry("F23", "bob", "2023-12-11")] {
            store.persist_output("2024-01-09-00-00-00", &e).await.unwrap();
        }

        store.write_state("2024-01-16-00-00-00", &state).await.unwrap();
        store
            .persist_output("2024-01-16-00-00-00", &entry("S24", "alice", "2024-01-08"))
            .await
            .unwrap();

        // crashed run, no state marker
        store
            .persist_output("2024-01-23-00-00-00", &entry("S24", "ghost", "2024-01-15"))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn groups_by_term_in_scan_order() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(dir.path()).await;

        let aggregate = collect(&store).await.unwrap();
        assert_eq!(aggregate.terms().collect::<Vec<_>>(), vec!["S24", "F23"]);
        assert_eq!(aggregate.runs_read, 2);
        assert_eq!(aggregate.runs_skipped, vec!["2024-01-23-00-00-00".to_string()]);
        assert_eq!(aggregate.record_count(), 3);

        let weeks: Vec<&str> = aggregate.by_term["S24"]
            .iter()
            .map(|r| r.week_of.as_str())
            .collect();
        assert_eq!(weeks, vec!["2024-01-01", "2024-01-08"]);
    }

    #[tokio::test]
    async fn null_state_marker_is_skipped() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(dir.path()).await;
        std::fs::write(
            dir.path().join("2024-01-16-00-00-00").join(STATE_FILE),
            "null",
        )
        .unwrap();

        let aggregate = collect(&store).await.unwrap();
        assert_eq!(aggregate.runs_skipped.len(), 2);
        assert_eq!(aggregate.by_term["S24"].len(), 1);
    }

    #[tokio::test]
    async fn truncated_state_marker_is_skipped() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(dir.path()).await;
        std::fs::write(
            dir.path().join("2024-01-16-00-00-00").join(STATE_FILE),
            r#"{"status": "runn"#,
        )
        .unwrap();

        let aggregate = collect(&store).await.unwrap();
        assert!(aggregate
            .runs_skipped
            .contains(&"2024-01-16-00-00-00".to_string()));
        assert_eq!(aggregate.runs_read, 1);
        assert_eq!(aggregate.by_term["S24"].len(), 1);
        assert_eq!(aggregate.by_term["F23"].len(), 1);
    }

    #[tokio::test]
    async fn interrupted_output_keeps_other_runs() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(dir.path()).await;
        let output = dir.path().join("2024-01-16-00-00-00").join(OUTPUT_FILE);
        let mut content = std::fs::read_to_string(&output).unwrap();
        content.push_str(r#"{"taskId":""#);
        std::fs::write(&output, content).unwrap();

        let aggregate = collect(&store).await.unwrap();
        assert_eq!(aggregate.runs_read, 2);
        let weeks: Vec<&str> = aggregate.by_term["S24"]
            .iter()
            .map(|r| r.week_of.as_str())
            .collect();
        assert_eq!(weeks, vec!["2024-01-01", "2024-01-08"]);
    }

    #[tokio::test]
    async fn rewriting_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir.path().join("process")).await;
        let out_dir = dir.path().join("summaries");

        let first = write_aggregates(&collect(&store).await.unwrap(), &out_dir).unwrap();
        let before: Vec<Vec<u8>> = first.iter().map(|p| std::fs::read(p).unwrap()).collect();

        let second = write_aggregates(&collect(&store).await.unwrap(), &out_dir).unwrap();
        let after: Vec<Vec<u8>> = second.iter().map(|p| std::fs::read(p).unwrap()).collect();

        assert_eq!(first, second);
        assert_eq!(before, after);

        let written: serde_json::Value = files::read_json(&out_dir.join("S24.json")).unwrap();
        assert_eq!(written.as_array().unwrap().len(), 2);
        assert_eq!(written[0]["mentee"]["login"], "alice");
        assert_eq!(written[0]["weekOf"], "2024-01-01");
        assert_eq!(written[0]["organizations"], json!(["org"]));
        assert!(written[0].get("mentors").is_none());
    }

    #[tokio::test]
    async fn empty_process_dir_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = FileRunStore::new(dir.path().join("missing"));

        let aggregate = collect(&store).await.unwrap();
        assert_eq!(aggregate.record_count(), 0);
        assert!(write_aggregates(&aggregate, dir.path()).unwrap().is_empty());
    }
}
