use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

use cohort_activity::aggregate;
use cohort_activity::calendar;
use cohort_activity::config::DataLayout;
use cohort_activity::engine::{self, FileRunStore, RunState, RunStore};
use cohort_activity::error::Error;
use cohort_activity::files;
use cohort_activity::logging;
use cohort_activity::models::{ResultRecord, TaskSpec};
use cohort_activity::programs;
use cohort_activity::report;
use cohort_activity::tasks;
use cohort_activity::window::FetchRange;

#[derive(Parser)]
#[command(name = "cohort-activity")]
#[command(about = "Weekly contribution summaries for program cohorts", long_about = None)]
struct Cli {
    /// Data root holding programs.json and the stage directories
    #[arg(long, global = true, env = "COHORT_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Markdown,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand programs.json into per-program week lists and the term registry
    BuildPrograms,
    /// Generate fetch tasks for the previous week or an explicit range
    Plan {
        /// First Monday to fetch (requires --end-date)
        #[arg(long, env = "START_DATE", value_parser = calendar::parse_date)]
        start_date: Option<NaiveDate>,
        /// Last Sunday to fetch (requires --start-date)
        #[arg(long, env = "END_DATE", value_parser = calendar::parse_date)]
        end_date: Option<NaiveDate>,
        /// Only plan tasks for this program term
        #[arg(long, env = "TERM_KEY")]
        term: Option<String>,
        /// Reference day for the previous-week default (today, UTC)
        #[arg(long, env = "REFERENCE_DATE", value_parser = calendar::parse_date)]
        reference_date: Option<NaiveDate>,
        /// Write the task list here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the GraphQL query bound to every task
    Query,
    /// Map one engine result and append it to a run's output
    Record {
        #[arg(long)]
        run_id: String,
        /// Task spec JSON as produced by `plan`
        #[arg(long)]
        task: PathBuf,
        /// Raw GraphQL response (`data` object or full response)
        #[arg(long)]
        result: PathBuf,
    },
    /// Merge all fetch runs into one JSON file per term
    Aggregate,
    /// Summarize a term's aggregate as markdown or CSV
    Report {
        #[arg(long)]
        term: String,
        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    let layout = DataLayout::new(&cli.data_dir);

    match cli.command {
        Commands::BuildPrograms => {
            let summary = programs::build_programs(&layout.programs_file(), &layout.programs_dir())
                .with_context(|| {
                    format!("failed to build programs from {}", layout.programs_file().display())
                })?;
            println!(
                "Built {} programs ({} new terms, {} known).",
                summary.programs.len(),
                summary.new_terms,
                summary.registry.terms().len()
            );
        }
        Commands::Plan {
            start_date,
            end_date,
            term,
            reference_date,
            out,
        } => {
            let reference = reference_date.unwrap_or_else(|| Utc::now().date_naive());
            let range = FetchRange::resolve(start_date, end_date, reference)?;
            let definitions = programs::load_programs(&layout.programs_file())?;
            let expanded = programs::expand_all(&definitions)?;
            let selected = tasks::select_programs(&expanded, term.as_deref())?;
            let specs = tasks::generate_tasks(&selected, &range);

            match out {
                Some(out) => {
                    files::write_json_atomic(&out, &specs)?;
                    println!(
                        "Planned {} tasks for {} into {}.",
                        specs.len(),
                        range.describe(),
                        out.display()
                    );
                }
                None => println!("{}", serde_json::to_string_pretty(&specs)?),
            }
        }
        Commands::Query => {
            println!("{}", tasks::SUMMARY_QUERY);
        }
        Commands::Record {
            run_id,
            task,
            result,
        } => {
            let spec: TaskSpec = files::read_json(&task)?;
            let response: Value = files::read_json(&result)?;
            let raw = match response.get("data") {
                Some(data) => data.clone(),
                None => response,
            };

            let store = FileRunStore::new(layout.fetch_process_dir());
            let handle = engine::RunHandle {
                id: run_id.clone(),
                dir: store.run_dir(&run_id),
            };
            match store.read_state(&handle).await {
                Ok(_) => {}
                Err(Error::MissingState { .. }) => {
                    store
                        .write_state(&run_id, &RunState::started(0, Utc::now()))
                        .await?;
                }
                Err(e) => return Err(e.into()),
            }

            let record = engine::record_result(&store, &run_id, &spec, &raw)
                .await
                .with_context(|| format!("task {} was not recorded", spec.id))?;
            println!(
                "Recorded {} for {} week of {} in run {}.",
                spec.username, record.term, record.week_of, run_id
            );
        }
        Commands::Aggregate => {
            let store = FileRunStore::new(layout.fetch_process_dir());
            let collected = aggregate::collect(&store).await?;
            let written = aggregate::write_aggregates(&collected, &layout.summaries_dir())?;
            println!(
                "Aggregated {} records from {} runs into {} files ({} runs skipped).",
                collected.record_count(),
                collected.runs_read,
                written.len(),
                collected.runs_skipped.len()
            );
        }
        Commands::Report { term, format, out } => {
            let path = layout.summaries_dir().join(files::term_file_name(&term)?);
            let records: Vec<ResultRecord> = files::read_json(&path)
                .with_context(|| format!("no aggregate for term {term}, run `aggregate` first"))?;

            match format {
                ReportFormat::Markdown => {
                    let report = report::build_report(&term, &records);
                    let out = out.unwrap_or_else(|| PathBuf::from(format!("{term}-report.md")));
                    std::fs::write(&out, report)?;
                    println!("Report written to {}.", out.display());
                }
                ReportFormat::Csv => {
                    let out = out.unwrap_or_else(|| PathBuf::from(format!("{term}-report.csv")));
                    let rows = report::write_csv(&records, &out)?;
                    println!("Wrote {rows} rows to {}.", out.display());
                }
            }
        }
    }

    Ok(())
}
