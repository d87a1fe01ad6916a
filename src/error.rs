use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Bad static input. Always aborts the stage.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("program {term}: start date {date} should be a Monday, update programs.json")]
    StartNotMonday { term: String, date: NaiveDate },

    #[error("program {term}: end date {date} should be a Sunday, update programs.json")]
    EndNotSunday { term: String, date: NaiveDate },

    #[error("START_DATE and END_DATE must be passed together (start: {start:?}, end: {end:?})")]
    PartialRange {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },

    #[error("START_DATE {0} should be a Monday")]
    RangeStartNotMonday(NaiveDate),

    #[error("END_DATE {0} should be a Sunday")]
    RangeEndNotSunday(NaiveDate),

    #[error("START_DATE {start} is after END_DATE {end}, the range covers no weeks")]
    EmptyRange { start: NaiveDate, end: NaiveDate },

    #[error("program term with key {0} not found")]
    UnknownTerm(String),

    #[error("program term {0:?} cannot be used as a file name")]
    InvalidTerm(String),

    #[error("invalid date {value:?}, expected YYYY-MM-DD")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Failure of a single fetch task. Siblings keep running.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error(
        "{collection} of {username} ({term}, week of {week_of}) has more pages for {repository}; \
         narrow the fetch window"
    )]
    Truncated {
        username: String,
        term: String,
        week_of: String,
        collection: &'static str,
        repository: String,
    },

    #[error("no user payload for {username} ({term}, week of {week_of})")]
    MissingUser {
        username: String,
        term: String,
        week_of: String,
    },

    #[error("malformed result for {username} ({term}, week of {week_of}): {source}")]
    Malformed {
        username: String,
        term: String,
        week_of: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("engine failed for {username} ({term}, week of {week_of}): {message}")]
    Engine {
        username: String,
        term: String,
        week_of: String,
        message: String,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("run {run} has no readable process state: {reason}")]
    MissingState { run: String, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json {
            path: path.into(),
            source,
        }
    }
}
