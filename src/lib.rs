//! Weekly contribution summaries for time-boxed cohorts.
//!
//! Programs are expanded into Monday-aligned weeks, one fetch task is
//! generated per member and week, an external engine runs the tasks, and the
//! per-run outputs are merged into one JSON file per program term.

pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod engine;
pub mod error;
pub mod files;
pub mod logging;
pub mod mapper;
pub mod models;
pub mod programs;
pub mod report;
pub mod tasks;
pub mod window;
