use std::path::{Path, PathBuf};

pub const PROGRAMS_FILE: &str = "programs.json";
pub const PROGRAMS_DIR: &str = "000-build-programs";
pub const FETCH_PROCESS_DIR: &str = "100-fetch-cohort-activity-summaries";
pub const SUMMARIES_DIR: &str = "150-build-cohort-activity-summaries";

/// Where each stage reads and writes, relative to one data root.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn programs_file(&self) -> PathBuf {
        self.root.join(PROGRAMS_FILE)
    }

    pub fn programs_dir(&self) -> PathBuf {
        self.root.join(PROGRAMS_DIR)
    }

    pub fn fetch_process_dir(&self) -> PathBuf {
        self.root.join(FETCH_PROCESS_DIR)
    }

    pub fn summaries_dir(&self) -> PathBuf {
        self.root.join(SUMMARIES_DIR)
    }
}
