use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, info};

use crate::calendar;
use crate::error::{ConfigError, Result};
use crate::files;
use crate::models::{ExpandedProgram, Program};

pub const REGISTRY_FILE: &str = "programs-list.json";

pub fn load_programs(path: &Path) -> Result<Vec<Program>> {
    let programs: Vec<Program> = files::read_json(path)?;
    debug!(count = programs.len(), path = %path.display(), "Loaded program definitions");
    Ok(programs)
}

/// Validates the program's dates and attaches its week starts.
pub fn expand_program(program: &Program) -> std::result::Result<ExpandedProgram, ConfigError> {
    if !calendar::is_monday(program.start_date) {
        return Err(ConfigError::StartNotMonday {
            term: program.term.clone(),
            date: program.start_date,
        });
    }
    if !calendar::is_sunday(program.end_date) {
        return Err(ConfigError::EndNotSunday {
            term: program.term.clone(),
            date: program.end_date,
        });
    }
    files::term_file_name(&program.term)?;

    Ok(ExpandedProgram {
        program: program.clone(),
        weeks: calendar::week_starts(program.start_date, program.end_date),
    })
}

pub fn expand_all(programs: &[Program]) -> std::result::Result<Vec<ExpandedProgram>, ConfigError> {
    programs.iter().map(expand_program).collect()
}

/// Every program term ever built, kept even after its definition is removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramRegistry {
    terms: BTreeSet<String>,
}

impl ProgramRegistry {
    /// A missing registry file is an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No program registry yet");
            return Ok(Self::default());
        }
        let terms: Vec<String> = files::read_json(path)?;
        Ok(Self {
            terms: terms.into_iter().collect(),
        })
    }

    pub fn merge<I, S>(&mut self, terms: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.terms.len();
        self.terms.extend(terms.into_iter().map(Into::into));
        self.terms.len() - before
    }

    /// Sorted by byte order, so case-sensitive.
    pub fn terms(&self) -> Vec<&str> {
        self.terms.iter().map(String::as_str).collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        files::write_json_atomic(path, &self.terms())
    }
}

#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub programs: Vec<ExpandedProgram>,
    pub new_terms: usize,
    pub registry: ProgramRegistry,
}

/// Expands every program, then writes one document per program and the
/// merged registry. Nothing is written if any program is invalid.
pub fn build_programs(source: &Path, out_dir: &Path) -> Result<BuildSummary> {
    let programs = load_programs(source)?;
    let expanded = expand_all(&programs)?;

    for program in &expanded {
        let file_name = files::term_file_name(&program.program.term)?;
        files::write_json_atomic(&out_dir.join(file_name), program)?;
        info!(
            term = %program.program.term,
            weeks = program.weeks.len(),
            members = program.program.cohort.len(),
            "Built program"
        );
    }

    let registry_path = out_dir.join(REGISTRY_FILE);
    let mut registry = ProgramRegistry::load(&registry_path)?;
    let new_terms = registry.merge(expanded.iter().map(|p| p.program.term.clone()));
    registry.save(&registry_path)?;

    Ok(BuildSummary {
        programs: expanded,
        new_terms,
        registry,
    })
}
