//! The sample programs bundled with the crate.
//!
//! A program's name is taken from its leading `//` comment line.

use crate::compiler::{evaluate, Evaluation};
use crate::types::CompileError;
use std::sync::RwLock;
use thiserror::Error;

// Default embedded programs
const PROGRAM_TEXTS: [&str; 7] = [
    include_str!("../programs/even-a.fsm"),
    include_str!("../programs/ends-with-ab.fsm"),
    include_str!("../programs/set-operations.fsm"),
    include_str!("../programs/anbn.fsm"),
    include_str!("../programs/binary-increment.fsm"),
    include_str!("../programs/multi-tape-copy.fsm"),
    include_str!("../programs/balanced-parentheses.fsm"),
];

lazy_static::lazy_static! {
    pub static ref PROGRAMS: RwLock<Vec<Program>> = RwLock::new(Vec::new());
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgramError {
    #[error("Program '{0}' not found")]
    NotFound(String),
    #[error("Program index {0} out of range")]
    IndexOutOfRange(usize),
    #[error("Failed to acquire program lock")]
    Lock,
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// A named program source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub name: String,
    pub source: String,
}

impl Program {
    pub fn from_source(source: &str) -> Self {
        let name = source
            .lines()
            .next()
            .and_then(|line| line.trim().strip_prefix("//"))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("Untitled");

        Self {
            name: name.to_string(),
            source: source.to_string(),
        }
    }

    pub fn evaluate(&self) -> Result<Evaluation, CompileError> {
        evaluate(&self.source)
    }
}

/// A summary of a bundled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInfo {
    pub index: usize,
    pub name: String,
    /// `(name, kind)` of every declared automaton and grammar.
    pub automata: Vec<(String, String)>,
    pub test_count: usize,
    pub accepted_count: usize,
}

pub struct ProgramManager;

impl ProgramManager {
    /// Fills [`PROGRAMS`] with the embedded programs.
    pub fn load() -> Result<(), ProgramError> {
        let programs: Vec<Program> = PROGRAM_TEXTS.iter().map(|text| Program::from_source(text)).collect();

        let mut write_guard = PROGRAMS.write().map_err(|_| ProgramError::Lock)?;
        *write_guard = programs;
        Ok(())
    }

    fn with_programs<T>(f: impl FnOnce(&[Program]) -> T) -> Result<T, ProgramError> {
        let is_empty = PROGRAMS.read().map_err(|_| ProgramError::Lock)?.is_empty();
        if is_empty {
            Self::load()?;
        }

        let programs = PROGRAMS.read().map_err(|_| ProgramError::Lock)?;
        Ok(f(&programs))
    }

    /// Get the number of available programs
    pub fn get_program_count() -> usize {
        Self::with_programs(|programs| programs.len()).unwrap_or(0)
    }

    pub fn get_program_by_index(index: usize) -> Result<Program, ProgramError> {
        Self::with_programs(|programs| programs.get(index).cloned())?
            .ok_or(ProgramError::IndexOutOfRange(index))
    }

    pub fn get_program_by_name(name: &str) -> Result<Program, ProgramError> {
        Self::with_programs(|programs| programs.iter().find(|p| p.name == name).cloned())?
            .ok_or_else(|| ProgramError::NotFound(name.to_string()))
    }

    /// List all program names
    pub fn list_program_names() -> Vec<String> {
        Self::with_programs(|programs| programs.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Evaluates the program at `index` and summarizes what it declares.
    pub fn get_program_info(index: usize) -> Result<ProgramInfo, ProgramError> {
        let program = Self::get_program_by_index(index)?;
        let evaluation = program.evaluate()?;

        Ok(ProgramInfo {
            index,
            name: program.name,
            automata: evaluation
                .automata()
                .into_iter()
                .map(|(name, automaton)| (name, automaton.kind_name().to_string()))
                .collect(),
            test_count: evaluation.tests.len(),
            accepted_count: evaluation
                .tests
                .iter()
                .filter(|outcome| outcome.accepted == Some(true))
                .count(),
        })
    }

    /// Search for programs by name, ignoring case
    pub fn search_programs(query: &str) -> Vec<usize> {
        let query = query.to_lowercase();
        Self::with_programs(|programs| {
            programs
                .iter()
                .enumerate()
                .filter(|(_, program)| program.name.to_lowercase().contains(&query))
                .map(|(index, _)| index)
                .collect()
        })
        .unwrap_or_default()
    }

    /// Get the original text of a program by its index
    pub fn get_program_text_by_index(index: usize) -> Result<&'static str, ProgramError> {
        PROGRAM_TEXTS
            .get(index)
            .copied()
            .ok_or(ProgramError::IndexOutOfRange(index))
    }
}
