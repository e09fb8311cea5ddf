//! This module provides the `ProgramLoader` struct, responsible for loading automaton
//! programs from files, strings and directories of `.fsm` files.

use crate::compiler::{Compiler, Evaluation};
use crate::types::CompileError;
use std::fs;
use std::path::{Path, PathBuf};

/// The extension of program files.
pub const PROGRAM_EXTENSION: &str = "fsm";

/// `ProgramLoader` is a utility struct for loading programs.
/// It provides methods to load programs from individual files, from string content,
/// and to discover and load all `.fsm` files within a specified directory.
pub struct ProgramLoader;

impl ProgramLoader {
    /// Loads and evaluates a single program from the specified file path.
    ///
    /// # Arguments
    ///
    /// * `path` - A reference to the `Path` of the `.fsm` file to load.
    ///
    /// # Returns
    ///
    /// * `Ok(Evaluation)` if the file is successfully read and evaluated.
    /// * `Err(CompileError::FileError)` if the file cannot be read.
    /// * Any other `CompileError` if the content is not a valid program.
    pub fn load_program(path: &Path) -> Result<Evaluation, CompileError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CompileError::FileError(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        log::debug!("Loading {}", path.display());
        Self::load_program_from_string(&content)
    }

    /// Loads a single program from the provided string content.
    pub fn load_program_from_string(content: &str) -> Result<Evaluation, CompileError> {
        Compiler::default().evaluate(content)
    }

    /// Loads all program files (`.fsm` extension) from a given directory.
    ///
    /// Directories and files with other extensions are skipped.
    ///
    /// # Returns
    ///
    /// * One result per program file: its path and evaluation, or the error that stopped it.
    pub fn load_programs(directory: &Path) -> Vec<Result<(PathBuf, Evaluation), CompileError>> {
        if !directory.exists() {
            return vec![Err(CompileError::FileError(format!(
                "Directory {} does not exist",
                directory.display()
            )))];
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![Err(CompileError::FileError(format!(
                    "Failed to read directory {}: {}",
                    directory.display(),
                    e
                )))]
            }
        };

        let mut paths = Vec::new();
        let mut results = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(e) => results.push(Err(CompileError::FileError(format!(
                    "Failed to read directory entry: {}",
                    e
                )))),
            }
        }

        paths.retain(|path| {
            !path.is_dir() && path.extension().is_some_and(|ext| ext == PROGRAM_EXTENSION)
        });
        paths.sort();

        results.extend(
            paths
                .into_iter()
                .map(|path| Self::load_program(&path).map(|evaluation| (path, evaluation))),
        );
        results
    }
}
