//! Linting library for proxymock mock definition files.
//!
//! A definition file (`MockedRequests/<service>*.json`) is checked for what
//! the proxy would skip, misread or never reach, before it is dropped into
//! the mock directory of a running proxy.
//!
//! ```no_run
//! use proxymock_lint::{lint_path, LintOptions};
//! use std::path::Path;
//!
//! let result = lint_path(Path::new("MockedRequests"), &LintOptions::default());
//! if result.has_errors() {
//!     eprintln!("Found {} errors", result.errors);
//! }
//! ```

mod types;
mod validator;

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

pub use types::{LintIssue, LintOptions, LintResult, Severity};
pub use validator::{validate_entry, validate_mock_file};

/// Why a file could not be checked at all.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

impl LoadError {
    fn code(&self) -> &'static str {
        match self {
            LoadError::Read(_) => "E001",
            LoadError::Parse(_) => "E002",
        }
    }

    fn into_issue(self, file: &Path) -> LintIssue {
        let issue = LintIssue::error(self.code(), self.to_string(), file);
        match self {
            LoadError::Parse(_) => issue.with_suggestion("Check for JSON syntax errors"),
            LoadError::Read(_) => issue,
        }
    }
}

fn load(path: &Path) -> Result<Value, LoadError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Lint one definition file.
pub fn lint_file(path: &Path, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();
    result.files_checked = 1;

    match load(path) {
        Ok(value) => validate_mock_file(path, &value, &mut result, options),
        Err(e) => result.add_issue(e.into_issue(path)),
    }
    result
}

/// `*.json` files directly inside `dir`, sorted by name.
pub fn definition_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

/// Lint every definition file in a directory (non-recursive).
pub fn lint_directory(dir: &Path, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();

    match definition_files(dir) {
        Ok(files) => {
            for file in files {
                result.merge(lint_file(&file, options));
            }
        }
        Err(e) => result.add_issue(LintIssue::error(
            "E001",
            format!("Failed to read directory: {e}"),
            dir,
        )),
    }
    result
}

/// Lint a file or every definition file of a directory.
pub fn lint_path(path: &Path, options: &LintOptions) -> LintResult {
    if path.is_dir() {
        lint_directory(path, options)
    } else {
        lint_file(path, options)
    }
}

/// Lint definition text held in memory.
pub fn lint_json(json: &str, source_name: &str, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();
    result.files_checked = 1;
    let path = Path::new(source_name);

    match serde_json::from_str::<Value>(json) {
        Ok(value) => validate_mock_file(path, &value, &mut result, options),
        Err(e) => result.add_issue(LoadError::from(e).into_issue(path)),
    }
    result
}
