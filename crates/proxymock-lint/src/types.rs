//! Issue and result types.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// How bad an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The proxy will skip or misread the definition.
    Error,
    /// The definition loads but probably does not do what was meant.
    Warning,
    /// Loads as intended after a conversion.
    Info,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// One finding in a mock definition file.
#[derive(Debug, Clone, Serialize)]
pub struct LintIssue {
    pub severity: Severity,
    /// Stable code such as `E004` or `W006`
    pub code: String,
    pub message: String,
    #[serde(serialize_with = "serialize_path")]
    pub file: PathBuf,
    /// Position in the file, e.g. `Requests[2].mockparams.call`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

fn serialize_path<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&path.to_string_lossy())
}

impl LintIssue {
    fn new(
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        file: &Path,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            file: file.to_path_buf(),
            location: None,
            suggestion: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>, file: &Path) -> Self {
        Self::new(Severity::Error, code, message, file)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>, file: &Path) -> Self {
        Self::new(Severity::Warning, code, message, file)
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>, file: &Path) -> Self {
        Self::new(Severity::Info, code, message, file)
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Issues collected over one or more files.
#[derive(Debug, Default, Serialize)]
pub struct LintResult {
    pub issues: Vec<LintIssue>,
    pub files_checked: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl LintResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issue(&mut self, issue: LintIssue) {
        match issue.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Info => {}
        }
        self.issues.push(issue);
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings > 0
    }

    /// No errors, and no warnings either when `strict` is set.
    pub fn passes(&self, strict: bool) -> bool {
        !self.has_errors() && !(strict && self.has_warnings())
    }

    /// Codes of all issues, in report order. Handy in tests.
    pub fn codes(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.code.as_str()).collect()
    }

    pub fn merge(&mut self, other: LintResult) {
        self.issues.extend(other.issues);
        self.files_checked += other.files_checked;
        self.errors += other.errors;
        self.warnings += other.warnings;
    }

    /// Drop everything below `min` (counts are kept).
    pub fn retain_at_least(&mut self, min: Severity) {
        self.issues.retain(|issue| issue.severity <= min);
    }
}

/// Options for validation.
#[derive(Debug, Clone, Default)]
pub struct LintOptions {
    /// Also report value conversions the proxy performs silently
    pub verbose: bool,
}
