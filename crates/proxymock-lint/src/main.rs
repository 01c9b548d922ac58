//! proxymock mock definition linter CLI
//!
//! Usage:
//!   proxymock-lint <directory_or_file> [OPTIONS]

use clap::{Parser, ValueEnum};
use proxymock_lint::{lint_path, LintIssue, LintOptions, LintResult, Severity};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// proxymock mock definition linter
#[derive(Parser, Debug)]
#[command(name = "proxymock-lint")]
#[command(
    author,
    version,
    about = "Validate mock definition files before handing them to proxymock"
)]
struct Args {
    /// Mock definition file, or a directory of them
    #[arg(required = true)]
    path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Only show errors (hide warnings)
    #[arg(short = 'e', long)]
    errors_only: bool,

    /// Also report values the proxy converts to text
    #[arg(short, long)]
    verbose: bool,

    /// Strict mode - treat warnings as errors
    #[arg(short, long)]
    strict: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let options = LintOptions {
        verbose: args.verbose,
    };

    let mut result = lint_path(&args.path, &options);
    if args.errors_only {
        result.retain_at_least(Severity::Error);
    }

    match args.output {
        OutputFormat::Json => print_results_json(&result),
        OutputFormat::Text => print_results(&result, &args.path),
    }

    if result.passes(args.strict) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_results_json(result: &LintResult) {
    match serde_json::to_string_pretty(result) {
        Ok(output) => println!("{output}"),
        Err(e) => eprintln!("Failed to serialize results: {e}"),
    }
}

fn print_results(result: &LintResult, path: &Path) {
    println!("{BOLD}{CYAN}proxymock mock linter{RESET}");
    println!("{DIM}━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━{RESET}");
    println!("{DIM}Scanning:{RESET} {CYAN}{}{RESET}", path.display());
    println!();

    if result.files_checked == 0 {
        println!("{YELLOW}Warning:{RESET} No JSON files found");
    } else if result.issues.is_empty() {
        println!("{GREEN}{BOLD}No issues found!{RESET}");
    }

    let mut issues_by_file: BTreeMap<&Path, Vec<&LintIssue>> = BTreeMap::new();
    for issue in &result.issues {
        issues_by_file
            .entry(issue.file.as_path())
            .or_default()
            .push(issue);
    }

    for (file, issues) in issues_by_file {
        let file_errors = issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count();
        let file_warnings = issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count();

        let status_indicator = match (file_errors, file_warnings) {
            (0, 0) => format!("{CYAN}INFO{RESET}"),
            (0, _) => format!("{YELLOW}WARN{RESET}"),
            _ => format!("{RED}FAIL{RESET}"),
        };
        let file_name = file.file_name().unwrap_or_default().to_string_lossy();
        println!(
            "{status_indicator} {BOLD}{CYAN}{file_name}{RESET} {DIM}({file_errors} error(s), {file_warnings} warning(s)){RESET}"
        );

        for issue in issues {
            let color = severity_color(issue.severity);
            let location = issue
                .location
                .as_ref()
                .map(|l| format!("{DIM}[{RESET}{CYAN}{l}{RESET}{DIM}]{RESET} "))
                .unwrap_or_default();

            println!(
                "  {color}|{RESET} {location}{BOLD}{color}{}{RESET}: {} {DIM}({}){RESET}",
                issue.severity.label(),
                issue.message,
                issue.code
            );
            if let Some(suggestion) = &issue.suggestion {
                println!("  {color}|{RESET}   {GREEN}-> {suggestion}{RESET}");
            }
        }
        println!();
    }

    println!("{DIM}━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━{RESET}");
    println!(
        "  {DIM}Files checked:{RESET} {BOLD}{}{RESET}",
        result.files_checked
    );
    let error_color = if result.errors > 0 { RED } else { GREEN };
    println!(
        "  {error_color}Errors:{RESET}    {BOLD}{error_color}{}{RESET}",
        result.errors
    );
    let warning_color = if result.warnings > 0 { YELLOW } else { DIM };
    println!(
        "  {warning_color}Warnings:{RESET}  {BOLD}{}{RESET}",
        result.warnings
    );
    println!();

    if result.errors == 0 && result.warnings == 0 {
        println!("{GREEN}{BOLD}All checks passed!{RESET}");
    } else if result.errors == 0 {
        println!("{YELLOW}{BOLD}Passed with warnings{RESET}");
    } else {
        println!("{RED}{BOLD}Linting failed with errors{RESET}");
    }
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
        Severity::Info => CYAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args =
            Args::try_parse_from(["proxymock-lint", "MockedRequests", "-o", "json", "-s", "-e"])
                .unwrap();
        assert_eq!(args.path, PathBuf::from("MockedRequests"));
        assert_eq!(args.output, OutputFormat::Json);
        assert!(args.strict);
        assert!(args.errors_only);
        assert!(!args.verbose);
    }

    #[test]
    fn test_path_is_required() {
        assert!(Args::try_parse_from(["proxymock-lint"]).is_err());
    }
}
