//! Checks for mock definition files.
//!
//! The checks mirror how the proxy reads a definition: what it would skip is
//! an error, what it would load but never use (or use surprisingly) is a
//! warning.

use crate::types::{LintIssue, LintOptions, LintResult};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;

const REQUESTS: &str = "Requests";
const VARIABLES: &str = "variables_for_response_body";

static PLACEHOLDER_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn placeholder_regex() -> Option<&'static Regex> {
    PLACEHOLDER_REGEX
        .get_or_init(|| Regex::new(r"\{([A-Za-z0-9_.\-]+)\}").ok())
        .as_ref()
}

/// Render a JSON value the way the proxy coerces it to a string.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Validate a complete definition file.
pub fn validate_mock_file(file: &Path, root: &Value, result: &mut LintResult, options: &LintOptions) {
    let Some(root) = root.as_object() else {
        result.add_issue(
            LintIssue::error("E003", "Top level must be a JSON object", file)
                .with_suggestion(format!("Wrap the entries as {{\"{REQUESTS}\": [...]}}")),
        );
        return;
    };

    let variables = validate_variables(file, root.get(VARIABLES), result, options);

    let requests = match root.get(REQUESTS) {
        Some(Value::Array(requests)) => requests,
        Some(_) => {
            result.add_issue(
                LintIssue::error("E003", format!("'{REQUESTS}' must be an array"), file)
                    .with_location(REQUESTS),
            );
            return;
        }
        None => {
            result.add_issue(
                LintIssue::error("E003", format!("Missing '{REQUESTS}' array"), file)
                    .with_suggestion(format!("Add \"{REQUESTS}\": [] with one object per mocked call")),
            );
            return;
        }
    };

    let mut used = BTreeSet::new();
    let mut accepted: Vec<(usize, String, BTreeMap<String, String>)> = Vec::new();
    for (index, entry) in requests.iter().enumerate() {
        if let Some((endpoint, params)) =
            validate_entry(file, entry, index, variables.as_ref(), &mut used, result, options)
        {
            check_shadowed(file, index, &endpoint, &params, &accepted, result);
            accepted.push((index, endpoint, params));
        }
    }

    if let Some(variables) = &variables {
        for name in variables.keys().filter(|name| !used.contains(name.as_str())) {
            result.add_issue(
                LintIssue::warning(
                    "W006",
                    format!("Variable '{name}' is not used by any response body"),
                    file,
                )
                .with_location(format!("{VARIABLES}.{name}")),
            );
        }
    }
}

fn validate_variables(
    file: &Path,
    variables: Option<&Value>,
    result: &mut LintResult,
    options: &LintOptions,
) -> Option<BTreeMap<String, String>> {
    match variables {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => {
            if options.verbose {
                report_coercions(file, map, VARIABLES, result);
            }
            Some(map.iter().map(|(k, v)| (k.clone(), render(v))).collect())
        }
        Some(_) => {
            result.add_issue(
                LintIssue::error("E006", format!("'{VARIABLES}' must be an object"), file)
                    .with_location(VARIABLES),
            );
            None
        }
    }
}

/// Validate one entry. Returns its endpoint and parameters when the proxy would load it.
pub fn validate_entry(
    file: &Path,
    entry: &Value,
    index: usize,
    variables: Option<&BTreeMap<String, String>>,
    used: &mut BTreeSet<String>,
    result: &mut LintResult,
    options: &LintOptions,
) -> Option<(String, BTreeMap<String, String>)> {
    let location = format!("{REQUESTS}[{index}]");
    let Some(entry) = entry.as_object() else {
        result.add_issue(
            LintIssue::error("E004", "Entry must be a JSON object", file).with_location(location),
        );
        return None;
    };

    let endpoint = match entry.get("endpoint") {
        Some(Value::String(endpoint)) => endpoint.clone(),
        Some(other) if !other.is_null() => {
            result.add_issue(
                LintIssue::error("E004", format!("Endpoint must be a string, got {other}"), file)
                    .with_location(format!("{location}.endpoint")),
            );
            return None;
        }
        _ => {
            result.add_issue(
                LintIssue::error("E004", "Entry has no endpoint and will be skipped", file)
                    .with_location(location)
                    .with_suggestion("Add \"endpoint\": \"/path\" (use \"\" for the root path)"),
            );
            return None;
        }
    };
    check_endpoint(file, &endpoint, &location, result);

    let params = match entry.get("mockparams") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(map)) => check_params(file, map, &location, result),
        Some(_) => {
            result.add_issue(
                LintIssue::error("E006", "'mockparams' must be an object", file)
                    .with_location(format!("{location}.mockparams")),
            );
            return None;
        }
    };

    match entry.get("response") {
        None | Some(Value::Null) => {}
        Some(Value::Object(response)) => validate_response(
            file,
            response,
            &format!("{location}.response"),
            variables,
            used,
            result,
            options,
        ),
        Some(_) => {
            result.add_issue(
                LintIssue::error("E006", "'response' must be an object", file)
                    .with_location(format!("{location}.response")),
            );
            return None;
        }
    }

    Some((endpoint, params))
}

fn check_endpoint(file: &Path, endpoint: &str, location: &str, result: &mut LintResult) {
    if endpoint == "/" {
        result.add_issue(
            LintIssue::warning(
                "W002",
                "Endpoint \"/\" never matches; the root path is matched as \"\"",
                file,
            )
            .with_location(format!("{location}.endpoint"))
            .with_suggestion("Use \"endpoint\": \"\""),
        );
    } else if !endpoint.is_empty() && !endpoint.starts_with('/') {
        result.add_issue(
            LintIssue::warning(
                "W001",
                format!("Endpoint '{endpoint}' does not start with '/' and can never match"),
                file,
            )
            .with_location(format!("{location}.endpoint"))
            .with_suggestion(format!("Use \"/{endpoint}\"")),
        );
    }
}

fn check_params(
    file: &Path,
    params: &Map<String, Value>,
    location: &str,
    result: &mut LintResult,
) -> BTreeMap<String, String> {
    for (key, value) in params {
        if !value.is_string() {
            result.add_issue(
                LintIssue::warning(
                    "W004",
                    format!("Parameter '{key}' is {value}; it is compared as the text \"{}\"", render(value)),
                    file,
                )
                .with_location(format!("{location}.mockparams.{key}")),
            );
        }
    }
    params.iter().map(|(k, v)| (k.clone(), render(v))).collect()
}

fn validate_response(
    file: &Path,
    response: &Map<String, Value>,
    location: &str,
    variables: Option<&BTreeMap<String, String>>,
    used: &mut BTreeSet<String>,
    result: &mut LintResult,
    options: &LintOptions,
) {
    let status_code = check_status(file, response.get("status-code"), location, "status-code", result);
    let status_int = check_status(file, response.get("statusInt"), location, "statusInt", result);
    if let (Some(code), Some(int)) = (status_code, status_int) {
        if code != int {
            result.add_issue(
                LintIssue::warning(
                    "W003",
                    format!("'status-code' ({code}) and 'statusInt' ({int}) disagree; {code} is used"),
                    file,
                )
                .with_location(location.to_string()),
            );
        }
    }

    match response.get("headers") {
        Some(Value::Object(headers)) if options.verbose => {
            report_coercions(file, headers, &format!("{location}.headers"), result);
        }
        None | Some(Value::Null) | Some(Value::Object(_)) => {}
        Some(_) => {
            result.add_issue(
                LintIssue::error("E006", "'headers' must be an object", file)
                    .with_location(format!("{location}.headers")),
            );
        }
    }

    let body = response.get("body").map(render).unwrap_or_default();
    let Some(regex) = placeholder_regex() else {
        return;
    };
    for captures in regex.captures_iter(&body) {
        let name = &captures[1];
        match variables {
            Some(vars) if vars.contains_key(name) => {
                used.insert(name.to_string());
            }
            _ => result.add_issue(
                LintIssue::warning(
                    "W005",
                    format!("Placeholder '{{{name}}}' has no variable and is sent verbatim"),
                    file,
                )
                .with_location(format!("{location}.body"))
                .with_suggestion(format!("Add \"{name}\" to \"{VARIABLES}\"")),
            ),
        }
    }
}

/// Status value as the proxy reads it. Unusable values are reported and yield `None`.
fn check_status(
    file: &Path,
    value: Option<&Value>,
    location: &str,
    field: &str,
    result: &mut LintResult,
) -> Option<u64> {
    let value = value.filter(|v| !v.is_null())?;
    let status = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    match status {
        Some(code) if (100..=999).contains(&code) => Some(code),
        _ => {
            result.add_issue(
                LintIssue::error(
                    "E005",
                    format!("'{field}' value {value} is not a status code between 100 and 999"),
                    file,
                )
                .with_location(format!("{location}.{field}"))
                .with_suggestion("The response falls back to 200"),
            );
            None
        }
    }
}

fn report_coercions(file: &Path, map: &Map<String, Value>, location: &str, result: &mut LintResult) {
    for (key, value) in map.iter().filter(|(_, v)| !v.is_string()) {
        result.add_issue(
            LintIssue::info(
                "I001",
                format!("'{key}' is {value}; used as the text \"{}\"", render(value)),
                file,
            )
            .with_location(format!("{location}.{key}")),
        );
    }
}

/// An entry is unreachable when an earlier entry has the same endpoint and
/// requires a subset of its parameters.
fn check_shadowed(
    file: &Path,
    index: usize,
    endpoint: &str,
    params: &BTreeMap<String, String>,
    earlier: &[(usize, String, BTreeMap<String, String>)],
    result: &mut LintResult,
) {
    let shadow = earlier.iter().find(|(_, other_endpoint, other_params)| {
        other_endpoint == endpoint
            && other_params.iter().all(|(key, value)| {
                params
                    .iter()
                    .any(|(k, v)| k.eq_ignore_ascii_case(key) && v == value)
            })
    });

    if let Some((shadow_index, _, _)) = shadow {
        result.add_issue(
            LintIssue::warning(
                "W007",
                format!(
                    "Entry can never match: {REQUESTS}[{shadow_index}] has the same endpoint and a subset of its conditions"
                ),
                file,
            )
            .with_location(format!("{REQUESTS}[{index}]"))
            .with_suggestion("Move the more specific entry first"),
        );
    }
}
