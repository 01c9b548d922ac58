use std::collections::BTreeMap;
use std::sync::OnceLock;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use regex::Regex;
use tracing::warn;

use super::ResponseBuilder;
use crate::catalog::MockEntry;
use crate::proxy::headers::{VALUE_TRUE, X_PROXYMOCK_MOCKED};

const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

static TEXT_SUBTYPE_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn text_subtype_regex() -> Option<&'static Regex> {
    TEXT_SUBTYPE_REGEX
        .get_or_init(|| Regex::new(r"text/([^;]+)").ok())
        .as_ref()
}

/// Content type a mocked response declares for the configured `Content-Type` value.
///
/// A `text/<subtype>` token is re-declared with UTF-8; any other value is kept.
pub fn content_type_for(declared: Option<&str>) -> String {
    let Some(declared) = declared else {
        return DEFAULT_CONTENT_TYPE.to_string();
    };

    let subtype = text_subtype_regex()
        .and_then(|re| re.captures(declared))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim());

    match subtype {
        Some(subtype) => format!("text/{subtype}; charset=utf-8"),
        None => declared.to_string(),
    }
}

/// Replace every `{name}` with `variables[name]` in one pass.
///
/// Substituted text is not scanned again and unknown placeholders stay as they are.
pub fn substitute_variables(body: &str, variables: &BTreeMap<String, String>) -> String {
    if variables.is_empty() {
        return body.to_string();
    }

    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replacement = after
            .find('}')
            .and_then(|close| variables.get(&after[..close]).map(|v| (close, v)));
        match replacement {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Build the mocked response for a matched entry.
pub fn synthesize(entry: &MockEntry) -> Response<Full<Bytes>> {
    let template = &entry.response;

    let status = match template.status_code {
        None => StatusCode::OK,
        Some(code) => StatusCode::from_u16(code).unwrap_or_else(|_| {
            warn!(
                "Invalid status code {} for endpoint '{}' in {}, answering 200",
                code,
                entry.endpoint,
                entry.source.display()
            );
            StatusCode::OK
        }),
    };

    let declared = template
        .headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .map(|(_, value)| value.as_str());

    let mut builder = ResponseBuilder::new(status)
        .header("content-type", &content_type_for(declared))
        .body(substitute_variables(&template.body, &entry.variables));

    for (name, value) in &template.headers {
        let is_content_header = name
            .get(..8)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("content-"));
        if !is_content_header {
            builder = builder.append_header(name, value);
        }
    }

    let mut response = builder.build_full();
    response
        .headers_mut()
        .insert(X_PROXYMOCK_MOCKED.clone(), VALUE_TRUE.clone());
    response
}
