//! Mock definition file format.
//!
//! ```json
//! {
//!   "Requests": [
//!     {
//!       "endpoint": "/users",
//!       "mockparams": { "call": "GetUser" },
//!       "response": {
//!         "headers": { "Content-Type": "application/json" },
//!         "status-code": 200,
//!         "body": "{\"name\": \"{userName}\"}"
//!       }
//!     }
//!   ],
//!   "variables_for_response_body": { "userName": "Ada" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::CatalogError;
use crate::extractor::render_json_value;

/// Response stored with a mock entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseTemplate {
    pub headers: BTreeMap<String, String>,
    pub status_code: Option<u16>,
    pub body: String,
}

/// One mock definition. Entries compare by content; there is no identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockEntry {
    /// Request path this entry answers, compared exactly
    pub endpoint: String,
    /// Body keys that must all be present with these values
    pub required_params: BTreeMap<String, String>,
    pub response: ResponseTemplate,
    /// Substitutions for `{name}` placeholders, shared by every entry of a file
    pub variables: BTreeMap<String, String>,
    /// File the entry was loaded from
    pub source: PathBuf,
}

#[derive(Debug, Deserialize)]
struct DefinitionFile {
    #[serde(rename = "Requests", default)]
    requests: Vec<RawEntry>,
    #[serde(rename = "variables_for_response_body", default)]
    variables: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(rename = "mockparams", default)]
    params: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    response: Option<RawResponse>,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    headers: Option<BTreeMap<String, Value>>,
    #[serde(rename = "status-code", default)]
    status_code: Option<Value>,
    #[serde(rename = "statusInt", default)]
    status_int: Option<Value>,
    #[serde(default)]
    body: Option<Value>,
}

fn stringify(map: Option<BTreeMap<String, Value>>) -> BTreeMap<String, String> {
    map.unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, render_json_value(&v)))
        .collect()
}

/// Numeric status from a number or a numeric string.
fn status_from(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl RawResponse {
    fn into_template(self, path: &Path, endpoint: &str) -> ResponseTemplate {
        // `status-code` wins; `statusInt` only fills in when it is absent
        let raw_status = self
            .status_code
            .filter(|v| !v.is_null())
            .or(self.status_int.filter(|v| !v.is_null()));
        let status_code = raw_status.as_ref().and_then(|value| {
            let status = status_from(value);
            if status.is_none() {
                warn!(
                    "Ignoring unusable status {} for endpoint '{}' in {}",
                    value,
                    endpoint,
                    path.display()
                );
            }
            status
        });

        ResponseTemplate {
            headers: stringify(self.headers),
            status_code,
            body: self.body.as_ref().map(render_json_value).unwrap_or_default(),
        }
    }
}

/// Parse the text of one definition file into entries, in file order.
pub fn parse_definitions(text: &str, path: &Path) -> Result<Vec<MockEntry>, CatalogError> {
    let file: DefinitionFile =
        serde_json::from_str(text).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    let variables = stringify(file.variables);

    let mut entries = Vec::with_capacity(file.requests.len());
    for (index, raw) in file.requests.into_iter().enumerate() {
        let Some(endpoint) = raw.endpoint else {
            warn!(
                "Skipping request #{} in {}: no endpoint",
                index,
                path.display()
            );
            continue;
        };

        let response = raw
            .response
            .map(|r| r.into_template(path, &endpoint))
            .unwrap_or_default();

        entries.push(MockEntry {
            endpoint,
            required_params: stringify(raw.params),
            response,
            variables: variables.clone(),
            source: path.to_path_buf(),
        });
    }

    Ok(entries)
}
