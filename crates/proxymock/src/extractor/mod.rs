//! Key lookup inside request bodies.
//!
//! A body is tried as JSON first, then as XML. Anything else has no values.
//! Both formats are walked by the same depth-first traversal over a small
//! node abstraction; each format only supplies its node type and a match
//! predicate.
//!
//! # Module Structure
//!
//! - `json` - JSON nodes (`serde_json`)
//! - `xml` - XML nodes (`sxd-document`)

mod json;
mod xml;

use bytes::Bytes;
use tracing::{error, warn};

pub(crate) use json::render as render_json_value;

/// Largest body, in bytes, parsed for key lookup unless configured otherwise.
pub const DEFAULT_MAX_INSPECTED_BYTES: usize = 64 * 1024;

/// Document format a value was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Xml,
}

/// A value stored under the searched key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub value: String,
    pub format: Format,
}

impl Found {
    fn new(value: impl Into<String>, format: Format) -> Self {
        Self {
            value: value.into(),
            format,
        }
    }

    /// Compare with an expected value: exact for JSON, ASCII case-insensitive for XML.
    pub fn matches(&self, expected: &str) -> bool {
        match self.format {
            Format::Json => self.value == expected,
            Format::Xml => self.value.eq_ignore_ascii_case(expected),
        }
    }
}

/// A tree node the traversal can descend into.
pub(crate) trait Node: Sized {
    fn children(&self) -> Vec<Self>;
}

/// Pre-order depth-first walk collecting whatever `visit` yields.
pub(crate) fn walk<N, T, F>(root: N, mut visit: F) -> Vec<T>
where
    N: Node,
    F: FnMut(&N) -> Option<T>,
{
    let mut found = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if let Some(value) = visit(&node) {
            found.push(value);
        }
        let mut children = node.children();
        children.reverse();
        stack.extend(children);
    }
    found
}

/// Every value stored under `key` (ASCII case-insensitive), in document order.
pub fn find_all(body: &str, key: &str) -> Vec<Found> {
    let body = body.trim();
    if body.is_empty() {
        return Vec::new();
    }

    if let Some(values) = json::find_all(body, key) {
        return values
            .into_iter()
            .map(|v| Found::new(v, Format::Json))
            .collect();
    }

    if let Some(values) = xml::find_all(body, key) {
        return values
            .into_iter()
            .map(|v| Found::new(v, Format::Xml))
            .collect();
    }

    Vec::new()
}

/// First value stored under `key`.
pub fn find_first(body: &str, key: &str) -> Option<String> {
    find_all(body, key).into_iter().next().map(|f| f.value)
}

/// True when some value stored under `key` equals `expected`.
pub fn contains(body: &str, key: &str, expected: &str) -> bool {
    find_all(body, key).iter().any(|f| f.matches(expected))
}

/// Runs key lookups over request bodies on the blocking pool.
///
/// XML parsing cost grows faster than the body, so bodies above the limit
/// are looked up as if they were empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyInspector {
    limit: usize,
}

impl Default for BodyInspector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INSPECTED_BYTES)
    }
}

impl BodyInspector {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Apply `lookup` to the body text. A failed lookup task yields `T::default()`.
    pub async fn inspect<T, F>(&self, body: Bytes, lookup: F) -> T
    where
        T: Default + Send + 'static,
        F: FnOnce(&str) -> T + Send + 'static,
    {
        if body.len() > self.limit {
            warn!(
                "Body of {} bytes exceeds the inspection limit of {} bytes, not parsed",
                body.len(),
                self.limit
            );
            return lookup("");
        }
        if body.is_empty() {
            return lookup("");
        }

        let task = tokio::task::spawn_blocking(move || lookup(&String::from_utf8_lossy(&body)));
        match task.await {
            Ok(value) => value,
            Err(e) => {
                error!("Body inspection task failed: {}", e);
                T::default()
            }
        }
    }
}
