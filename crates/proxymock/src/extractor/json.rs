use serde_json::{Map, Value};

use super::{walk, Node};

#[derive(Clone, Copy)]
pub(crate) enum JsonNode<'a> {
    Object(&'a Map<String, Value>),
    Array(&'a [Value]),
    Property(&'a str, &'a Value),
    Scalar,
}

impl<'a> JsonNode<'a> {
    fn of(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => JsonNode::Object(map),
            Value::Array(items) => JsonNode::Array(items),
            _ => JsonNode::Scalar,
        }
    }
}

impl Node for JsonNode<'_> {
    fn children(&self) -> Vec<Self> {
        match *self {
            JsonNode::Object(map) => map
                .iter()
                .map(|(name, value)| JsonNode::Property(name.as_str(), value))
                .collect(),
            JsonNode::Array(items) => items.iter().map(JsonNode::of).collect(),
            JsonNode::Property(_, value) => vec![JsonNode::of(value)],
            JsonNode::Scalar => Vec::new(),
        }
    }
}

/// Text form of a matched value
pub(crate) fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `None` when the body is not a JSON object or array.
pub(super) fn find_all(body: &str, key: &str) -> Option<Vec<String>> {
    let document: Value = serde_json::from_str(body).ok()?;
    if !matches!(document, Value::Object(_) | Value::Array(_)) {
        return None;
    }

    Some(walk(JsonNode::of(&document), |node| match node {
        JsonNode::Property(name, value) if name.eq_ignore_ascii_case(key) => Some(render(value)),
        _ => None,
    }))
}
