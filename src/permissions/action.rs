//! Action encoding
//!
//! Turns an action (a plain name, or a name plus parameters) into the single
//! string key rules are stored and looked up by. Parameter keys are sorted at
//! every level, so insertion order never changes the key.

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An action named by a rule or a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    /// A plain action name, e.g. `read`
    Plain(String),
    /// An action name with a parameter bag
    Parametrized(ParametrizedAction),
}

impl Action {
    /// The canonical key for this action
    pub fn key(&self) -> String {
        encode(self)
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        Action::Plain(name.to_string())
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        Action::Plain(name)
    }
}

impl From<&String> for Action {
    fn from(name: &String) -> Self {
        Action::Plain(name.clone())
    }
}

impl From<ParametrizedAction> for Action {
    fn from(action: ParametrizedAction) -> Self {
        Action::Parametrized(action)
    }
}

impl From<&Action> for Action {
    fn from(action: &Action) -> Self {
        action.clone()
    }
}

/// An action name plus parameters, e.g. `export` with `{ "format": "csv" }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParametrizedAction {
    pub name: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl ParametrizedAction {
    /// Create an action without parameters
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Map::new(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// The canonical key: `name?<sorted params>`
    pub fn key(&self) -> String {
        format!("{}?{}", self.name, encode_params(&self.params))
    }
}

/// Canonicalize an action into its lookup key
pub fn encode(action: &Action) -> String {
    match action {
        Action::Plain(name) => name.clone(),
        Action::Parametrized(action) => action.key(),
    }
}

/// Encode parameters as a query string with keys sorted at every level
///
/// Nested objects flatten to `parent[child]=v` and arrays to `parent[0]=v`.
/// Empty containers produce no pairs.
pub fn encode_params(params: &Map<String, Value>) -> String {
    let mut pairs = Vec::new();
    for (key, value) in sorted(params) {
        collect_pairs(key.to_string(), value, &mut pairs);
    }
    pairs.join("&")
}

fn sorted(map: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

fn collect_pairs(prefix: String, value: &Value, pairs: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in sorted(map) {
                collect_pairs(format!("{}[{}]", prefix, key), child, pairs);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect_pairs(format!("{}[{}]", prefix, index), child, pairs);
            }
        }
        scalar => {
            pairs.push(format!(
                "{}={}",
                percent_encode(&prefix),
                percent_encode(&scalar_to_string(scalar))
            ));
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        // containers are flattened by collect_pairs
        Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// Percent-encode everything except RFC 3986 unreserved characters
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{:02X}", byte);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_action_unchanged() {
        assert_eq!(encode(&Action::from("read")), "read");
        assert_eq!(encode(&Action::from("plugin::upload.read")), "plugin::upload.read");
    }

    #[test]
    fn test_param_order_does_not_matter() {
        let a = ParametrizedAction::new("export")
            .with_param("a", 1)
            .with_param("b", 2);
        let b = ParametrizedAction::new("export")
            .with_param("b", 2)
            .with_param("a", 1);

        assert_eq!(a.key(), "export?a=1&b=2");
        assert_eq!(encode(&a.into()), encode(&b.into()));
    }

    #[test]
    fn test_nested_params() {
        let action = ParametrizedAction::new("export")
            .with_param("filter", json!({ "z": true, "a": null }))
            .with_param("ids", json!([3, 1]));

        assert_eq!(
            action.key(),
            "export?filter%5Ba%5D=&filter%5Bz%5D=true&ids%5B0%5D=3&ids%5B1%5D=1"
        );
    }

    #[test]
    fn test_nested_param_order_does_not_matter() {
        let a: Action = serde_json::from_value(json!({
            "name": "export",
            "params": { "opts": { "x": 1, "y": "two" } }
        }))
        .unwrap();
        let b: Action = serde_json::from_value(json!({
            "name": "export",
            "params": { "opts": { "y": "two", "x": 1 } }
        }))
        .unwrap();

        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_empty_params() {
        assert_eq!(ParametrizedAction::new("export").key(), "export?");

        let action = ParametrizedAction::new("export")
            .with_param("empty", json!([]))
            .with_param("none", json!({}));
        assert_eq!(action.key(), "export?");
    }

    #[test]
    fn test_values_are_percent_encoded() {
        let action = ParametrizedAction::new("search").with_param("q", "a b&c=d");
        assert_eq!(action.key(), "search?q=a%20b%26c%3Dd");

        let action = ParametrizedAction::new("search").with_param("q", "é~");
        assert_eq!(action.key(), "search?q=%C3%A9~");
    }

    #[test]
    fn test_deserialize_untagged() {
        let plain: Action = serde_json::from_value(json!("read")).unwrap();
        assert_eq!(plain, Action::from("read"));

        let param: Action = serde_json::from_value(json!({ "name": "export" })).unwrap();
        assert!(matches!(param, Action::Parametrized(ref p) if p.params.is_empty()));
    }
}
