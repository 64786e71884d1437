//! Permission rules
//!
//! - `PermissionRule` - a declarative rule as supplied by a rule source
//! - `CompiledRule` - a rule after action encoding and condition compilation

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::Action;
use super::condition::Condition;

/// Subject string that matches every subject
pub const WILDCARD_SUBJECT: &str = "all";

/// A permission rule as supplied by a rule source
///
/// ```ignore
/// let rule = PermissionRule::can("update", "Article")
///     .with_fields(["title", "body"])
///     .with_condition(json!({ "authorId": { "$eq": 1 } }));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionRule {
    /// Plain or parametrized action
    pub action: Action,
    /// Resource type (None = all subjects)
    #[serde(default)]
    pub subject: Option<String>,
    /// Fields the rule is restricted to (None = unrestricted)
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    /// Condition tree evaluated against records
    #[serde(default)]
    pub condition: Option<Value>,
    /// A "cannot" rule
    #[serde(default)]
    pub inverted: bool,
}

impl PermissionRule {
    /// Create a rule granting `action` on `subject`
    pub fn can(action: impl Into<Action>, subject: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            subject: Some(subject.into()),
            fields: None,
            condition: None,
            inverted: false,
        }
    }

    /// Create a rule revoking `action` on `subject`
    pub fn cannot(action: impl Into<Action>, subject: impl Into<String>) -> Self {
        Self {
            inverted: true,
            ..Self::can(action, subject)
        }
    }

    /// Create a rule granting `action` on every subject
    pub fn can_all(action: impl Into<Action>) -> Self {
        Self {
            action: action.into(),
            subject: None,
            fields: None,
            condition: None,
            inverted: false,
        }
    }

    /// Restrict the rule to the given fields
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Attach a condition tree
    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// The subject a compiled rule applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// Every subject
    All,
    /// A single resource type
    Named(String),
}

impl Subject {
    /// Build from an optional subject name; absent or `"all"` is the wildcard
    pub fn from_option(subject: Option<&str>) -> Self {
        match subject {
            None | Some(WILDCARD_SUBJECT) => Subject::All,
            Some(name) => Subject::Named(name.to_string()),
        }
    }

    /// Check whether a queried subject is covered
    pub fn covers(&self, subject: &str) -> bool {
        match self {
            Subject::All => true,
            Subject::Named(name) => name == subject,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Subject::All => WILDCARD_SUBJECT,
            Subject::Named(name) => name,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule stored in an `Ability`
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub(crate) action: String,
    pub(crate) subject: Subject,
    pub(crate) fields: Option<Vec<String>>,
    pub(crate) condition: Option<Arc<Value>>,
    pub(crate) compiled: Option<Condition>,
    pub(crate) inverted: bool,
    pub(crate) index: usize,
}

impl CompiledRule {
    /// Canonical action key
    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn fields(&self) -> Option<&[String]> {
        self.fields.as_deref()
    }

    /// The condition tree, for callers that translate it into a query filter
    pub fn condition(&self) -> Option<&Value> {
        self.condition.as_deref()
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Position in the rule list
    pub fn index(&self) -> usize {
        self.index
    }

    /// Check whether this rule applies to the action key and subject
    pub fn applies_to(&self, action: &str, subject: &str) -> bool {
        self.action == action && self.subject.covers(subject)
    }

    /// Evaluate the condition against a record (no condition = always)
    pub fn matches_record(&self, record: &Value) -> bool {
        match &self.compiled {
            Some(condition) => condition.matches(record),
            None => true,
        }
    }

    /// Check whether the rule covers `field` (no field requested = yes)
    pub fn covers_field(&self, field: Option<&str>) -> bool {
        match (&self.fields, field) {
            (Some(fields), Some(field)) => fields.iter().any(|f| f == field),
            _ => true,
        }
    }

    /// The decision this rule gives for a field
    pub(crate) fn decide(&self, field: Option<&str>) -> bool {
        !self.inverted && self.covers_field(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_minimal_rule() {
        let rule: PermissionRule = serde_json::from_value(json!({ "action": "read" })).unwrap();
        assert_eq!(rule, PermissionRule::can_all("read"));
    }

    #[test]
    fn test_deserialize_full_rule() {
        let rule: PermissionRule = serde_json::from_value(json!({
            "action": { "name": "export", "params": { "format": "csv" } },
            "subject": "Article",
            "fields": ["title"],
            "condition": { "authorId": 1 },
            "inverted": true
        }))
        .unwrap();

        assert!(rule.inverted);
        assert_eq!(rule.subject.as_deref(), Some("Article"));
        assert_eq!(rule.fields, Some(vec!["title".to_string()]));
        assert_eq!(rule.action.key(), "export?format=csv");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let typo = serde_json::from_value::<PermissionRule>(json!({
            "action": "delete",
            "subject": "Article",
            "invertd": true
        }));
        assert!(typo.is_err());

        let nested = serde_json::from_value::<PermissionRule>(json!({
            "action": "read",
            "properties": { "fields": ["title"] }
        }));
        assert!(nested.is_err());

        let action = serde_json::from_value::<PermissionRule>(json!({
            "action": { "name": "export", "parms": { "format": "csv" } }
        }));
        assert!(action.is_err());
    }

    #[test]
    fn test_null_subject_is_absent() {
        let rule: PermissionRule =
            serde_json::from_value(json!({ "action": "read", "subject": null })).unwrap();
        assert_eq!(rule.subject, None);
    }

    #[test]
    fn test_cannot_constructor() {
        let rule = PermissionRule::cannot("delete", "Article").with_fields(["body"]);
        assert!(rule.inverted);
        assert_eq!(rule.fields, Some(vec!["body".to_string()]));
    }

    #[test]
    fn test_subject_wildcard() {
        assert_eq!(Subject::from_option(None), Subject::All);
        assert_eq!(Subject::from_option(Some("all")), Subject::All);
        assert!(Subject::All.covers("Article"));

        let named = Subject::from_option(Some("Article"));
        assert!(named.covers("Article"));
        assert!(!named.covers("Comment"));
        assert_eq!(named.to_string(), "Article");
    }
}
