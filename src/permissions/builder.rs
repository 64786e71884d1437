//! Ability builder
//!
//! Accumulates permission rules in order, then freezes them into an
//! [`Ability`]. Order matters: later rules take precedence over earlier ones
//! for the same action and subject.

use std::sync::Arc;

use serde_json::Value;

use crate::core::{AbilityError, AbilityResult, EngineConfig};

use super::ability::Ability;
use super::action::{encode, Action};
use super::condition::ConditionMatcher;
use super::rule::{CompiledRule, PermissionRule, Subject};

/// Builder for an [`Ability`]
///
/// # Example
///
/// ```ignore
/// let mut builder = AbilityBuilder::new();
/// builder
///     .can("read", "Article")
///     .add(PermissionRule::can("update", "Article")
///         .with_condition(json!({ "authorId": { "$eq": 1 } })))
///     .cannot("delete", "Article");
///
/// let ability = builder.build();
/// assert!(ability.can("read", "Article", None));
/// ```
#[derive(Debug, Clone, Default)]
pub struct AbilityBuilder {
    rules: Vec<CompiledRule>,
    matcher: ConditionMatcher,
}

impl AbilityBuilder {
    /// Create an empty builder with the default condition depth limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty builder using a validated engine configuration
    pub fn with_config(config: &EngineConfig) -> AbilityResult<Self> {
        config.validate()?;
        Ok(Self {
            rules: Vec::new(),
            matcher: ConditionMatcher::new(config.max_condition_depth),
        })
    }

    /// Create a builder from a JSON rule source (an array of rules)
    pub fn from_json_str(source: &str) -> AbilityResult<Self> {
        let value: Value = serde_json::from_str(source)?;
        let mut builder = Self::new();
        builder.extend_from_json(&value)?;
        Ok(builder)
    }

    /// Add a rule
    pub fn add(&mut self, rule: PermissionRule) -> &mut Self {
        let PermissionRule {
            action,
            subject,
            fields,
            condition,
            inverted,
        } = rule;

        let condition = match condition {
            Some(tree @ Value::Object(_)) => Some(Arc::new(tree)),
            Some(other) => {
                tracing::debug!(
                    action = %encode(&action),
                    kind = value_kind(&other),
                    "dropping non-object condition"
                );
                None
            }
            None => None,
        };
        let compiled = condition.as_deref().map(|tree| self.matcher.compile(tree));

        let compiled_rule = CompiledRule {
            action: encode(&action),
            subject: Subject::from_option(subject.as_deref()),
            fields,
            condition,
            compiled,
            inverted,
            index: self.rules.len(),
        };
        tracing::trace!(
            action = compiled_rule.action.as_str(),
            subject = %compiled_rule.subject,
            inverted,
            "added permission rule"
        );
        self.rules.push(compiled_rule);
        self
    }

    /// Grant `action` on `subject` without conditions
    pub fn can(&mut self, action: impl Into<Action>, subject: impl Into<String>) -> &mut Self {
        self.add(PermissionRule::can(action, subject))
    }

    /// Revoke `action` on `subject` without conditions
    pub fn cannot(&mut self, action: impl Into<Action>, subject: impl Into<String>) -> &mut Self {
        self.add(PermissionRule::cannot(action, subject))
    }

    /// Add one rule-shaped JSON value
    ///
    /// A value that is not a valid permission rule is rejected.
    pub fn add_value(&mut self, value: &Value) -> AbilityResult<&mut Self> {
        let rule = parse_rule(self.rules.len(), value)?;
        Ok(self.add(rule))
    }

    /// Add every rule of a JSON rule source
    ///
    /// The source must be an array. Nothing is added unless every element is
    /// a valid rule.
    pub fn extend_from_json(&mut self, source: &Value) -> AbilityResult<&mut Self> {
        let Value::Array(items) = source else {
            return Err(AbilityError::InvalidRuleSource(format!(
                "expected an array of rules, found {}",
                value_kind(source)
            )));
        };

        let rules = items
            .iter()
            .enumerate()
            .map(|(offset, item)| parse_rule(self.rules.len() + offset, item))
            .collect::<AbilityResult<Vec<_>>>()?;

        for rule in rules {
            self.add(rule);
        }
        Ok(self)
    }

    /// Freeze the current rules into an ability
    ///
    /// The builder can keep accepting rules afterwards; they never affect an
    /// ability that was already built.
    pub fn build(&self) -> Ability {
        tracing::debug!(rules = self.rules.len(), "building ability");
        Ability::new(Arc::from(self.rules.as_slice()), self.matcher)
    }

    /// Number of rules added so far
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if no rules were added
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn parse_rule(index: usize, value: &Value) -> AbilityResult<PermissionRule> {
    serde_json::from_value(value.clone())
        .map_err(|err| AbilityError::rule_rejected(index, err.to_string()))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::ParametrizedAction;
    use serde_json::json;

    #[test]
    fn test_subject_defaults_to_wildcard() {
        let mut builder = AbilityBuilder::new();
        builder.add(PermissionRule::can_all("read"));

        let ability = builder.build();
        assert_eq!(ability.rules()[0].subject(), &Subject::All);
    }

    #[test]
    fn test_non_object_condition_is_dropped() {
        let mut builder = AbilityBuilder::new();
        builder
            .add(PermissionRule::can("read", "Article").with_condition(json!("authorId == 1")))
            .add(PermissionRule::can("read", "Comment").with_condition(json!([1, 2])))
            .add(PermissionRule::can("read", "Tag").with_condition(json!(true)));

        let ability = builder.build();
        assert!(ability.rules().iter().all(|rule| rule.condition().is_none()));
        assert!(ability.can_on_record("read", "Article", &json!({ "authorId": 2 }), None));
    }

    #[test]
    fn test_action_is_encoded() {
        let mut builder = AbilityBuilder::new();
        builder.add(PermissionRule::can(
            ParametrizedAction::new("export")
                .with_param("b", 2)
                .with_param("a", 1),
            "Article",
        ));

        let ability = builder.build();
        assert_eq!(ability.rules()[0].action(), "export?a=1&b=2");
    }

    #[test]
    fn test_build_is_a_snapshot() {
        let mut builder = AbilityBuilder::new();
        builder.can("read", "Article");
        let ability = builder.build();

        builder.cannot("read", "Article").can("delete", "Article");

        assert_eq!(ability.len(), 1);
        assert!(ability.can("read", "Article", None));
        assert!(!ability.can("delete", "Article", None));
        assert_eq!(builder.build().len(), 3);
    }

    #[test]
    fn test_insertion_index() {
        let mut builder = AbilityBuilder::new();
        builder.can("read", "Article").can("update", "Article");

        let ability = builder.build();
        let indexes: Vec<_> = ability.rules().iter().map(|r| r.index()).collect();
        assert_eq!(indexes, vec![0, 1]);
    }

    #[test]
    fn test_from_json_str() {
        let builder = AbilityBuilder::from_json_str(
            r#"[
                { "action": "read", "subject": "Article" },
                { "action": "read", "subject": "Article", "inverted": true }
            ]"#,
        )
        .unwrap();

        assert_eq!(builder.len(), 2);
        assert!(!builder.build().can("read", "Article", None));
    }

    #[test]
    fn test_demo_rule_set() {
        let builder = AbilityBuilder::from_json_str(include_str!("../../demos/rules.json")).unwrap();
        let record: Value = serde_json::from_str(include_str!("../../demos/record.json")).unwrap();
        let ability = builder.build();

        assert!(ability.can("read", "Article", None));
        assert!(!ability.can("read", "Secret", None));
        assert!(ability.can_on_record("update", "Article", &record, Some("title")));
        assert!(ability.can_on_record("publish", "Article", &record, None));

        let export = ParametrizedAction::new("export")
            .with_param("limit", 100)
            .with_param("format", "csv");
        assert!(ability.can(export, "Article", None));
    }

    #[test]
    fn test_invalid_rule_source() {
        let mut builder = AbilityBuilder::new();
        let err = builder.extend_from_json(&json!({ "action": "read" })).unwrap_err();
        assert!(matches!(err, AbilityError::InvalidRuleSource(_)));
    }

    #[test]
    fn test_rule_rejected_reports_index_and_adds_nothing() {
        let mut builder = AbilityBuilder::new();
        builder.can("read", "Article");

        let err = builder
            .extend_from_json(&json!([
                { "action": "update", "subject": "Article" },
                { "subject": "Article" }
            ]))
            .unwrap_err();

        assert!(matches!(err, AbilityError::RuleRejected { index: 2, .. }));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_unknown_rule_keys_rejected() {
        let err = AbilityBuilder::from_json_str(
            r#"[
                { "action": "read", "subject": "Article", "properties": { "fields": ["title"] } }
            ]"#,
        )
        .unwrap_err();
        assert!(matches!(err, AbilityError::RuleRejected { index: 0, .. }));

        let mut builder = AbilityBuilder::new();
        let err = builder
            .extend_from_json(&json!([
                { "action": "read", "subject": "Article" },
                { "action": "delete", "subject": "Article", "invertd": true }
            ]))
            .unwrap_err();
        assert!(matches!(err, AbilityError::RuleRejected { index: 1, .. }));
        assert!(builder.is_empty());
    }

    #[test]
    fn test_with_config_rejects_zero_depth() {
        let config = EngineConfig::new().with_max_condition_depth(0);
        assert!(matches!(
            AbilityBuilder::with_config(&config),
            Err(AbilityError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_add_value_rejects_wrong_types() {
        let mut builder = AbilityBuilder::new();
        assert!(builder.add_value(&json!(42)).is_err());
        assert!(builder
            .add_value(&json!({ "action": "read", "fields": "title" }))
            .is_err());
        assert!(builder.add_value(&json!({ "action": "read" })).is_ok());
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_config_depth_limit() {
        let config = EngineConfig::new().with_max_condition_depth(1);
        let mut builder = AbilityBuilder::with_config(&config).unwrap();
        builder.add(PermissionRule::can("read", "Article").with_condition(json!({
            "$or": [{ "$and": [{ "public": true }] }]
        })));

        let ability = builder.build();
        assert!(!ability.can_on_record("read", "Article", &json!({ "public": true }), None));
    }
}
