//! Compiled ability
//!
//! An `Ability` is an immutable, ordered list of compiled rules. Queries
//! canonicalize the action with the same encoder used at build time and let
//! the last matching rule decide.

use std::sync::Arc;

use serde_json::Value;

use super::action::{encode, Action};
use super::condition::ConditionMatcher;
use super::rule::CompiledRule;

/// Answers permission queries for one authorization context
///
/// Cloning is cheap and clones share the same rules. An ability can be
/// queried from any number of threads at once.
#[derive(Debug, Clone)]
pub struct Ability {
    rules: Arc<[CompiledRule]>,
    matcher: ConditionMatcher,
}

impl Ability {
    pub(crate) fn new(rules: Arc<[CompiledRule]>, matcher: ConditionMatcher) -> Self {
        Self { rules, matcher }
    }

    /// Check if `action` is allowed on `subject`, optionally for one field
    ///
    /// Conditions are not evaluated here; use [`Ability::can_on_record`] or
    /// [`Ability::relevant_rule_for`] for record-level checks.
    pub fn can(&self, action: impl Into<Action>, subject: &str, field: Option<&str>) -> bool {
        let key = encode(&action.into());
        let allowed = self
            .last_rule_for_key(&key, subject)
            .is_some_and(|rule| rule.decide(field));

        tracing::trace!(action = key.as_str(), subject, field, allowed, "ability check");
        allowed
    }

    /// Inverse of [`Ability::can`]
    pub fn cannot(&self, action: impl Into<Action>, subject: &str, field: Option<&str>) -> bool {
        !self.can(action, subject, field)
    }

    /// Check `action` on a concrete record of type `subject`
    ///
    /// Rules are tried latest first; the first one whose condition matches
    /// the record (rules without a condition always match) decides.
    pub fn can_on_record(
        &self,
        action: impl Into<Action>,
        subject: &str,
        record: &Value,
        field: Option<&str>,
    ) -> bool {
        let key = encode(&action.into());
        let allowed = self
            .record_rule_for_key(&key, subject, record)
            .is_some_and(|rule| rule.decide(field));

        tracing::trace!(
            action = key.as_str(),
            subject,
            field,
            allowed,
            "ability record check"
        );
        allowed
    }

    /// The rule that decides [`Ability::can`] for this action and subject
    ///
    /// Its condition can be translated into a dataset filter by the caller.
    pub fn relevant_rule_for(
        &self,
        action: impl Into<Action>,
        subject: &str,
    ) -> Option<&CompiledRule> {
        let key = encode(&action.into());
        self.last_rule_for_key(&key, subject)
    }

    /// The rule that decides [`Ability::can_on_record`] for this record
    pub fn relevant_rule_for_record(
        &self,
        action: impl Into<Action>,
        subject: &str,
        record: &Value,
    ) -> Option<&CompiledRule> {
        let key = encode(&action.into());
        self.record_rule_for_key(&key, subject, record)
    }

    /// Every rule for this action and subject, highest precedence first
    pub fn rules_for(&self, action: impl Into<Action>, subject: &str) -> Vec<&CompiledRule> {
        let key = encode(&action.into());
        self.rules
            .iter()
            .rev()
            .filter(|rule| rule.applies_to(&key, subject))
            .collect()
    }

    /// All rules in insertion order
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// The matcher conditions were compiled with
    pub fn matcher(&self) -> &ConditionMatcher {
        &self.matcher
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn last_rule_for_key(&self, key: &str, subject: &str) -> Option<&CompiledRule> {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.applies_to(key, subject))
    }

    fn record_rule_for_key(
        &self,
        key: &str,
        subject: &str,
        record: &Value,
    ) -> Option<&CompiledRule> {
        self.rules
            .iter()
            .rev()
            .filter(|rule| rule.applies_to(key, subject))
            .find(|rule| rule.matches_record(record))
    }
}
