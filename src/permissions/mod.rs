//! Permission rules and abilities
//!
//! Rules are added to an `AbilityBuilder` in precedence order and frozen
//! into an immutable `Ability`:
//!
//! - **Action encoding**: plain actions are used as-is, parametrized
//!   actions become `name?<sorted params>`
//! - **Conditions**: a closed set of Mongo-style operators evaluated
//!   against records; anything else never matches
//! - **Precedence**: the last rule matching an action and subject decides
//!
//! ## Example
//!
//! ```rust,ignore
//! use ability_engine::permissions::{AbilityBuilder, PermissionRule};
//! use serde_json::json;
//!
//! let mut builder = AbilityBuilder::new();
//! builder
//!     .add(PermissionRule::can("read", "Article").with_fields(["title"]))
//!     .add(PermissionRule::can("update", "Article")
//!         .with_condition(json!({ "authorId": { "$eq": 1 } })));
//! let ability = builder.build();
//!
//! assert!(ability.can("read", "Article", Some("title")));
//! assert!(!ability.can_on_record("update", "Article", &json!({ "authorId": 2 }), None));
//! ```

mod ability;
mod action;
mod builder;
mod condition;
mod rule;

pub use ability::Ability;
pub use action::{encode, encode_params, Action, ParametrizedAction};
pub use builder::AbilityBuilder;
pub use condition::{matches, Condition, ConditionMatcher, FieldOp, ALLOWED_OPERATORS};
pub use rule::{CompiledRule, PermissionRule, Subject, WILDCARD_SUBJECT};
