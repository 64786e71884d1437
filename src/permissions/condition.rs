//! Condition matching
//!
//! Conditions are JSON query trees in the Mongo/sift style:
//!
//! ```json
//! { "authorId": { "$eq": 1 }, "$or": [{ "status": "draft" }, { "public": true }] }
//! ```
//!
//! A tree is compiled once into a [`Condition`] built from a closed set of
//! operators and then evaluated against records. Nothing in a tree can name
//! code to run: keys outside [`ALLOWED_OPERATORS`] compile to a node that
//! never matches, as do malformed operands and trees nested deeper than the
//! configured limit.

use std::cmp::Ordering;

use serde_json::{Map, Number, Value};

use crate::core::DEFAULT_MAX_CONDITION_DEPTH;

/// Container nesting allowed in an operand literal
pub const MAX_LITERAL_DEPTH: usize = 128;

/// Operators a condition tree may use
pub const ALLOWED_OPERATORS: [&str; 12] = [
    "$or",
    "$and",
    "$eq",
    "$ne",
    "$in",
    "$nin",
    "$lt",
    "$lte",
    "$gt",
    "$gte",
    "$exists",
    "$elemMatch",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Or,
    And,
    Eq,
    Ne,
    In,
    Nin,
    Lt,
    Lte,
    Gt,
    Gte,
    Exists,
    ElemMatch,
}

impl Operator {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "$or" => Some(Operator::Or),
            "$and" => Some(Operator::And),
            "$eq" => Some(Operator::Eq),
            "$ne" => Some(Operator::Ne),
            "$in" => Some(Operator::In),
            "$nin" => Some(Operator::Nin),
            "$lt" => Some(Operator::Lt),
            "$lte" => Some(Operator::Lte),
            "$gt" => Some(Operator::Gt),
            "$gte" => Some(Operator::Gte),
            "$exists" => Some(Operator::Exists),
            "$elemMatch" => Some(Operator::ElemMatch),
            _ => None,
        }
    }
}

/// A compiled condition tree
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Matches every record (the empty tree)
    Always,
    /// Matches nothing (unsupported or malformed input)
    Never,
    /// Every branch must match
    And(Vec<Condition>),
    /// At least one branch must match
    Or(Vec<Condition>),
    /// Operators applied to the value at `path` (empty path = the candidate itself)
    Field { path: Vec<String>, ops: Vec<FieldOp> },
}

/// An operator applied to a single value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    Exists(bool),
    ElemMatch(Box<Condition>),
}

impl Condition {
    fn all(mut parts: Vec<Condition>) -> Condition {
        parts.retain(|part| *part != Condition::Always);
        match parts.len() {
            0 => Condition::Always,
            1 => parts.remove(0),
            _ => Condition::And(parts),
        }
    }

    /// Evaluate against a record
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Condition::Always => true,
            Condition::Never => false,
            Condition::And(parts) => parts.iter().all(|part| part.matches(record)),
            Condition::Or(parts) => parts.iter().any(|part| part.matches(record)),
            Condition::Field { path, ops } => match resolve(record, path) {
                Some(value) => ops.iter().all(|op| op.matches(value)),
                None => ops.iter().all(|op| *op == FieldOp::Exists(false)),
            },
        }
    }
}

impl FieldOp {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldOp::Eq(expected) => any_or_self(value, |v| values_equal(v, expected)),
            FieldOp::Ne(expected) => !any_or_self(value, |v| values_equal(v, expected)),
            FieldOp::In(list) => any_or_self(value, |v| contains(list, v)),
            FieldOp::Nin(list) => !any_or_self(value, |v| contains(list, v)),
            FieldOp::Lt(bound) => any_or_self(value, |v| compare(v, bound) == Some(Ordering::Less)),
            FieldOp::Lte(bound) => any_or_self(value, |v| {
                matches!(compare(v, bound), Some(Ordering::Less | Ordering::Equal))
            }),
            FieldOp::Gt(bound) => {
                any_or_self(value, |v| compare(v, bound) == Some(Ordering::Greater))
            }
            FieldOp::Gte(bound) => any_or_self(value, |v| {
                matches!(compare(v, bound), Some(Ordering::Greater | Ordering::Equal))
            }),
            FieldOp::Exists(expected) => *expected,
            FieldOp::ElemMatch(condition) => value
                .as_array()
                .is_some_and(|items| items.iter().any(|item| condition.matches(item))),
        }
    }
}

/// Compiles and evaluates condition trees with a fixed nesting limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionMatcher {
    max_depth: usize,
}

impl Default for ConditionMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONDITION_DEPTH)
    }
}

impl ConditionMatcher {
    /// Create a matcher allowing `max_depth` levels of `$and` / `$or` / `$elemMatch`
    ///
    /// The limit is at least 1.
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    /// Get the nesting limit
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Compile a condition tree
    pub fn compile(&self, tree: &Value) -> Condition {
        self.compile_query(tree, 0)
    }

    /// Compile `tree` and evaluate it against `record`
    pub fn matches(&self, tree: &Value, record: &Value) -> bool {
        self.compile(tree).matches(record)
    }

    fn compile_query(&self, tree: &Value, depth: usize) -> Condition {
        let Value::Object(map) = tree else {
            return Condition::Never;
        };

        let mut parts = Vec::with_capacity(map.len());
        for (key, value) in map {
            let part = if key.starts_with('$') {
                self.compile_root_operator(key, value, depth)
            } else {
                self.compile_field(key, value, depth)
            };
            if part == Condition::Never {
                return Condition::Never;
            }
            parts.push(part);
        }
        Condition::all(parts)
    }

    fn compile_root_operator(&self, key: &str, value: &Value, depth: usize) -> Condition {
        match Operator::parse(key) {
            Some(Operator::And) => self.compile_logical(value, depth, Condition::And),
            Some(Operator::Or) => self.compile_logical(value, depth, Condition::Or),
            Some(op) => match self.compile_op(op, value, depth) {
                Some(op) => Condition::Field {
                    path: Vec::new(),
                    ops: vec![op],
                },
                None => Condition::Never,
            },
            None => {
                tracing::debug!(operator = key, "unsupported condition operator");
                Condition::Never
            }
        }
    }

    fn compile_logical(
        &self,
        value: &Value,
        depth: usize,
        wrap: fn(Vec<Condition>) -> Condition,
    ) -> Condition {
        if depth + 1 > self.max_depth {
            tracing::debug!(max_depth = self.max_depth, "condition nested too deeply");
            return Condition::Never;
        }
        match value {
            Value::Array(items) if !items.is_empty() => wrap(
                items
                    .iter()
                    .map(|item| self.compile_query(item, depth + 1))
                    .collect(),
            ),
            _ => Condition::Never,
        }
    }

    fn compile_field(&self, key: &str, value: &Value, depth: usize) -> Condition {
        let path = key.split('.').map(str::to_string).collect();

        let ops = match value {
            Value::Object(map) if is_operator_object(map) => {
                let mut ops = Vec::with_capacity(map.len());
                for (op_key, operand) in map {
                    let compiled = match Operator::parse(op_key) {
                        Some(Operator::And | Operator::Or) | None => None,
                        Some(op) => self.compile_op(op, operand, depth),
                    };
                    match compiled {
                        Some(op) => ops.push(op),
                        None => {
                            tracing::debug!(
                                field = key,
                                operator = op_key.as_str(),
                                "unsupported or malformed field operator"
                            );
                            return Condition::Never;
                        }
                    }
                }
                ops
            }
            literal => match literal_operand(literal) {
                Some(literal) => vec![FieldOp::Eq(literal)],
                None => return Condition::Never,
            },
        };

        Condition::Field { path, ops }
    }

    fn compile_op(&self, op: Operator, operand: &Value, depth: usize) -> Option<FieldOp> {
        let compiled = match op {
            Operator::Eq => FieldOp::Eq(literal_operand(operand)?),
            Operator::Ne => FieldOp::Ne(literal_operand(operand)?),
            Operator::In => FieldOp::In(list_operand(operand)?),
            Operator::Nin => FieldOp::Nin(list_operand(operand)?),
            Operator::Lt => FieldOp::Lt(literal_operand(operand)?),
            Operator::Lte => FieldOp::Lte(literal_operand(operand)?),
            Operator::Gt => FieldOp::Gt(literal_operand(operand)?),
            Operator::Gte => FieldOp::Gte(literal_operand(operand)?),
            Operator::Exists => FieldOp::Exists(operand.as_bool()?),
            Operator::ElemMatch => {
                if depth + 1 > self.max_depth || !operand.is_object() {
                    return None;
                }
                FieldOp::ElemMatch(Box::new(self.compile_query(operand, depth + 1)))
            }
            Operator::And | Operator::Or => return None,
        };
        Some(compiled)
    }
}

/// Evaluate `tree` against `record` with the default nesting limit
pub fn matches(tree: &Value, record: &Value) -> bool {
    ConditionMatcher::default().matches(tree, record)
}

/// Copy an operand, refusing literals nested past [`MAX_LITERAL_DEPTH`]
fn literal_operand(operand: &Value) -> Option<Value> {
    if nesting_exceeds(operand, MAX_LITERAL_DEPTH) {
        tracing::debug!(max_depth = MAX_LITERAL_DEPTH, "condition literal nested too deeply");
        return None;
    }
    Some(operand.clone())
}

fn list_operand(operand: &Value) -> Option<Vec<Value>> {
    match literal_operand(operand)? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

/// True if a container sits `limit` or more levels below `value`
fn nesting_exceeds(value: &Value, limit: usize) -> bool {
    let mut pending = vec![(value, 0)];
    while let Some((value, depth)) = pending.pop() {
        match value {
            Value::Array(items) => {
                if depth >= limit {
                    return true;
                }
                pending.extend(items.iter().map(|item| (item, depth + 1)));
            }
            Value::Object(map) => {
                if depth >= limit {
                    return true;
                }
                pending.extend(map.values().map(|item| (item, depth + 1)));
            }
            _ => {}
        }
    }
    false
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|key| key.starts_with('$'))
}

fn resolve<'a>(record: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(record, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// True if `check` holds for the value or, for arrays, any of its elements
fn any_or_self(value: &Value, check: impl Fn(&Value) -> bool) -> bool {
    if check(value) {
        return true;
    }
    match value {
        Value::Array(items) => items.iter().any(check),
        _ => false,
    }
}

fn contains(list: &[Value], value: &Value) -> bool {
    list.iter().any(|candidate| values_equal(candidate, value))
}

/// Deep equality where numbers compare by value (`1 == 1.0`)
///
/// Recursion is bounded by the shallower side; compiled operands are at most
/// [`MAX_LITERAL_DEPTH`] deep.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, a)| y.get(key).is_some_and(|b| values_equal(a, b)))
        }
        _ => a == b,
    }
}

/// Ordering for numbers and strings; anything else is incomparable
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Integers compare exactly; a float on either side compares as `f64`
fn compare_numbers(x: &Number, y: &Number) -> Option<Ordering> {
    if x.is_f64() || y.is_f64() {
        return x.as_f64()?.partial_cmp(&y.as_f64()?);
    }
    Some(integer(x)?.cmp(&integer(y)?))
}

fn integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}
