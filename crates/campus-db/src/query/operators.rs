//! Filter evaluation over JSON documents.
//!
//! Filters follow the document-database dialect: a field maps either to a
//! plain value (equality) or to an operator object such as
//! `{ "$gte": 3.5, "$lt": 4 }`. A scalar condition on an array field matches
//! when any element does.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Number, Value};

use crate::error::{QueryError, Result};

// ============================================================================
// Ordering and Equality
// ============================================================================

/// Position of a value's type in the cross-type sort order. Null ranks last,
/// so missing values sort after everything else in ascending order.
fn sort_rank(v: &Value) -> u8 {
    match v {
        Value::Number(_) => 0,
        Value::String(_) => 1,
        Value::Bool(_) => 2,
        Value::Array(_) | Value::Object(_) => 3,
        Value::Null => 4,
    }
}

fn number_cmp(a: &Number, b: &Number) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// Total order used by sorting and the range operators. Numbers compare
/// numerically, strings by code point, `false < true`; values of different
/// types order by [`sort_rank`].
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_cmp(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => sort_rank(a).cmp(&sort_rank(b)),
    }
}

/// JSON equality, except that numbers compare by value (`3 == 3.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Whether `value` is an operator object: non-empty, every key `$`-prefixed.
pub fn is_operator(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')))
}

/// Resolve a dotted path (`name.firstName`) inside a document.
pub fn get_field_value<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(record, |current, part| current.as_object()?.get(part))
}

// ============================================================================
// Comparison Operators
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
}

impl Op {
    fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "$eq" => Self::Eq,
            "$ne" => Self::Ne,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$in" => Self::In,
            "$nin" => Self::Nin,
            other => return Err(QueryError::UnknownOperator(other.to_string()).into()),
        })
    }

    /// Apply to a single value.
    fn test_scalar(self, value: &Value, operand: &Value) -> bool {
        let range = |accept: fn(Ordering) -> bool| {
            !value.is_null() && !operand.is_null() && accept(compare_values(value, operand))
        };
        match self {
            Self::Eq => values_equal(value, operand),
            Self::Ne => !values_equal(value, operand),
            Self::Gt => range(Ordering::is_gt),
            Self::Gte => range(Ordering::is_ge),
            Self::Lt => range(Ordering::is_lt),
            Self::Lte => range(Ordering::is_le),
            Self::In => any_of(value, operand),
            Self::Nin => !any_of(value, operand),
        }
    }

    /// Apply to a field value. Against an array field (and a non-array
    /// operand) equality and ranges need one matching element; `$ne` needs
    /// every element to differ.
    fn test(self, value: &Value, operand: &Value) -> bool {
        match (value, operand.is_array(), self) {
            (Value::Array(items), false, Self::Eq | Self::Gt | Self::Gte | Self::Lt | Self::Lte) => {
                items.iter().any(|item| self.test_scalar(item, operand))
            }
            (Value::Array(items), false, Self::Ne) => {
                items.iter().all(|item| self.test_scalar(item, operand))
            }
            _ => self.test_scalar(value, operand),
        }
    }
}

/// `$in` membership. An array field matches when any element is listed.
fn any_of(value: &Value, operand: &Value) -> bool {
    let Some(list) = operand.as_array() else {
        return false;
    };
    let listed = |v: &Value| list.iter().any(|item| values_equal(v, item));
    match value {
        Value::Array(items) => items.iter().any(listed),
        _ => listed(value),
    }
}

/// `$regex` with an optional `$options` flag string; only `i` is honored.
/// Non-string fields never match.
fn regex_matches(value: &Value, pattern: &Value, options: Option<&Value>) -> Result<bool> {
    let (Some(text), Some(pattern)) = (value.as_str(), pattern.as_str()) else {
        return Ok(false);
    };
    let ignore_case = options
        .and_then(Value::as_str)
        .is_some_and(|flags| flags.contains('i'));
    Ok(compiled(pattern, ignore_case)?.is_match(text))
}

const REGEX_CACHE_CAPACITY: usize = 64;

/// Compiled `$regex` patterns, keyed by source and case flag. A list request
/// evaluates the same search pattern against every document and field.
fn compiled(pattern: &str, ignore_case: bool) -> Result<Regex> {
    static CACHE: OnceLock<Mutex<HashMap<(String, bool), Regex>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let key = (pattern.to_string(), ignore_case);

    let mut cache = cache.lock();
    if let Some(re) = cache.get(&key) {
        return Ok(re.clone());
    }
    let re = RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .build()
        .map_err(|e| QueryError::InvalidRegex(e.to_string()))?;
    if cache.len() >= REGEX_CACHE_CAPACITY {
        cache.clear();
    }
    cache.insert(key, re.clone());
    Ok(re)
}

/// All operators of one field condition must hold. `field` is `None` when the
/// document lacks the field.
fn field_matches(field: Option<&Value>, ops: &Map<String, Value>) -> Result<bool> {
    let value = field.unwrap_or(&Value::Null);
    for (name, operand) in ops {
        let ok = match name.as_str() {
            "$exists" => operand.as_bool().unwrap_or(false) == field.is_some(),
            "$regex" => regex_matches(value, operand, ops.get("$options"))?,
            "$options" => true,
            other => Op::parse(other)?.test(value, operand),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

// ============================================================================
// Filter Evaluation
// ============================================================================

fn subfilters<'a>(filter: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Value> {
    filter
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Whether `record` satisfies `filter`.
///
/// `$and`, `$or` (array of sub-filters) and `$not` (one sub-filter) combine
/// with the field conditions, which are implicitly ANDed. An empty `$or` is
/// ignored. A filter that is not an object matches every record.
pub fn matches_filter(record: &Value, filter: &Value) -> Result<bool> {
    let Some(filter) = filter.as_object() else {
        return Ok(true);
    };

    for sub in subfilters(filter, "$and") {
        if !matches_filter(record, sub)? {
            return Ok(false);
        }
    }

    let mut alternatives = subfilters(filter, "$or").peekable();
    if alternatives.peek().is_some() {
        let mut matched = false;
        for sub in alternatives {
            if matches_filter(record, sub)? {
                matched = true;
                break;
            }
        }
        if !matched {
            return Ok(false);
        }
    }

    if let Some(negated) = filter.get("$not") {
        if matches_filter(record, negated)? {
            return Ok(false);
        }
    }

    for (path, condition) in filter.iter().filter(|(k, _)| !k.starts_with('$')) {
        let field = get_field_value(record, path);
        let ok = match condition {
            Value::Object(ops) if is_operator(condition) => field_matches(field, ops)?,
            _ => Op::Eq.test(field.unwrap_or(&Value::Null), condition),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Clone out the records matching `filter`, in stored order.
pub fn filter_records(records: &[Value], filter: &Value) -> Result<Vec<Value>> {
    let mut matched = Vec::new();
    for record in records {
        if matches_filter(record, filter)? {
            matched.push(record.clone());
        }
    }
    Ok(matched)
}

// ============================================================================
// Tests
// ============================================================================
