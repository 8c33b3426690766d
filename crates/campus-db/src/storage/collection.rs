//! Collection definitions: unique fields, filter casts, and write hooks.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Number, Value};

use super::hooks::WriteHook;

/// Declared type of a field, used to cast string filter values coming from
/// query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
}

impl FieldKind {
    /// Cast one filter operand. Values that cannot be cast are returned
    /// unchanged, so they simply fail to match.
    pub fn cast(self, value: &Value) -> Value {
        let s = match value.as_str() {
            Some(s) => s.trim(),
            None => return value.clone(),
        };
        match self {
            Self::String => value.clone(),
            Self::Number => s
                .parse::<i64>()
                .ok()
                .map(|i| Value::Number(i.into()))
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                })
                .unwrap_or_else(|| value.clone()),
            Self::Boolean => match s {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => value.clone(),
            },
        }
    }
}

/// Complete collection definition registered with a store.
pub struct CollectionDef {
    pub name: String,
    /// Fields whose non-null values must be unique across the collection.
    pub unique: Vec<String>,
    /// Field casts applied to filters before matching.
    pub casts: BTreeMap<String, FieldKind>,
    hooks: Vec<Arc<dyn WriteHook>>,
}

impl std::fmt::Debug for CollectionDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionDef")
            .field("name", &self.name)
            .field("unique", &self.unique)
            .field("casts", &self.casts)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl CollectionDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique: Vec::new(),
            casts: BTreeMap::new(),
            hooks: Vec::new(),
        }
    }

    pub fn unique(mut self, field: impl Into<String>) -> Self {
        self.unique.push(field.into());
        self
    }

    pub fn cast(mut self, field: impl Into<String>, kind: FieldKind) -> Self {
        self.casts.insert(field.into(), kind);
        self
    }

    pub fn hook(mut self, hook: Arc<dyn WriteHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn hooks(&self) -> &[Arc<dyn WriteHook>] {
        &self.hooks
    }

    /// Rewrite `filter` so operands on cast fields carry their declared type.
    pub fn cast_filter(&self, filter: &Value) -> Value {
        if self.casts.is_empty() {
            return filter.clone();
        }
        self.cast_filter_inner(filter)
    }

    fn cast_filter_inner(&self, filter: &Value) -> Value {
        let obj = match filter.as_object() {
            Some(o) => o,
            None => return filter.clone(),
        };

        let mut out = Map::new();
        for (key, condition) in obj {
            let cast = match key.as_str() {
                "$and" | "$or" => match condition.as_array() {
                    Some(subs) => {
                        Value::Array(subs.iter().map(|s| self.cast_filter_inner(s)).collect())
                    }
                    None => condition.clone(),
                },
                "$not" => self.cast_filter_inner(condition),
                field => match self.casts.get(field) {
                    Some(kind) => cast_condition(*kind, condition),
                    None => condition.clone(),
                },
            };
            out.insert(key.clone(), cast);
        }
        Value::Object(out)
    }
}

fn cast_condition(kind: FieldKind, condition: &Value) -> Value {
    match condition {
        Value::Object(ops) if ops.keys().all(|k| k.starts_with('$')) => {
            let cast_ops = ops
                .iter()
                .map(|(op, operand)| {
                    let v = match (op.as_str(), operand) {
                        ("$in" | "$nin", Value::Array(items)) => {
                            Value::Array(items.iter().map(|i| kind.cast(i)).collect())
                        }
                        ("$eq" | "$ne" | "$gt" | "$gte" | "$lt" | "$lte", _) => kind.cast(operand),
                        _ => operand.clone(),
                    };
                    (op.clone(), v)
                })
                .collect();
            Value::Object(cast_ops)
        }
        other => kind.cast(other),
    }
}
