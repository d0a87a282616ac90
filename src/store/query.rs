//! Backend-neutral query description built by the filter pipeline.

use serde_json::Value;
use std::cmp::Ordering;

/// One stored row as a JSON object (field name → value), always including `id`.
pub type Record = serde_json::Map<String, Value>;

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Eq { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    /// Case-insensitive substring match.
    IContains { field: String, value: String },
}

impl Condition {
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Condition::Eq {
            field: field.into(),
            value,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Condition::Eq { field, .. } | Condition::In { field, .. } | Condition::IContains { field, .. } => field,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(self.field()).unwrap_or(&Value::Null);
        match self {
            Condition::Eq { value, .. } => values_equal(actual, value),
            Condition::In { values, .. } => values.iter().any(|v| values_equal(actual, v)),
            Condition::IContains { value, .. } => actual
                .as_str()
                .map(|s| s.to_lowercase().contains(&value.to_lowercase()))
                .unwrap_or(false),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderTerm {
    pub field: String,
    pub descending: bool,
}

impl OrderTerm {
    pub fn asc(field: impl Into<String>) -> Self {
        OrderTerm {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        OrderTerm {
            field: field.into(),
            descending: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub conditions: Vec<Condition>,
    pub ordering: Vec<OrderTerm>,
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

/// Total order over JSON scalars: null < bool < number < string; anything else compares equal.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn conditions() {
        let r = record(json!({"id": 3, "title": "Hello World"}));
        assert!(Condition::eq("id", json!(3)).matches(&r));
        assert!(!Condition::eq("id", json!(4)).matches(&r));
        assert!(Condition::In { field: "id".into(), values: vec![json!(1), json!(3)] }.matches(&r));
        assert!(Condition::IContains { field: "title".into(), value: "WORLD".into() }.matches(&r));
        assert!(!Condition::IContains { field: "id".into(), value: "3".into() }.matches(&r));
    }

    #[test]
    fn ordering_of_scalars() {
        assert_eq!(compare_values(&json!(1), &json!(2)), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&Value::Null, &json!("a")), Ordering::Less);
    }
}
