//! Request validation from declared field types and rules. Every field error is collected.

use crate::config::{FieldSpec, FieldType, ResolvedModel, ResolvedResource, ValidationRule, ID_FIELD};
use crate::error::{AppError, FieldErrors};
use crate::store::{Condition, Query, Record, Store};
use regex::Regex;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// Create or replace: required fields must be present.
    Full,
    /// Modify: only the fields present are checked.
    Partial,
}

/// One write to validate.
pub struct WriteRequest<'a> {
    pub resource: &'a ResolvedResource,
    pub mode: WriteMode,
    /// Fields the action may write. `None` means every field that is not read-only.
    pub writable: Option<&'a [String]>,
    /// Reserved keys removed from the input before anything else.
    pub strip: &'a [&'a str],
    /// Current row when updating.
    pub instance: Option<&'a Record>,
    /// Values set by the server, e.g. the parent link taken from the path.
    pub bound: Record,
}

impl WriteRequest<'_> {
    fn is_writable(&self, field: &FieldSpec) -> bool {
        match self.writable {
            Some(names) => names.iter().any(|n| *n == field.name),
            None => !field.read_only,
        }
    }
}

pub struct RequestValidator<'a> {
    store: &'a dyn Store,
    model: &'a ResolvedModel,
}

impl<'a> RequestValidator<'a> {
    pub fn new(store: &'a dyn Store, model: &'a ResolvedModel) -> Self {
        RequestValidator { store, model }
    }

    /// Validate `body` and return the values to persist: writable fields that passed,
    /// defaults for omitted fields on create, and the bound values.
    pub async fn validate(&self, req: WriteRequest<'_>, mut body: Record) -> Result<Record, AppError> {
        for key in req.strip {
            body.remove(*key);
        }
        let mut errors = FieldErrors::new();
        let mut out = Record::new();
        for field in req.resource.fields.iter().filter(|f| req.is_writable(f)) {
            match body.remove(&field.name) {
                Some(raw) => {
                    if let Some(v) = check_field(field, raw, &mut errors) {
                        out.insert(field.name.clone(), v);
                    }
                }
                None if req.mode == WriteMode::Full && req.instance.is_none() => {
                    if field.required() {
                        errors.add(&field.name, "is required");
                    } else if let Some(default) = &field.default {
                        out.insert(field.name.clone(), default.clone());
                    }
                }
                None if req.mode == WriteMode::Full && field.required() => {
                    errors.add(&field.name, "is required");
                }
                None => {}
            }
        }
        out.extend(req.bound.clone());
        std::mem::take(&mut errors).into_result()?;

        self.check_references(req.resource, &out, &mut errors).await?;
        self.check_unique_together(&req, &out, &mut errors).await?;
        errors.into_result()?;
        Ok(out)
    }

    async fn check_references(
        &self,
        resource: &ResolvedResource,
        values: &Record,
        errors: &mut FieldErrors,
    ) -> Result<(), AppError> {
        for field in &resource.fields {
            let (Some(target), Some(id)) = (&field.references, values.get(&field.name)) else {
                continue;
            };
            if id.is_null() {
                continue;
            }
            let target = self
                .model
                .resource(target)
                .ok_or_else(|| AppError::Internal(format!("unknown resource {}", target)))?;
            let query = Query::new().filter(Condition::eq(ID_FIELD, id.clone()));
            if self.store.count(target, &query).await? == 0 {
                errors.add(&field.name, format!("object {} does not exist", id));
            }
        }
        Ok(())
    }

    async fn check_unique_together(
        &self,
        req: &WriteRequest<'_>,
        values: &Record,
        errors: &mut FieldErrors,
    ) -> Result<(), AppError> {
        let resource = req.resource;
        let mut merged = req.instance.cloned().unwrap_or_default();
        merged.extend(values.clone());
        let own_id = req.instance.and_then(|r| r.get(ID_FIELD)).and_then(Value::as_i64);
        let parent_field = resource.parent.as_ref().map(|p| p.field.as_str());

        for group in &resource.unique_together {
            // Only groups touched by this write, with every member set.
            if !group.iter().any(|f| values.contains_key(f)) {
                continue;
            }
            let Some(conditions) = group
                .iter()
                .map(|f| merged.get(f).filter(|v| !v.is_null()).map(|v| Condition::eq(f.clone(), v.clone())))
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            let query = Query {
                conditions,
                limit: Some(2),
                ..Query::new()
            };
            let clash = self
                .store
                .select(resource, &query)
                .await?
                .iter()
                .any(|row| row.get(ID_FIELD).and_then(Value::as_i64) != own_id);
            if clash {
                let key = group
                    .iter()
                    .rev()
                    .find(|f| Some(f.as_str()) != parent_field)
                    .or_else(|| group.last())
                    .cloned()
                    .unwrap_or_default();
                errors.add(key, format!("fields {} must make a unique set", group.join(", ")));
            }
        }
        Ok(())
    }
}

/// Type-check and coerce one value, then apply its rules. `None` when an error was recorded.
fn check_field(field: &FieldSpec, raw: Value, errors: &mut FieldErrors) -> Option<Value> {
    let name = field.name.as_str();
    if raw.is_null() {
        if field.nullable {
            return Some(Value::Null);
        }
        errors.add(name, "may not be null");
        return None;
    }
    let value = match (field.field_type, raw) {
        (FieldType::String, v @ Value::String(_)) => v,
        (FieldType::String, _) => {
            errors.add(name, "must be a string");
            return None;
        }
        (FieldType::Integer | FieldType::Reference, Value::Number(n)) if n.is_i64() => Value::Number(n),
        (FieldType::Integer | FieldType::Reference, raw) => match raw.as_str().map(|s| s.trim().parse::<i64>()) {
            Some(Ok(n)) => Value::from(n),
            _ => {
                errors.add(name, "must be an integer");
                return None;
            }
        },
        (FieldType::Boolean, v @ Value::Bool(_)) => v,
        (FieldType::Boolean, Value::String(s)) if s == "true" || s == "false" => Value::Bool(s == "true"),
        (FieldType::Boolean, _) => {
            errors.add(name, "must be a boolean");
            return None;
        }
    };
    let before = errors.get(name).map(<[String]>::len).unwrap_or(0);
    validate_rules(name, &value, &field.validation, field.pattern.as_ref(), errors);
    let after = errors.get(name).map(<[String]>::len).unwrap_or(0);
    (after == before).then_some(value)
}

fn validate_rules(col: &str, v: &Value, rule: &ValidationRule, pattern: Option<&Regex>, errors: &mut FieldErrors) {
    if let Some(format) = &rule.format {
        validate_format(col, v, format, errors);
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                errors.add(col, format!("must be at most {} characters", max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                errors.add(col, format!("must be at least {} characters", min));
            }
        }
        if pattern.is_some_and(|re| !re.is_match(s)) {
            errors.add(col, "does not match required pattern");
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            errors.add(
                col,
                format!("must be one of: {:?}", allowed.iter().take(5).collect::<Vec<_>>()),
            );
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                errors.add(col, format!("must be at least {}", min));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                errors.add(col, format!("must be at most {}", max));
            }
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str, errors: &mut FieldErrors) {
    let Some(s) = v.as_str() else { return };
    match format.to_lowercase().as_str() {
        "email" => {
            if !s.contains('@') || s.len() < 3 {
                errors.add(col, "must be a valid email");
            }
        }
        "uuid" => {
            if uuid::Uuid::parse_str(s).is_err() {
                errors.add(col, "must be a valid UUID");
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_from_str, resolve};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn model() -> ResolvedModel {
        resolve(
            &load_from_str(
                r#"{"resources": [
                    {"name": "collection", "path_segment": "collections",
                     "fields": [
                        {"name": "title", "type": "string", "validation": {"max_length": 5}},
                        {"name": "rank", "type": "integer", "default": 0},
                        {"name": "email", "type": "string", "nullable": true, "validation": {"format": "email"}},
                        {"name": "code", "type": "string", "nullable": true, "validation": {"pattern": "^[A-Z]{3}$"}}
                     ],
                     "actions": ["list", "create"]},
                    {"name": "nested-collection", "path_segment": "nested-collections",
                     "fields": [{"name": "title", "type": "string"}],
                     "actions": ["list", "create"],
                     "parent": {"resource": "collection"},
                     "unique_together": [["parent", "title"]]}
                ]}"#,
            )
            .unwrap(),
        )
        .unwrap()
    }

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    fn write<'a>(resource: &'a ResolvedResource, mode: WriteMode, bound: Record) -> WriteRequest<'a> {
        WriteRequest {
            resource,
            mode,
            writable: None,
            strip: &["validate_only"],
            instance: None,
            bound,
        }
    }

    #[tokio::test]
    async fn collects_all_field_errors() {
        let model = model();
        let store = MemoryStore::new();
        let v = RequestValidator::new(&store, &model);
        let c = model.resource("collection").unwrap();
        let err = v
            .validate(
                write(c, WriteMode::Full, Record::new()),
                rec(json!({"title": "too long", "rank": "x", "email": "nope", "code": "abc"})),
            )
            .await
            .unwrap_err();
        let AppError::Validation(errors) = err else { panic!("expected validation error") };
        assert!(errors.get("title").is_some());
        assert!(errors.get("rank").is_some());
        assert!(errors.get("email").is_some());
        assert_eq!(errors.get("code"), Some(&["does not match required pattern".to_string()][..]));
    }

    #[tokio::test]
    async fn applies_defaults_and_strips_reserved_and_read_only() {
        let model = model();
        let store = MemoryStore::new();
        let v = RequestValidator::new(&store, &model);
        let c = model.resource("collection").unwrap();
        let out = v
            .validate(
                write(c, WriteMode::Full, Record::new()),
                rec(json!({"title": "ok", "validate_only": true, "id": 99})),
            )
            .await
            .unwrap();
        assert_eq!(out, rec(json!({"title": "ok", "rank": 0})));
    }

    #[tokio::test]
    async fn partial_skips_missing_required() {
        let model = model();
        let store = MemoryStore::new();
        let v = RequestValidator::new(&store, &model);
        let c = model.resource("collection").unwrap();
        let out = v
            .validate(write(c, WriteMode::Partial, Record::new()), rec(json!({"rank": "7"})))
            .await
            .unwrap();
        assert_eq!(out, rec(json!({"rank": 7})));
    }

    #[tokio::test]
    async fn reference_and_uniqueness() {
        let model = model();
        let store = MemoryStore::new();
        let c = model.resource("collection").unwrap();
        let n = model.resource("nested-collection").unwrap();
        store.insert(c, rec(json!({"title": "p", "rank": 0}))).await.unwrap();
        store.insert(n, rec(json!({"parent": 1, "title": "dup"}))).await.unwrap();
        let v = RequestValidator::new(&store, &model);

        let err = v
            .validate(write(n, WriteMode::Full, rec(json!({"parent": 1}))), rec(json!({"title": "dup"})))
            .await
            .unwrap_err();
        let AppError::Validation(errors) = err else { panic!("expected validation error") };
        assert_eq!(
            errors.get("title"),
            Some(&["fields parent, title must make a unique set".to_string()][..])
        );

        let err = v
            .validate(write(n, WriteMode::Full, rec(json!({"parent": 42}))), rec(json!({"title": "new"})))
            .await
            .unwrap_err();
        let AppError::Validation(errors) = err else { panic!("expected validation error") };
        assert!(errors.get("parent").is_some());

        let instance = rec(json!({"id": 1, "parent": 1, "title": "dup"}));
        let req = WriteRequest {
            instance: Some(&instance),
            ..write(n, WriteMode::Partial, Record::new())
        };
        assert!(v.validate(req, rec(json!({"title": "dup"}))).await.is_ok());
    }
}
