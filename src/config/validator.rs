//! Config validation: referential integrity and API consistency.

use crate::config::{FullConfig, NestingKind, ResourceConfig, ID_FIELD};
use crate::error::ConfigError;
use crate::routing::StandardAction;
use std::collections::{HashMap, HashSet};

fn invalid(resource: &ResourceConfig, msg: impl std::fmt::Display) -> ConfigError {
    ConfigError::Validation(format!("resource {}: {}", resource.name, msg))
}

/// Names a request may refer to on `resource`: `id`, declared fields, and the implicit parent field.
fn known_fields(resource: &ResourceConfig) -> HashSet<&str> {
    let mut fields: HashSet<&str> = resource.fields.iter().map(|f| f.name.as_str()).collect();
    fields.insert(ID_FIELD);
    if let Some(parent) = &resource.parent {
        fields.insert(parent.field.as_str());
    }
    fields
}

/// Every action name the resource declares, standard names canonicalized.
fn declared_actions(resource: &ResourceConfig) -> HashSet<String> {
    resource
        .actions
        .iter()
        .filter_map(|a| StandardAction::from_name(a).map(|s| s.name().to_string()))
        .chain(resource.custom_actions.iter().map(|c| c.name.clone()))
        .collect()
}

/// Canonical form of a standard action name; custom names pass through.
pub fn canonical_action(name: &str) -> String {
    StandardAction::from_name(name)
        .map(|s| s.name().to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Check declarations. `validate_only_param` is the flag name stripped from bodies, so no field may use it.
pub fn validate(config: &FullConfig, validate_only_param: &str) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for r in &config.resources {
        if !names.insert(r.name.as_str()) {
            return Err(ConfigError::DuplicateResource(r.name.clone()));
        }
    }
    let by_name = config.by_name();

    // Path segments are unique among siblings.
    let mut segments: HashSet<(Option<&str>, &str)> = HashSet::new();
    for r in &config.resources {
        let parent = r.parent.as_ref().map(|p| p.resource.as_str());
        if r.path_segment.is_empty() || r.path_segment.contains(['/', ':']) {
            return Err(invalid(r, format!("invalid path segment '{}'", r.path_segment)));
        }
        if !segments.insert((parent, r.path_segment.as_str())) {
            return Err(ConfigError::DuplicatePathSegment(r.path_segment.clone()));
        }
    }

    for r in &config.resources {
        validate_parent_chain(r, &by_name)?;
        validate_fields(r, &by_name, validate_only_param)?;
        validate_actions(r)?;
        validate_filters(r)?;
    }
    Ok(())
}

fn validate_parent_chain(
    resource: &ResourceConfig,
    by_name: &HashMap<&str, &ResourceConfig>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::from([resource.name.as_str()]);
    let mut current = resource;
    while let Some(parent) = &current.parent {
        let next = by_name
            .get(parent.resource.as_str())
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "parent resource",
                id: parent.resource.clone(),
            })?;
        if !seen.insert(next.name.as_str()) {
            return Err(invalid(resource, "parent chain forms a cycle"));
        }
        if next.parent.as_ref().map(|p| p.kind) == Some(NestingKind::Singleton) {
            return Err(invalid(resource, format!("cannot nest under singleton {}", next.name)));
        }
        current = next;
    }
    if let Some(parent) = &resource.parent {
        if parent.kind == NestingKind::Singleton && !parent.wildcard_actions.is_empty() {
            return Err(invalid(resource, "singletons do not accept wildcard parents"));
        }
        if parent.kind != NestingKind::Singleton && parent.initial.is_some() {
            return Err(invalid(resource, "initial values apply to singletons only"));
        }
        if resource.fields.iter().any(|f| f.name == parent.field) {
            return Err(invalid(resource, format!("field '{}' is reserved for the parent link", parent.field)));
        }
        if let Some(unknown) = parent
            .initial
            .iter()
            .flat_map(|m| m.keys())
            .find(|k| !resource.fields.iter().any(|f| f.name == **k))
        {
            return Err(invalid(resource, format!("initial value for unknown field '{}'", unknown)));
        }
    }
    Ok(())
}

fn validate_fields(
    resource: &ResourceConfig,
    by_name: &HashMap<&str, &ResourceConfig>,
    validate_only_param: &str,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for f in &resource.fields {
        if f.name == ID_FIELD || f.name == validate_only_param {
            return Err(invalid(resource, format!("field name '{}' is reserved", f.name)));
        }
        if !seen.insert(f.name.as_str()) {
            return Err(invalid(resource, format!("duplicate field '{}'", f.name)));
        }
        if let Some(target) = &f.references {
            if !by_name.contains_key(target.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "referenced resource",
                    id: target.clone(),
                });
            }
        }
    }
    Ok(())
}

fn validate_actions(resource: &ResourceConfig) -> Result<(), ConfigError> {
    for a in &resource.actions {
        if StandardAction::from_name(a).is_none() {
            return Err(invalid(resource, format!("unknown standard action '{}'", a)));
        }
    }
    let mut custom_names = HashSet::new();
    for c in &resource.custom_actions {
        if StandardAction::from_name(&c.name).is_some() || !custom_names.insert(c.name.as_str()) {
            return Err(ConfigError::InvalidAction {
                resource: resource.name.clone(),
                action: c.name.clone(),
                reason: "name is already taken".into(),
            });
        }
        if c.delegate.is_detail() != c.detail {
            return Err(ConfigError::InvalidAction {
                resource: resource.name.clone(),
                action: c.name.clone(),
                reason: format!("delegate '{}' does not match detail={}", c.delegate.name(), c.detail),
            });
        }
        if let Some(writable) = &c.writable_fields {
            let known = known_fields(resource);
            if let Some(unknown) = writable.iter().find(|f| !known.contains(f.as_str()) || *f == ID_FIELD) {
                return Err(invalid(resource, format!("action {}: unknown writable field '{}'", c.name, unknown)));
            }
        }
    }

    let declared = declared_actions(resource);
    for name in &resource.validate_only_actions {
        let canonical = canonical_action(name);
        if !declared.contains(&canonical) {
            return Err(invalid(resource, format!("validate-only action '{}' is not declared", name)));
        }
        let body_capable = match StandardAction::from_name(name) {
            Some(standard) => standard.is_write(),
            None => resource
                .custom_actions
                .iter()
                .any(|c| c.name == *name && c.methods.iter().any(|m| m.has_body())),
        };
        if !body_capable {
            return Err(invalid(resource, format!("validate-only action '{}' takes no body", name)));
        }
    }
    if let Some(parent) = &resource.parent {
        for name in &parent.wildcard_actions {
            let canonical = canonical_action(name);
            if !declared.contains(&canonical) {
                return Err(invalid(resource, format!("wildcard action '{}' is not declared", name)));
            }
            let creates = StandardAction::from_name(name) == Some(StandardAction::Create)
                || resource
                    .custom_actions
                    .iter()
                    .any(|c| c.name == *name && c.delegate == StandardAction::Create);
            if creates {
                return Err(invalid(resource, format!("action '{}' creates rows and cannot take a wildcard parent", name)));
            }
        }
    }
    Ok(())
}

fn validate_filters(resource: &ResourceConfig) -> Result<(), ConfigError> {
    let known = known_fields(resource);
    let check = |field: &str, what: &str| {
        if known.contains(field) {
            Ok(())
        } else {
            Err(invalid(resource, format!("{} refers to unknown field '{}'", what, field)))
        }
    };
    for f in &resource.ordering_fields {
        check(f, "ordering")?;
    }
    for s in &resource.search_filters {
        check(s.field.as_deref().unwrap_or(&s.param), "search filter")?;
    }
    if let Some(batch) = &resource.batch_get {
        check(&batch.lookup_field, "batch get")?;
        if batch.limit == 0 {
            return Err(invalid(resource, "batch get limit must be positive"));
        }
    }
    for group in &resource.unique_together {
        if group.is_empty() {
            return Err(invalid(resource, "empty unique_together group"));
        }
        for f in group {
            check(f, "unique_together")?;
        }
    }
    if resource.pagination.page_size == 0 || resource.pagination.page_size > resource.pagination.max_page_size {
        return Err(invalid(resource, "page_size must be between 1 and max_page_size"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::validate_only::DEFAULT_PARAM;
    use serde_json::json;

    fn config(value: serde_json::Value) -> FullConfig {
        serde_json::from_value(value).unwrap()
    }

    fn check(value: serde_json::Value) -> Result<(), ConfigError> {
        validate(&config(value), DEFAULT_PARAM)
    }

    fn base() -> serde_json::Value {
        json!({"resources": [
            {"name": "collection", "path_segment": "collections",
             "fields": [{"name": "title", "type": "string"}],
             "actions": ["list", "create", "retrieve", "update", "partial_update", "destroy"],
             "validate_only_actions": ["create", "partial_update"]},
            {"name": "nested-collection", "path_segment": "nested-collections",
             "fields": [{"name": "title", "type": "string"}],
             "actions": ["list", "retrieve"],
             "parent": {"resource": "collection", "wildcard_actions": ["list"]},
             "unique_together": [["parent", "title"]]}
        ]})
    }

    #[test]
    fn accepts_well_formed() {
        check(base()).unwrap();
    }

    #[test]
    fn missing_parent() {
        let mut v = base();
        v["resources"][1]["parent"]["resource"] = json!("nope");
        assert!(matches!(check(v), Err(ConfigError::MissingReference { .. })));
    }

    #[test]
    fn validate_only_must_take_a_body() {
        let mut v = base();
        v["resources"][0]["validate_only_actions"] = json!(["list"]);
        assert!(check(v).is_err());
    }

    #[test]
    fn validate_only_must_be_declared() {
        let mut v = base();
        v["resources"][1]["validate_only_actions"] = json!(["create"]);
        assert!(check(v).is_err());
    }

    #[test]
    fn wildcard_action_must_be_declared() {
        let mut v = base();
        v["resources"][1]["parent"]["wildcard_actions"] = json!(["destroy"]);
        assert!(check(v).is_err());
    }

    #[test]
    fn reserved_field_names() {
        let mut v = base();
        v["resources"][0]["fields"] = json!([{"name": "validate_only", "type": "boolean"}]);
        assert!(check(v).is_err());
    }

    #[test]
    fn configured_flag_name_is_reserved() {
        let mut v = base();
        v["resources"][0]["fields"] = json!([{"name": "dry_run", "type": "boolean"}]);
        assert!(check(v.clone()).is_ok());
        assert!(validate(&config(v), "dry_run").is_err());
    }

    #[test]
    fn delegate_must_match_scope() {
        let mut v = base();
        v["resources"][0]["custom_actions"] = json!([
            {"name": "archive", "methods": ["POST"], "detail": false, "delegate": "modify"}
        ]);
        assert!(matches!(check(v), Err(ConfigError::InvalidAction { .. })));
    }

    #[test]
    fn singleton_initial_names_fields() {
        let mut v = base();
        v["resources"][1]["actions"] = json!(["retrieve"]);
        v["resources"][1]["unique_together"] = json!([]);
        v["resources"][1]["parent"] = json!({"resource": "collection", "kind": "singleton",
                                             "initial": {"title": "x"}});
        check(v.clone()).unwrap();
        v["resources"][1]["parent"]["initial"] = json!({"colour": "x"});
        assert!(check(v).is_err());
    }

    #[test]
    fn duplicate_sibling_segment() {
        let mut v = base();
        v["resources"][1]["parent"] = serde_json::Value::Null;
        v["resources"][1]["path_segment"] = json!("collections");
        v["resources"][1]["unique_together"] = json!([]);
        assert!(matches!(check(v), Err(ConfigError::DuplicatePathSegment(_))));
    }
}
