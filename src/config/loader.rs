//! Load resource declarations from JSON and resolve them into the runtime model.

use crate::case::to_camel_case;
use crate::config::resolved::{
    BatchGetSpec, Dependent, FieldSpec, ParentLink, ResolvedModel, ResolvedResource, SearchSpec, ID_FIELD,
};
use crate::config::types::*;
use crate::config::validator::{canonical_action, validate};
use crate::error::ConfigError;
use crate::pipeline::validate_only::DEFAULT_PARAM;
use crate::pipeline::{parse_ordering, PathVariable, PathVariableConfig};
use crate::routing::{
    build_routes, nest, parent_variable, Action, ActionKind, ChildResource, Lookup, ResourceKind, RouteMatcher,
    RouteTable, StandardAction,
};
use crate::store::OrderTerm;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Parse declarations from a JSON document.
pub fn load_from_str(json: &str) -> Result<FullConfig, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read and parse a declarations file.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    tracing::debug!(path = %path.display(), "read resource declarations");
    load_from_str(&text)
}

/// Parents first; `validate` has already ruled out cycles and dangling parents.
fn topological_order(config: &FullConfig) -> Vec<&ResourceConfig> {
    let mut ordered: Vec<&ResourceConfig> = Vec::with_capacity(config.resources.len());
    let mut placed: HashSet<&str> = HashSet::new();
    while ordered.len() < config.resources.len() {
        let before = ordered.len();
        for r in &config.resources {
            if placed.contains(r.name.as_str()) {
                continue;
            }
            let ready = r
                .parent
                .as_ref()
                .map(|p| placed.contains(p.resource.as_str()))
                .unwrap_or(true);
            if ready {
                placed.insert(r.name.as_str());
                ordered.push(r);
            }
        }
        if ordered.len() == before {
            break;
        }
    }
    ordered
}

/// Path-variable prefix for children of `parent`: an explicit lookup or the parent's name.
fn lookup_name(parent: &ParentConfig) -> String {
    parent
        .lookup
        .clone()
        .unwrap_or_else(|| parent.resource.replace('-', "_"))
}

fn field_spec(resource: &str, f: &FieldConfig) -> Result<FieldSpec, ConfigError> {
    let pattern = f
        .validation
        .pattern
        .as_deref()
        .map(regex::Regex::new)
        .transpose()
        .map_err(|source| ConfigError::InvalidPattern {
            resource: resource.to_string(),
            source,
        })?;
    Ok(FieldSpec {
        name: f.name.clone(),
        field_type: f.type_,
        references: f.references.clone(),
        read_only: f.read_only,
        nullable: f.nullable,
        default: f.default.clone(),
        validation: f.validation.clone(),
        pattern,
    })
}

fn parent_field(parent: &ParentConfig) -> FieldSpec {
    FieldSpec {
        name: parent.field.clone(),
        field_type: FieldType::Reference,
        references: Some(parent.resource.clone()),
        read_only: true,
        nullable: false,
        default: None,
        validation: ValidationRule::default(),
        pattern: None,
    }
}

fn build_actions(r: &ResourceConfig) -> Vec<Action> {
    let mut seen = HashSet::new();
    let standard = r
        .actions
        .iter()
        .filter_map(|name| StandardAction::from_name(name))
        .filter(|a| seen.insert(*a))
        .map(Action::standard);
    let custom = r.custom_actions.iter().map(|c| Action {
        name: c.name.clone(),
        methods: c.methods.clone(),
        detail: c.detail,
        custom_method: c.custom_method,
        url_path: c.url_path.clone().unwrap_or_else(|| to_camel_case(&c.name)),
        kind: ActionKind::Custom {
            delegate: c.delegate,
            filters: c.filters.clone(),
            writable_fields: c.writable_fields.clone(),
        },
    });
    standard.chain(custom).collect()
}

fn dependents_of(name: &str, config: &FullConfig) -> Vec<Dependent> {
    config
        .resources
        .iter()
        .filter_map(|child| {
            let parent = child.parent.as_ref()?;
            (parent.resource == name).then(|| Dependent {
                table: child.table_name(),
                field: parent.field.clone(),
                dependents: dependents_of(&child.name, config),
            })
        })
        .collect()
}

fn default_ordering(r: &ResourceConfig, columns: &[String]) -> Vec<OrderTerm> {
    let terms = r
        .default_ordering
        .as_deref()
        .map(|expr| parse_ordering(expr, columns))
        .unwrap_or_default();
    if terms.is_empty() {
        vec![OrderTerm::asc(ID_FIELD)]
    } else {
        terms
    }
}

/// Validate and resolve declarations into routes, filters and field specs.
/// Reserves the default validate-only flag name; see [`resolve_with`].
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    resolve_with(config, DEFAULT_PARAM)
}

/// Like [`resolve`], reserving `validate_only_param` as the flag name no field may take.
pub fn resolve_with(config: &FullConfig, validate_only_param: &str) -> Result<ResolvedModel, ConfigError> {
    validate(config, validate_only_param)?;

    let mut resources: Vec<ResolvedResource> = Vec::with_capacity(config.resources.len());
    let mut by_name: HashMap<String, usize> = HashMap::new();
    let mut matcher = RouteMatcher::new();

    for r in topological_order(config) {
        let kind = match r.parent.as_ref().map(|p| p.kind) {
            Some(NestingKind::Singleton) => ResourceKind::Singleton,
            _ => ResourceKind::Collection,
        };
        let lookup = Lookup::new(r.lookup.url_kwarg.clone(), r.lookup.value_pattern.as_deref());
        let actions = build_actions(r);

        let mut fields: Vec<FieldSpec> = Vec::with_capacity(r.fields.len() + 1);
        let mut path_variables = PathVariableConfig::new();
        let (routes, parent): (RouteTable, Option<ParentLink>) = match &r.parent {
            None => (build_routes(&r.name, &r.path_segment, kind, &lookup, &actions)?, None),
            Some(p) => {
                let parent_routes = by_name
                    .get(&p.resource)
                    .map(|i| &resources[*i].routes)
                    .ok_or_else(|| ConfigError::MissingReference {
                        kind: "parent resource",
                        id: p.resource.clone(),
                    })?;
                let prefix_name = lookup_name(p);
                let variable = parent_variable(parent_routes, &prefix_name);
                let wildcard_actions: HashSet<String> = p.wildcard_actions.iter().map(|a| canonical_action(a)).collect();
                // Ancestor segments share this resource's wildcard eligibility.
                for (name, _) in by_name
                    .get(&p.resource)
                    .map(|i| resources[*i].path_variables.iter())
                    .into_iter()
                    .flatten()
                {
                    path_variables.insert(
                        name.clone(),
                        PathVariable {
                            field: None,
                            wildcard_actions: wildcard_actions.clone(),
                        },
                    );
                }
                let routes = nest(
                    parent_routes,
                    &prefix_name,
                    ChildResource {
                        name: &r.name,
                        path_segment: &r.path_segment,
                        kind,
                        lookup: &lookup,
                        actions: &actions,
                    },
                )?;
                fields.push(parent_field(p));
                path_variables.insert(
                    variable.clone(),
                    PathVariable {
                        field: Some(p.field.clone()),
                        wildcard_actions,
                    },
                );
                let link = ParentLink {
                    resource: p.resource.clone(),
                    field: p.field.clone(),
                    variable,
                };
                (routes, Some(link))
            }
        };
        for f in &r.fields {
            fields.push(field_spec(&r.name, f)?);
        }

        let columns: Vec<String> = std::iter::once(ID_FIELD.to_string())
            .chain(fields.iter().map(|f| f.name.clone()))
            .collect();
        let batch_get = r
            .batch_get
            .as_ref()
            .map(|b| -> Result<BatchGetSpec, ConfigError> {
                Ok(BatchGetSpec {
                    param: b.param.clone(),
                    value_pattern: regex::Regex::new(&b.value_pattern).map_err(|source| {
                        ConfigError::InvalidPattern {
                            resource: r.name.clone(),
                            source,
                        }
                    })?,
                    limit: b.limit,
                    lookup_field: b.lookup_field.clone(),
                })
            })
            .transpose()?;
        let singletons = config
            .resources
            .iter()
            .filter_map(|child| {
                let p = child.parent.as_ref()?;
                (p.resource == r.name && p.kind == NestingKind::Singleton)
                    .then(|| (child.name.clone(), p.initial.clone().unwrap_or_default()))
            })
            .collect();

        let index = resources.len();
        matcher.add(index, &routes)?;
        tracing::debug!(resource = %r.name, routes = routes.routes.len(), "resolved resource");
        resources.push(ResolvedResource {
            name: r.name.clone(),
            table_name: r.table_name(),
            path_segment: r.path_segment.clone(),
            kind,
            parent,
            default_ordering: default_ordering(r, &columns),
            fields,
            actions,
            validate_only_actions: r.validate_only_actions.iter().map(|a| canonical_action(a)).collect(),
            path_variables,
            ordering_fields: r.ordering_fields.clone(),
            search_filters: r
                .search_filters
                .iter()
                .map(|s| SearchSpec {
                    param: s.param.clone(),
                    field: s.field.clone().unwrap_or_else(|| s.param.clone()),
                    lookup: s.lookup,
                })
                .collect(),
            batch_get,
            pagination: r.pagination,
            unique_together: r.unique_together.clone(),
            routes,
            dependents: dependents_of(&r.name, config),
            singletons,
        });
        by_name.insert(r.name.clone(), index);
    }

    tracing::info!(resources = resources.len(), patterns = matcher.len(), "resource model resolved");
    Ok(ResolvedModel {
        resources,
        by_name,
        matcher,
    })
}
