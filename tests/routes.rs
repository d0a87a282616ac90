//! Route table properties over the resolved fixture model.

use resource_sdk::routing::{HttpMethod, ResourceKind};
use resource_sdk::{load_from_str, resolve, ConfigError, ResolvedModel};
use serde_json::json;
use std::collections::HashSet;

const FIXTURE: &str = include_str!("fixtures/resources.json");

fn model() -> ResolvedModel {
    resolve(&load_from_str(FIXTURE).unwrap()).unwrap()
}

#[test]
fn one_route_per_declared_method() {
    let model = model();
    for resource in &model.resources {
        let expected: usize = resource.actions.iter().map(|a| a.methods.len()).sum();
        assert_eq!(resource.routes.routes.len(), expected, "{}", resource.name);

        let mut seen = HashSet::new();
        for route in &resource.routes.routes {
            assert!(
                seen.insert((route.http_method, route.path_pattern.clone())),
                "duplicate {} {}",
                route.http_method,
                route.path_pattern
            );
        }
        for action in &resource.actions {
            for method in &action.methods {
                assert!(resource.routes.find(*method, &action.name).is_some(), "{} {}", resource.name, action.name);
            }
        }
    }
}

#[test]
fn custom_methods_never_share_standard_patterns() {
    let model = model();
    for resource in &model.resources {
        let standard: HashSet<&str> = resource
            .routes
            .routes
            .iter()
            .filter(|r| !r.is_custom_method)
            .map(|r| r.path_pattern.as_str())
            .collect();
        for route in resource.routes.routes.iter().filter(|r| r.is_custom_method) {
            assert!(!standard.contains(route.path_pattern.as_str()), "{}", route.path_pattern);
        }
    }
}

#[test]
fn nested_and_singleton_patterns() {
    let model = model();
    let nested = model.resource("nested-collection").unwrap();
    assert_eq!(
        nested.routes.find(HttpMethod::Post, "move").unwrap().path_pattern,
        r"^collections/(?P<collection_pk>[^/.:]+)/nested\-collections/(?P<pk>[^/.:]+):move/?$"
    );
    assert!(nested.path_variables.get("collection_pk").is_some());

    let singleton = model.resource("nested-resource").unwrap();
    assert_eq!(singleton.kind, ResourceKind::Singleton);
    let patterns: HashSet<&str> = singleton.routes.routes.iter().map(|r| r.path_pattern.as_str()).collect();
    assert_eq!(patterns.len(), 1);
    let methods: Vec<HttpMethod> = singleton.routes.routes.iter().map(|r| r.http_method).collect();
    assert_eq!(methods, vec![HttpMethod::Get, HttpMethod::Put, HttpMethod::Patch]);
}

#[test]
fn matcher_resolves_every_route_shape() {
    let model = model();
    let cases = [
        (HttpMethod::Get, "collections", "collection", "list"),
        (HttpMethod::Get, "collections:batchGet", "collection", "batch_get"),
        (HttpMethod::Get, "collections:search", "collection", "search"),
        (HttpMethod::Delete, "collections/4", "collection", "destroy"),
        (HttpMethod::Get, "collections/-/nested-collections", "nested-collection", "list"),
        (HttpMethod::Post, "collections/1/nested-collections/2:move", "nested-collection", "move"),
        (HttpMethod::Put, "collections/1/nested-resources", "nested-resource", "replace"),
    ];
    for (method, path, resource, action) in cases {
        let hit = model.matcher.resolve(method, path).unwrap();
        assert_eq!(model.resources[hit.resource].name, resource, "{}", path);
        assert_eq!(hit.handler_name, action, "{}", path);
    }
}

#[test]
fn patch_custom_method_fails_at_startup() {
    let config = load_from_str(
        &json!({"resources": [
            {"name": "collection", "path_segment": "collections",
             "fields": [{"name": "title", "type": "string"}],
             "actions": ["retrieve"],
             "custom_actions": [{"name": "touch", "methods": ["PATCH"], "detail": true,
                                 "custom_method": true, "delegate": "modify"}]}
        ]})
        .to_string(),
    )
    .unwrap();
    assert!(matches!(resolve(&config), Err(ConfigError::PatchCustomMethod { .. })));
}

#[test]
fn wildcard_create_fails_at_startup() {
    let config = load_from_str(
        &json!({"resources": [
            {"name": "collection", "path_segment": "collections", "actions": ["create"]},
            {"name": "item", "path_segment": "items", "actions": ["create"],
             "parent": {"resource": "collection", "wildcard_actions": ["create"]}}
        ]})
        .to_string(),
    )
    .unwrap();
    assert!(matches!(resolve(&config), Err(ConfigError::Validation(_))));
}
