//! Nesting resolver: places a child resource's routes under a parent's detail path.

use crate::error::ConfigError;
use crate::routing::action::Action;
use crate::routing::route::{build_routes_with_prefix, Lookup, ResourceKind, RouteTable};

/// What the child contributes: its own segment, kind, lookup, and actions.
#[derive(Clone, Copy, Debug)]
pub struct ChildResource<'a> {
    pub name: &'a str,
    pub path_segment: &'a str,
    pub kind: ResourceKind,
    pub lookup: &'a Lookup,
    pub actions: &'a [Action],
}

/// Name of the path variable carrying the parent identifier, e.g. `collection_pk`.
pub fn parent_variable(parent: &RouteTable, parent_lookup_name: &str) -> String {
    format!("{}_{}", parent_lookup_name, parent.lookup.url_kwarg)
}

/// Nest `child` under `parent`. The result can itself be a parent, so nesting composes.
pub fn nest(
    parent: &RouteTable,
    parent_lookup_name: &str,
    child: ChildResource<'_>,
) -> Result<RouteTable, ConfigError> {
    if parent.kind == ResourceKind::Singleton {
        return Err(ConfigError::Validation(format!(
            "resource {} cannot nest under singleton {}",
            child.name, parent.resource
        )));
    }
    let variable = parent_variable(parent, parent_lookup_name);
    if variable == child.lookup.url_kwarg {
        return Err(ConfigError::Validation(format!(
            "resource {}: lookup name '{}' collides with the parent path variable",
            child.name, variable
        )));
    }
    let prefix = format!(
        "{}/{}/{}",
        parent.prefix,
        parent.lookup.capture(&format!("{}_", parent_lookup_name)),
        regex::escape(child.path_segment)
    );
    build_routes_with_prefix(child.name, prefix, child.kind, child.lookup, child.actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::action::{ActionKind, HttpMethod, StandardAction};
    use crate::routing::route::build_routes;

    fn actions(list: &[StandardAction]) -> Vec<Action> {
        list.iter().map(|a| Action::standard(*a)).collect()
    }

    fn parent() -> RouteTable {
        build_routes(
            "collection",
            "collections",
            ResourceKind::Collection,
            &Lookup::default(),
            &actions(&StandardAction::ALL),
        )
        .unwrap()
    }

    #[test]
    fn nested_collection_prefixes_parent_capture() {
        let parent = parent();
        let child_actions = actions(&StandardAction::ALL);
        let lookup = Lookup::default();
        let table = nest(
            &parent,
            "collection",
            ChildResource {
                name: "nested-collection",
                path_segment: "nested-collections",
                kind: ResourceKind::Collection,
                lookup: &lookup,
                actions: &child_actions,
            },
        )
        .unwrap();
        assert_eq!(parent_variable(&parent, "collection"), "collection_pk");
        let list = table.find(HttpMethod::Get, "list").unwrap();
        assert_eq!(
            list.path_pattern,
            "^collections/(?P<collection_pk>[^/.:]+)/nested\\-collections/?$"
        );
        let detail = table.find(HttpMethod::Delete, "destroy").unwrap();
        assert_eq!(
            detail.path_pattern,
            "^collections/(?P<collection_pk>[^/.:]+)/nested\\-collections/(?P<pk>[^/.:]+)/?$"
        );
    }

    #[test]
    fn nested_singleton_has_no_child_lookup() {
        let parent = parent();
        let mut child_actions = actions(&[StandardAction::Retrieve, StandardAction::Replace, StandardAction::Modify]);
        child_actions.push(Action {
            name: "reset".into(),
            methods: vec![HttpMethod::Post],
            detail: true,
            custom_method: true,
            url_path: "reset".into(),
            kind: ActionKind::Custom {
                delegate: StandardAction::Replace,
                filters: vec![],
                writable_fields: None,
            },
        });
        let lookup = Lookup::default();
        let table = nest(
            &parent,
            "collection",
            ChildResource {
                name: "settings",
                path_segment: "settings",
                kind: ResourceKind::Singleton,
                lookup: &lookup,
                actions: &child_actions,
            },
        )
        .unwrap();
        let methods: Vec<HttpMethod> = table
            .routes
            .iter()
            .filter(|r| !r.is_custom_method)
            .map(|r| r.http_method)
            .collect();
        assert_eq!(methods, vec![HttpMethod::Get, HttpMethod::Put, HttpMethod::Patch]);
        let reset = table.find(HttpMethod::Post, "reset").unwrap();
        assert_eq!(reset.path_pattern, "^collections/(?P<collection_pk>[^/.:]+)/settings:reset/?$");
    }

    #[test]
    fn nesting_composes() {
        let parent = parent();
        let all = actions(&StandardAction::ALL);
        let lookup = Lookup::default();
        let child = nest(
            &parent,
            "collection",
            ChildResource {
                name: "item",
                path_segment: "items",
                kind: ResourceKind::Collection,
                lookup: &lookup,
                actions: &all,
            },
        )
        .unwrap();
        let grandchild = nest(
            &child,
            "item",
            ChildResource {
                name: "note",
                path_segment: "notes",
                kind: ResourceKind::Collection,
                lookup: &lookup,
                actions: &all,
            },
        )
        .unwrap();
        let list = grandchild.find(HttpMethod::Get, "list").unwrap();
        assert_eq!(
            list.path_pattern,
            "^collections/(?P<collection_pk>[^/.:]+)/items/(?P<item_pk>[^/.:]+)/notes/?$"
        );
    }

    #[test]
    fn lookup_collision_rejected() {
        let parent = parent();
        let all = actions(&StandardAction::ALL);
        let lookup = Lookup::new("collection_pk", None);
        let err = nest(
            &parent,
            "collection",
            ChildResource {
                name: "item",
                path_segment: "items",
                kind: ResourceKind::Collection,
                lookup: &lookup,
                actions: &all,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
