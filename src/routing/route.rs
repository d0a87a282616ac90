//! Route table builder: turns a resource's declared actions into (method, pattern, handler) routes.
//!
//! Patterns are anchored regular expressions relative to the API prefix, e.g.
//! `^collections/(?P<pk>[^/.:]+)/?$`. Collection routes come first, then
//! collection-scoped custom actions, then detail routes, then detail-scoped
//! custom actions; the matcher relies on that order.

use crate::error::ConfigError;
use crate::routing::action::{Action, HttpMethod};
use std::collections::HashSet;

/// Identifier capture: anything except slash, dot, or colon, so `:method` suffixes stay unambiguous.
pub const DEFAULT_LOOKUP_PATTERN: &str = "[^/.:]+";

const TRAILING_SLASH: &str = "/?";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub http_method: HttpMethod,
    pub path_pattern: String,
    pub handler_name: String,
    pub is_detail: bool,
    pub is_custom_method: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Collection,
    /// At most one instance per parent, addressed by the parent identifier.
    Singleton,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lookup {
    /// Path variable name for the identifier (`pk` by default).
    pub url_kwarg: String,
    pub value_pattern: String,
}

impl Lookup {
    pub fn new(url_kwarg: impl Into<String>, value_pattern: Option<&str>) -> Self {
        Lookup {
            url_kwarg: url_kwarg.into(),
            value_pattern: value_pattern.unwrap_or(DEFAULT_LOOKUP_PATTERN).to_string(),
        }
    }

    /// Named capture group, e.g. `(?P<collection_pk>[^/.:]+)` for prefix `collection_`.
    pub fn capture(&self, name_prefix: &str) -> String {
        format!("(?P<{}{}>{})", name_prefix, self.url_kwarg, self.value_pattern)
    }
}

impl Default for Lookup {
    fn default() -> Self {
        Lookup::new("pk", None)
    }
}

/// Routes of one resource plus what a nested child needs to extend them.
#[derive(Clone, Debug)]
pub struct RouteTable {
    pub resource: String,
    /// Unanchored regex fragment for the resource's collection path.
    pub prefix: String,
    pub kind: ResourceKind,
    pub lookup: Lookup,
    pub routes: Vec<Route>,
}

impl RouteTable {
    pub fn find(&self, method: HttpMethod, handler_name: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.http_method == method && r.handler_name == handler_name)
    }
}

fn anchored(path: &str) -> String {
    format!("^{}{}$", path, TRAILING_SLASH)
}

fn action_path(base: &str, action: &Action) -> String {
    let sep = if action.custom_method { ':' } else { '/' };
    format!("{}{}{}", base, sep, regex::escape(&action.url_path))
}

fn push(action: &Action, path: String, routes: &mut Vec<Route>) {
    for method in &action.methods {
        routes.push(Route {
            http_method: *method,
            path_pattern: path.clone(),
            handler_name: action.name.clone(),
            is_detail: action.detail,
            is_custom_method: action.custom_method,
        });
    }
}

fn is_group_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !s.starts_with(|c: char| c.is_ascii_digit())
}

/// Build the route table for a top-level resource mounted at `path_segment`.
pub fn build_routes(
    resource: &str,
    path_segment: &str,
    kind: ResourceKind,
    lookup: &Lookup,
    actions: &[Action],
) -> Result<RouteTable, ConfigError> {
    build_routes_with_prefix(resource, regex::escape(path_segment), kind, lookup, actions)
}

/// Build a route table under an already-resolved prefix fragment (used by nesting).
pub fn build_routes_with_prefix(
    resource: &str,
    prefix: String,
    kind: ResourceKind,
    lookup: &Lookup,
    actions: &[Action],
) -> Result<RouteTable, ConfigError> {
    let invalid = |action: &Action, reason: &str| ConfigError::InvalidAction {
        resource: resource.to_string(),
        action: action.name.clone(),
        reason: reason.to_string(),
    };
    if kind == ResourceKind::Collection && !is_group_name(&lookup.url_kwarg) {
        return Err(ConfigError::Validation(format!(
            "resource {}: lookup name '{}' is not a valid path variable",
            resource, lookup.url_kwarg
        )));
    }

    for action in actions {
        if action.methods.is_empty() {
            return Err(invalid(action, "no HTTP methods declared"));
        }
        if action.is_standard() {
            if kind == ResourceKind::Singleton && !action.operation().allowed_on_singleton() {
                return Err(invalid(action, "singleton resources only support retrieve, replace and modify"));
            }
            continue;
        }
        if action.custom_method && action.methods.contains(&HttpMethod::Patch) {
            return Err(ConfigError::PatchCustomMethod {
                resource: resource.to_string(),
                action: action.name.clone(),
            });
        }
        if action.url_path.is_empty() {
            return Err(invalid(action, "empty url path"));
        }
        if kind == ResourceKind::Singleton && !action.detail {
            return Err(invalid(action, "singleton custom actions must be detail-scoped"));
        }
    }

    let collection_base = prefix.clone();
    let detail_base = match kind {
        ResourceKind::Collection => format!("{}/{}", prefix, lookup.capture("")),
        ResourceKind::Singleton => prefix.clone(),
    };

    let mut routes = Vec::new();

    if kind == ResourceKind::Collection {
        for action in actions.iter().filter(|a| a.is_standard() && !a.detail) {
            push(action, anchored(&collection_base), &mut routes);
        }
        for action in actions.iter().filter(|a| !a.is_standard() && !a.detail) {
            push(action, anchored(&action_path(&collection_base, action)), &mut routes);
        }
    }
    for action in actions.iter().filter(|a| a.is_standard() && a.detail) {
        push(action, anchored(&detail_base), &mut routes);
    }
    for action in actions.iter().filter(|a| !a.is_standard() && a.detail) {
        push(action, anchored(&action_path(&detail_base, action)), &mut routes);
    }

    let mut seen = HashSet::new();
    for route in &routes {
        if !seen.insert((route.http_method, route.path_pattern.as_str())) {
            return Err(ConfigError::DuplicateRoute {
                resource: resource.to_string(),
                method: route.http_method,
                pattern: route.path_pattern.clone(),
            });
        }
        regex::Regex::new(&route.path_pattern).map_err(|source| ConfigError::InvalidPattern {
            resource: resource.to_string(),
            source,
        })?;
    }

    tracing::debug!(resource, routes = routes.len(), "built route table");
    Ok(RouteTable {
        resource: resource.to_string(),
        prefix,
        kind,
        lookup: lookup.clone(),
        routes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::action::{ActionKind, FilterKind, StandardAction};

    fn custom(name: &str, url_path: &str, methods: &[HttpMethod], detail: bool, custom_method: bool) -> Action {
        Action {
            name: name.into(),
            methods: methods.to_vec(),
            detail,
            custom_method,
            url_path: url_path.into(),
            kind: ActionKind::Custom {
                delegate: if detail { StandardAction::Modify } else { StandardAction::List },
                filters: vec![FilterKind::Ordering],
                writable_fields: None,
            },
        }
    }

    fn crud() -> Vec<Action> {
        StandardAction::ALL.iter().map(|a| Action::standard(*a)).collect()
    }

    #[test]
    fn standard_routes_one_per_action() {
        let table = build_routes("collection", "collections", ResourceKind::Collection, &Lookup::default(), &crud()).unwrap();
        assert_eq!(table.routes.len(), 6);
        let list = table.find(HttpMethod::Get, "list").unwrap();
        assert_eq!(list.path_pattern, "^collections/?$");
        assert!(!list.is_detail);
        let modify = table.find(HttpMethod::Patch, "modify").unwrap();
        assert_eq!(modify.path_pattern, "^collections/(?P<pk>[^/.:]+)/?$");
        assert!(modify.is_detail);
    }

    #[test]
    fn custom_methods_use_colon() {
        let mut actions = crud();
        actions.push(custom("batch_get", "batchGet", &[HttpMethod::Get], false, true));
        actions.push(custom("move", "move", &[HttpMethod::Post], true, true));
        actions.push(custom("archive", "archive", &[HttpMethod::Post], true, false));
        let table = build_routes("collection", "collections", ResourceKind::Collection, &Lookup::default(), &actions).unwrap();

        let batch = table.find(HttpMethod::Get, "batch_get").unwrap();
        assert_eq!(batch.path_pattern, "^collections:batchGet/?$");
        assert!(batch.is_custom_method);
        let mv = table.find(HttpMethod::Post, "move").unwrap();
        assert_eq!(mv.path_pattern, "^collections/(?P<pk>[^/.:]+):move/?$");
        let archive = table.find(HttpMethod::Post, "archive").unwrap();
        assert_eq!(archive.path_pattern, "^collections/(?P<pk>[^/.:]+)/archive/?$");

        let standard: HashSet<&str> = table
            .routes
            .iter()
            .filter(|r| !r.is_custom_method)
            .map(|r| r.path_pattern.as_str())
            .collect();
        for r in table.routes.iter().filter(|r| r.is_custom_method) {
            assert!(!standard.contains(r.path_pattern.as_str()));
        }
    }

    #[test]
    fn route_order_collection_before_detail() {
        let mut actions = vec![custom("move", "move", &[HttpMethod::Post], true, true)];
        actions.extend(crud());
        actions.push(custom("search", "search", &[HttpMethod::Get], false, false));
        let table = build_routes("c", "c", ResourceKind::Collection, &Lookup::default(), &actions).unwrap();
        let names: Vec<&str> = table.routes.iter().map(|r| r.handler_name.as_str()).collect();
        assert_eq!(names, vec!["list", "create", "search", "retrieve", "replace", "modify", "destroy", "move"]);
    }

    #[test]
    fn patch_custom_method_rejected() {
        let actions = vec![custom("touch", "touch", &[HttpMethod::Patch], true, true)];
        let err = build_routes("c", "c", ResourceKind::Collection, &Lookup::default(), &actions).unwrap_err();
        assert!(matches!(err, ConfigError::PatchCustomMethod { .. }));
    }

    #[test]
    fn duplicate_route_rejected() {
        let actions = vec![
            custom("a", "same", &[HttpMethod::Post], false, true),
            custom("b", "same", &[HttpMethod::Post], false, true),
        ];
        let err = build_routes("c", "c", ResourceKind::Collection, &Lookup::default(), &actions).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoute { .. }));
    }

    #[test]
    fn singleton_restricted() {
        let err = build_routes("s", "s", ResourceKind::Singleton, &Lookup::default(), &crud()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAction { .. }));

        let actions: Vec<Action> = [StandardAction::Retrieve, StandardAction::Replace, StandardAction::Modify]
            .iter()
            .map(|a| Action::standard(*a))
            .collect();
        let table = build_routes("s", "s", ResourceKind::Singleton, &Lookup::default(), &actions).unwrap();
        assert_eq!(table.routes.len(), 3);
        assert!(table.routes.iter().all(|r| r.path_pattern == "^s/?$"));
    }

    #[test]
    fn lookup_override() {
        let lookup = Lookup::new("slug", Some("[^/]+"));
        let table = build_routes("doc", "docs", ResourceKind::Collection, &lookup, &[Action::standard(StandardAction::Retrieve)]).unwrap();
        assert_eq!(table.routes[0].path_pattern, "^docs/(?P<slug>[^/]+)/?$");
    }
}
