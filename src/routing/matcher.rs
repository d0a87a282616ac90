//! Compiled route matching for the dispatcher.

use crate::error::{AppError, ConfigError};
use crate::routing::action::HttpMethod;
use crate::routing::route::RouteTable;
use regex::Regex;
use std::collections::BTreeMap;

struct CompiledPattern {
    regex: Regex,
    resource: usize,
    handlers: Vec<(HttpMethod, String)>,
}

/// One matched request: which resource, which handler, and the captured path variables.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub resource: usize,
    pub handler_name: &'a str,
    pub path_values: BTreeMap<String, String>,
}

/// Patterns in registration order; the first pattern that matches the path wins.
#[derive(Default)]
pub struct RouteMatcher {
    patterns: Vec<CompiledPattern>,
}

impl RouteMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: usize, table: &RouteTable) -> Result<(), ConfigError> {
        for route in &table.routes {
            if let Some(existing) = self
                .patterns
                .iter_mut()
                .find(|p| p.regex.as_str() == route.path_pattern)
            {
                if existing.resource != resource
                    || existing.handlers.iter().any(|(m, _)| *m == route.http_method)
                {
                    return Err(ConfigError::DuplicateRoute {
                        resource: table.resource.clone(),
                        method: route.http_method,
                        pattern: route.path_pattern.clone(),
                    });
                }
                existing
                    .handlers
                    .push((route.http_method, route.handler_name.clone()));
                continue;
            }
            let regex = Regex::new(&route.path_pattern).map_err(|source| ConfigError::InvalidPattern {
                resource: table.resource.clone(),
                source,
            })?;
            self.patterns.push(CompiledPattern {
                regex,
                resource,
                handlers: vec![(route.http_method, route.handler_name.clone())],
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Methods served by the first pattern matching `path`, sorted; `None` when nothing matches.
    pub fn allowed_methods(&self, path: &str) -> Option<Vec<HttpMethod>> {
        self.patterns.iter().find(|p| p.regex.is_match(path)).map(|p| {
            let mut allowed: Vec<HttpMethod> = p.handlers.iter().map(|(m, _)| *m).collect();
            allowed.sort();
            allowed
        })
    }

    /// Resolve a path relative to the API prefix (no leading slash).
    /// No pattern → not found; pattern without the method → method not allowed.
    pub fn resolve(&self, method: HttpMethod, path: &str) -> Result<RouteMatch<'_>, AppError> {
        for pattern in &self.patterns {
            let Some(caps) = pattern.regex.captures(path) else {
                continue;
            };
            let Some((_, handler)) = pattern.handlers.iter().find(|(m, _)| *m == method) else {
                let mut allowed: Vec<HttpMethod> = pattern.handlers.iter().map(|(m, _)| *m).collect();
                allowed.sort();
                return Err(AppError::MethodNotAllowed(allowed));
            };
            let path_values = pattern
                .regex
                .capture_names()
                .flatten()
                .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
                .collect();
            return Ok(RouteMatch {
                resource: pattern.resource,
                handler_name: handler.as_str(),
                path_values,
            });
        }
        Err(AppError::route_not_found())
    }
}
