//! HTTP handlers: the resource dispatcher and the standard operations behind it.

pub mod dispatch;
pub mod resource;

use crate::config::ResolvedResource;
use crate::error::AppError;
use crate::pipeline::{filters, FilterInput, ValidateOnlyContext};
use crate::routing::{Action, ActionKind, FilterKind, ResourceKind, StandardAction};
use crate::service::CrudService;
use crate::state::AppState;
use crate::store::{Condition, Query};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub use dispatch::dispatch;

/// Everything a handler needs about one matched request.
pub struct RequestContext<'a> {
    pub state: &'a AppState,
    pub resource: &'a ResolvedResource,
    pub action: &'a Action,
    pub params: &'a HashMap<String, String>,
    pub path_values: &'a BTreeMap<String, String>,
    pub validate_only: ValidateOnlyContext,
}

impl RequestContext<'_> {
    /// Stages run for this action. Parent scoping always comes first.
    pub fn filter_kinds(&self) -> Vec<FilterKind> {
        let mut kinds = vec![FilterKind::PathVariable];
        match &self.action.kind {
            ActionKind::Standard(StandardAction::List) => {
                kinds.extend([FilterKind::Search, FilterKind::Ordering]);
            }
            ActionKind::Standard(_) => {}
            ActionKind::Custom { filters, .. } => {
                kinds.extend(filters.iter().copied().filter(|k| *k != FilterKind::PathVariable));
            }
        }
        kinds
    }

    /// Query over the rows this action may see, default ordering applied.
    /// Not found when a concrete ancestor in the path does not exist.
    pub async fn scoped_query(&self) -> Result<Query, AppError> {
        let ancestors = CrudService::new(self.state.store.as_ref(), &self.state.model)
            .check_ancestors(self.resource, self.path_values)
            .await?;
        let input = FilterInput {
            resource: self.resource,
            action: &self.action.name,
            params: self.params,
            path_values: self.path_values,
        };
        let base = Query {
            conditions: ancestors.into_iter().collect(),
            ordering: self.resource.default_ordering.clone(),
            ..Query::new()
        };
        filters::run(&self.filter_kinds(), &input, base)
    }

    /// Query for the single object addressed by the path. A singleton is found by its parent alone.
    pub async fn object_query(&self) -> Result<Query, AppError> {
        let query = self.scoped_query().await?;
        if self.resource.kind == ResourceKind::Singleton {
            return Ok(query);
        }
        let raw = self
            .path_values
            .get(&self.resource.routes.lookup.url_kwarg)
            .ok_or_else(AppError::route_not_found)?;
        let field = self.resource.lookup_field();
        Ok(query.filter(Condition::eq(field, self.resource.coerce(field, raw))))
    }

    /// Parent field and id bound from the path, for creating under a concrete parent.
    pub fn parent_binding(&self) -> Result<Option<(String, Value)>, AppError> {
        let Some(link) = &self.resource.parent else {
            return Ok(None);
        };
        let raw = self.path_values.get(&link.variable).ok_or_else(AppError::route_not_found)?;
        Ok(Some((link.field.clone(), self.resource.coerce(&link.field, raw))))
    }

    /// Fields the action may write; `None` for the resource's own writable set.
    pub fn writable_fields(&self) -> Option<&[String]> {
        match &self.action.kind {
            ActionKind::Custom { writable_fields, .. } => writable_fields.as_deref(),
            ActionKind::Standard(_) => None,
        }
    }
}
