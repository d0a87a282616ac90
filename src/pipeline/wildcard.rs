//! Parent-scoping path variables and the `-` wildcard.

use crate::error::AppError;
use crate::store::{Condition, Query};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Path value meaning "any parent".
pub const WILDCARD: &str = "-";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathVariable {
    /// Field the variable filters on. `None` for an ancestor above the direct
    /// parent, which is scoped through the parent chain instead.
    pub field: Option<String>,
    /// Actions allowed to receive the wildcard.
    pub wildcard_actions: HashSet<String>,
}

/// Path variable name → binding, e.g. `collection_pk` → `parent`. Holds every
/// variable in the resource's URL, ancestors included.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathVariableConfig {
    variables: BTreeMap<String, PathVariable>,
}

impl PathVariableConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, variable: PathVariable) {
        self.variables.insert(name.into(), variable);
    }

    pub fn get(&self, name: &str) -> Option<&PathVariable> {
        self.variables.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PathVariable)> {
        self.variables.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Reject the wildcard for actions that do not allow it. The rejection is the
    /// plain route-not-found error so the wildcard stays invisible to those actions.
    pub fn authorize(&self, action: &str, path_values: &BTreeMap<String, String>) -> Result<(), AppError> {
        for (name, variable) in &self.variables {
            let is_wildcard = path_values.get(name).map(|v| v == WILDCARD).unwrap_or(false);
            if is_wildcard && !variable.wildcard_actions.contains(action) {
                tracing::warn!(action, variable = %name, "wildcard not allowed for action");
                return Err(AppError::route_not_found());
            }
        }
        Ok(())
    }

    /// Add one equality condition per bound variable, skipping wildcard values.
    /// `coerce` converts the raw path text into the field's value type.
    pub fn apply<F>(&self, mut query: Query, path_values: &BTreeMap<String, String>, coerce: F) -> Query
    where
        F: Fn(&str, &str) -> Value,
    {
        for (name, variable) in &self.variables {
            let (Some(field), Some(raw)) = (&variable.field, path_values.get(name)) else {
                continue;
            };
            if raw == WILDCARD {
                continue;
            }
            query = query.filter(Condition::eq(field.clone(), coerce(field, raw)));
        }
        query
    }
}
