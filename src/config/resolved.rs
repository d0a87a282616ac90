//! Resolved resource model: declarations validated and flattened for runtime use.

use crate::config::{FieldType, PaginationConfig, SearchLookup, ValidationRule};
use crate::pipeline::PathVariableConfig;
use crate::routing::{Action, ResourceKind, RouteMatcher, RouteTable};
use crate::store::OrderTerm;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Primary key column of every resource table.
pub const ID_FIELD: &str = "id";

#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub references: Option<String>,
    pub read_only: bool,
    pub nullable: bool,
    pub default: Option<Value>,
    pub validation: ValidationRule,
    /// `validation.pattern`, compiled at startup.
    pub pattern: Option<Regex>,
}

impl FieldSpec {
    /// Required on full writes unless a rule says otherwise; nullable or defaulted fields are optional.
    pub fn required(&self) -> bool {
        self.validation
            .required
            .unwrap_or(!self.nullable && self.default.is_none())
    }
}

/// The parent link of a nested resource.
#[derive(Clone, Debug)]
pub struct ParentLink {
    pub resource: String,
    /// Field on this resource holding the parent id.
    pub field: String,
    /// Path variable carrying the parent id, e.g. `collection_pk`.
    pub variable: String,
}

/// Rows in `table` whose `field` points at a deleted row are deleted too, recursively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dependent {
    pub table: String,
    pub field: String,
    pub dependents: Vec<Dependent>,
}

#[derive(Clone, Debug)]
pub struct SearchSpec {
    pub param: String,
    pub field: String,
    pub lookup: SearchLookup,
}

#[derive(Clone, Debug)]
pub struct BatchGetSpec {
    pub param: String,
    pub value_pattern: Regex,
    pub limit: usize,
    pub lookup_field: String,
}

#[derive(Clone, Debug)]
pub struct ResolvedResource {
    pub name: String,
    pub table_name: String,
    pub path_segment: String,
    pub kind: ResourceKind,
    pub parent: Option<ParentLink>,
    pub fields: Vec<FieldSpec>,
    pub actions: Vec<Action>,
    pub validate_only_actions: HashSet<String>,
    pub path_variables: PathVariableConfig,
    pub ordering_fields: Vec<String>,
    pub default_ordering: Vec<OrderTerm>,
    pub search_filters: Vec<SearchSpec>,
    pub batch_get: Option<BatchGetSpec>,
    pub pagination: PaginationConfig,
    pub unique_together: Vec<Vec<String>>,
    pub routes: RouteTable,
    pub dependents: Vec<Dependent>,
    /// Singleton children created alongside each new row: (resource name, initial values).
    pub singletons: Vec<(String, serde_json::Map<String, Value>)>,
}

impl ResolvedResource {
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field matched by the detail identifier: a declared field named like the lookup kwarg, else `id`.
    pub fn lookup_field(&self) -> &str {
        let kwarg = self.routes.lookup.url_kwarg.as_str();
        if self.field(kwarg).is_some() {
            kwarg
        } else {
            ID_FIELD
        }
    }

    pub fn is_validate_only_action(&self, action: &str) -> bool {
        self.validate_only_actions.contains(action)
    }

    /// All stored columns, `id` first.
    pub fn column_names(&self) -> Vec<&str> {
        std::iter::once(ID_FIELD)
            .chain(self.fields.iter().map(|f| f.name.as_str()))
            .collect()
    }

    /// Convert raw path or query text into the value type of `field`.
    /// Text that does not parse stays a string, so it simply matches nothing.
    pub fn coerce(&self, field: &str, raw: &str) -> Value {
        let field_type = if field == ID_FIELD {
            Some(FieldType::Integer)
        } else {
            self.field(field).map(|f| f.field_type)
        };
        match field_type {
            Some(FieldType::Integer) | Some(FieldType::Reference) => raw
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(raw.to_string())),
            Some(FieldType::Boolean) if raw.eq_ignore_ascii_case("true") => Value::Bool(true),
            Some(FieldType::Boolean) if raw.eq_ignore_ascii_case("false") => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        }
    }
}

pub struct ResolvedModel {
    /// Parents precede their children.
    pub resources: Vec<ResolvedResource>,
    pub by_name: HashMap<String, usize>,
    pub matcher: RouteMatcher,
}

impl ResolvedModel {
    pub fn resource(&self, name: &str) -> Option<&ResolvedResource> {
        self.by_name.get(name).map(|i| &self.resources[*i])
    }
}

impl std::fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("resources", &self.resources.iter().map(|r| &r.name).collect::<Vec<_>>())
            .field("patterns", &self.matcher.len())
            .finish()
    }
}
