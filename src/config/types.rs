//! Raw resource declarations as read from JSON.

use crate::routing::{FilterKind, HttpMethod, StandardAction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    /// Identifier of a row in another resource (`references`).
    Reference,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    /// Target resource name for `reference` fields.
    #[serde(default)]
    pub references: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub validation: ValidationRule,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomActionConfig {
    pub name: String,
    #[serde(default = "default_methods")]
    pub methods: Vec<HttpMethod>,
    pub detail: bool,
    /// Render as `resource:urlPath` instead of `resource/urlPath`.
    #[serde(default)]
    pub custom_method: bool,
    /// Defaults to the camelCase form of `name`.
    #[serde(default)]
    pub url_path: Option<String>,
    pub delegate: StandardAction,
    #[serde(default)]
    pub filters: Vec<FilterKind>,
    #[serde(default)]
    pub writable_fields: Option<Vec<String>>,
}

fn default_methods() -> Vec<HttpMethod> {
    vec![HttpMethod::Get]
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NestingKind {
    #[default]
    Collection,
    Singleton,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParentConfig {
    pub resource: String,
    #[serde(default)]
    pub kind: NestingKind,
    /// Field on the child holding the parent id.
    #[serde(default = "default_parent_field")]
    pub field: String,
    /// Prefix of the parent path variable (`{lookup}_pk`). Defaults to the parent's name.
    #[serde(default)]
    pub lookup: Option<String>,
    /// Actions that accept `-` as the parent identifier.
    #[serde(default)]
    pub wildcard_actions: Vec<String>,
    /// Values for the singleton child created with each parent. `{parent_pk}` is substituted in strings.
    #[serde(default)]
    pub initial: Option<serde_json::Map<String, serde_json::Value>>,
}

fn default_parent_field() -> String {
    "parent".into()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchLookup {
    #[default]
    Exact,
    IContains,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchFilterConfig {
    /// Query parameter name, e.g. `title__contains`.
    pub param: String,
    /// Field to filter; defaults to `param`.
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub lookup: SearchLookup,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchGetConfig {
    #[serde(default = "default_batch_param")]
    pub param: String,
    #[serde(default = "default_batch_pattern")]
    pub value_pattern: String,
    #[serde(default = "default_batch_limit")]
    pub limit: usize,
    #[serde(default = "default_batch_lookup")]
    pub lookup_field: String,
}

fn default_batch_param() -> String {
    "valueList".into()
}

fn default_batch_pattern() -> String {
    "^[0-9]+$".into()
}

fn default_batch_limit() -> usize {
    200
}

fn default_batch_lookup() -> String {
    "id".into()
}

impl Default for BatchGetConfig {
    fn default() -> Self {
        BatchGetConfig {
            param: default_batch_param(),
            value_pattern: default_batch_pattern(),
            limit: default_batch_limit(),
            lookup_field: default_batch_lookup(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
}

fn default_page_size() -> u64 {
    100
}

fn default_max_page_size() -> u64 {
    500
}

impl Default for PaginationConfig {
    fn default() -> Self {
        PaginationConfig {
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_url_kwarg")]
    pub url_kwarg: String,
    /// Overrides the default `[^/.:]+` identifier capture.
    #[serde(default)]
    pub value_pattern: Option<String>,
}

fn default_url_kwarg() -> String {
    "pk".into()
}

impl Default for LookupConfig {
    fn default() -> Self {
        LookupConfig {
            url_kwarg: default_url_kwarg(),
            value_pattern: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub path_segment: String,
    /// Storage table; defaults to `name` with dashes replaced by underscores.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    /// Standard actions by name (`list`, `create`, `retrieve`, `replace`/`update`, `modify`/`partial_update`, `destroy`).
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub custom_actions: Vec<CustomActionConfig>,
    #[serde(default)]
    pub validate_only_actions: Vec<String>,
    #[serde(default)]
    pub ordering_fields: Vec<String>,
    /// Same grammar as the `ordering` parameter, e.g. `id desc`.
    #[serde(default)]
    pub default_ordering: Option<String>,
    #[serde(default)]
    pub search_filters: Vec<SearchFilterConfig>,
    #[serde(default)]
    pub batch_get: Option<BatchGetConfig>,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub parent: Option<ParentConfig>,
    #[serde(default)]
    pub unique_together: Vec<Vec<String>>,
}

impl ResourceConfig {
    pub fn table_name(&self) -> String {
        self.table
            .clone()
            .unwrap_or_else(|| self.name.replace('-', "_"))
    }
}

/// All declarations in one struct for in-memory loading.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullConfig {
    pub resources: Vec<ResourceConfig>,
}

impl FullConfig {
    pub fn by_name(&self) -> HashMap<&str, &ResourceConfig> {
        self.resources.iter().map(|r| (r.name.as_str(), r)).collect()
    }
}
