//! Query filter stages. Each stage narrows or orders the query for one request.

use crate::config::{ResolvedResource, SearchLookup};
use crate::error::{AppError, FieldErrors};
use crate::routing::FilterKind;
use crate::store::{Condition, OrderTerm, Query};
use std::collections::{BTreeMap, HashMap};

pub const ORDERING_PARAM: &str = "ordering";

/// Everything a stage may read about the request.
pub struct FilterInput<'a> {
    pub resource: &'a ResolvedResource,
    pub action: &'a str,
    pub params: &'a HashMap<String, String>,
    pub path_values: &'a BTreeMap<String, String>,
}

pub trait FilterStage: Send + Sync {
    fn filter(&self, input: &FilterInput<'_>, query: Query) -> Result<Query, AppError>;
}

/// Parse `field` / `field desc` terms separated by commas, dropping unknown fields.
pub fn parse_ordering(expr: &str, valid_fields: &[String]) -> Vec<OrderTerm> {
    expr.split(',')
        .filter_map(|term| {
            let mut words = term.split_whitespace();
            let field = words.next()?;
            let descending = match (words.next(), words.next()) {
                (None, _) => false,
                (Some(dir), None) if dir.eq_ignore_ascii_case("desc") => true,
                _ => return None,
            };
            valid_fields
                .iter()
                .any(|f| f == field)
                .then(|| OrderTerm {
                    field: field.to_string(),
                    descending,
                })
        })
        .collect()
}

/// `?ordering=title desc,id`. With no valid term the query keeps its default ordering.
pub struct OrderingFilter;

impl FilterStage for OrderingFilter {
    fn filter(&self, input: &FilterInput<'_>, mut query: Query) -> Result<Query, AppError> {
        if let Some(expr) = input.params.get(ORDERING_PARAM) {
            let terms = parse_ordering(expr, &input.resource.ordering_fields);
            if !terms.is_empty() {
                query.ordering = terms;
            }
        }
        Ok(query)
    }
}

/// `?valueList=1,2,3`: an IN filter on the lookup field. Values not matching the
/// configured pattern are dropped; a missing list or one over the cap is a validation error.
pub struct BatchGetFilter;

impl FilterStage for BatchGetFilter {
    fn filter(&self, input: &FilterInput<'_>, query: Query) -> Result<Query, AppError> {
        let spec = input
            .resource
            .batch_get
            .as_ref()
            .ok_or_else(|| AppError::Internal(format!("{} has no batch get configuration", input.resource.name)))?;
        let values: Vec<&str> = input
            .params
            .get(&spec.param)
            .map(|csv| {
                csv.split(',')
                    .map(str::trim)
                    .filter(|v| spec.value_pattern.is_match(v))
                    .collect()
            })
            .unwrap_or_default();
        if values.is_empty() {
            return Err(AppError::Validation(FieldErrors::single(
                spec.param.clone(),
                "required query string.",
            )));
        }
        if values.len() > spec.limit {
            return Err(AppError::Validation(FieldErrors::single(
                spec.param.clone(),
                format!(
                    "Over batch get limit count. (input={}, allow={})",
                    values.len(),
                    spec.limit
                ),
            )));
        }
        let values = values
            .into_iter()
            .map(|v| input.resource.coerce(&spec.lookup_field, v))
            .collect();
        Ok(query.filter(Condition::In {
            field: spec.lookup_field.clone(),
            values,
        }))
    }
}

/// Declared query parameters mapped to exact or case-insensitive substring matches.
pub struct SearchFilter;

impl FilterStage for SearchFilter {
    fn filter(&self, input: &FilterInput<'_>, mut query: Query) -> Result<Query, AppError> {
        for search in &input.resource.search_filters {
            let Some(raw) = input.params.get(&search.param).filter(|v| !v.is_empty()) else {
                continue;
            };
            let condition = match search.lookup {
                SearchLookup::Exact => Condition::eq(search.field.clone(), input.resource.coerce(&search.field, raw)),
                SearchLookup::IContains => Condition::IContains {
                    field: search.field.clone(),
                    value: raw.clone(),
                },
            };
            query = query.filter(condition);
        }
        Ok(query)
    }
}

/// Scopes by parent path variables, skipping the wildcard.
pub struct PathVariableFilter;

impl FilterStage for PathVariableFilter {
    fn filter(&self, input: &FilterInput<'_>, query: Query) -> Result<Query, AppError> {
        let resource = input.resource;
        Ok(resource
            .path_variables
            .apply(query, input.path_values, |field, raw| resource.coerce(field, raw)))
    }
}

pub fn stage(kind: FilterKind) -> &'static dyn FilterStage {
    match kind {
        FilterKind::Ordering => &OrderingFilter,
        FilterKind::BatchGet => &BatchGetFilter,
        FilterKind::Search => &SearchFilter,
        FilterKind::PathVariable => &PathVariableFilter,
    }
}

/// Run `kinds` in order over `query`.
pub fn run(kinds: &[FilterKind], input: &FilterInput<'_>, query: Query) -> Result<Query, AppError> {
    kinds
        .iter()
        .try_fold(query, |q, kind| stage(*kind).filter(input, q))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Vec<String> {
        vec!["id".into(), "title".into()]
    }

    #[test]
    fn ordering_grammar() {
        assert_eq!(
            parse_ordering("title desc, id", &fields()),
            vec![OrderTerm::desc("title"), OrderTerm::asc("id")]
        );
        assert_eq!(parse_ordering("secret, title", &fields()), vec![OrderTerm::asc("title")]);
        assert_eq!(parse_ordering("title sideways", &fields()), vec![]);
        assert_eq!(parse_ordering("", &fields()), vec![]);
    }
}
