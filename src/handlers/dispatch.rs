//! Single entry point for resource routes: strip the API prefix, match the path
//! against the compiled route tables, then hand off to the operation.

use crate::error::AppError;
use crate::handlers::{resource, RequestContext};
use crate::routing::HttpMethod;
use crate::state::AppState;
use crate::store::Record;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{Method, Uri},
    response::Response,
};
use serde_json::Value;
use std::collections::HashMap;

/// Path below the API prefix without its leading slash; `None` outside the prefix.
fn relative_path<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.strip_prefix('/')
}

/// Empty bodies read as an empty object. Anything else must be a JSON object.
fn parse_body(bytes: &Bytes) -> Result<Record, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Record::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::BadRequest("body must be a JSON object".into())),
        Err(e) => Err(AppError::BadRequest(format!("invalid JSON body: {}", e))),
    }
}

/// Percent-decode one captured path value.
fn decode_segment(raw: &str) -> Result<String, AppError> {
    urlencoding::decode(raw)
        .map(|v| v.into_owned())
        .map_err(|_| AppError::BadRequest(format!("path segment '{}' is not valid UTF-8", raw)))
}

pub async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let path = relative_path(uri.path(), &state.settings.api_prefix).ok_or_else(AppError::route_not_found)?;
    let model = &state.model;
    let Some(method) = HttpMethod::from_http(&method) else {
        return Err(match model.matcher.allowed_methods(path) {
            Some(allowed) => AppError::MethodNotAllowed(allowed),
            None => AppError::route_not_found(),
        });
    };

    let mut hit = model.matcher.resolve(method, path)?;
    for value in hit.path_values.values_mut() {
        *value = decode_segment(value)?;
    }
    let resource = &model.resources[hit.resource];
    let action = resource
        .action(hit.handler_name)
        .ok_or_else(|| AppError::Internal(format!("{} has no action {}", resource.name, hit.handler_name)))?;
    resource.path_variables.authorize(&action.name, &hit.path_values)?;
    tracing::debug!(%method, path, resource = %resource.name, action = %action.name, "dispatch");

    let mut body = if method.has_body() { parse_body(&body)? } else { Record::new() };
    let validate_only = state.interceptor.detect(
        resource.is_validate_only_action(&action.name),
        method,
        &params,
        &mut body,
    );
    let ctx = RequestContext {
        state: &state,
        resource,
        action,
        params: &params,
        path_values: &hit.path_values,
        validate_only,
    };
    resource::handle(ctx, body).await
}
