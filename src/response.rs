//! Standard response envelope helpers.

use crate::pipeline::PageMeta;
use crate::store::Record;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
}

#[derive(Serialize)]
pub struct SuccessPage<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

pub fn success_one(status: StatusCode, data: Record) -> Response {
    (status, Json(SuccessOne { data })).into_response()
}

pub fn success_page(data: Vec<Record>, meta: PageMeta) -> Response {
    (StatusCode::OK, Json(SuccessPage { data, meta })).into_response()
}

/// Validate-only success and deletes: no body.
pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
