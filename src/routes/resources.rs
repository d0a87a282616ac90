//! Resource routes. Paths are matched by the compiled route tables rather than
//! axum's router, so the whole API prefix goes to one fallback handler.

use crate::handlers::dispatch;
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, Router};
use tower_http::limit::RequestBodyLimitLayer;

pub fn resource_routes(state: AppState) -> Router {
    let limit = state.settings.body_limit_bytes;
    Router::new()
        .fallback(dispatch)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(limit))
        .with_state(state)
}
