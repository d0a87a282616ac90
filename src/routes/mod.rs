//! Router assembly: common probes plus the resource dispatcher.

pub mod common;
pub mod resources;

pub use common::{common_routes, common_routes_with_ready};
pub use resources::resource_routes;

use crate::state::AppState;
use axum::Router;

/// Full application router.
pub fn app(state: AppState) -> Router {
    common_routes_with_ready(state.clone()).merge(resource_routes(state))
}
