//! Resource SDK: configuration-driven REST backend with custom methods,
//! nested and singleton resources, and validate-only writes.

pub mod case;
pub mod config;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod pipeline;
pub mod response;
pub mod routes;
pub mod routing;
pub mod service;
pub mod state;
pub mod store;

pub use config::{load_from_path, load_from_str, resolve, resolve_with, FullConfig, ResolvedModel, ResolvedResource, Settings};
pub use error::{AppError, ConfigError};
pub use migration::apply_migrations;
pub use response::{success_one, success_page};
pub use routes::{app, common_routes, common_routes_with_ready, resource_routes};
pub use service::CrudService;
pub use state::AppState;
pub use store::{ensure_database_exists, MemoryStore, PgStore, Store};
