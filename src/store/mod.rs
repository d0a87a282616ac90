//! Persistence behind one trait: PostgreSQL in production, memory for tests and local runs.

pub mod builder;
mod memory;
pub mod params;
mod postgres;
pub mod query;

pub use memory::MemoryStore;
pub use params::PgBindValue;
pub use postgres::{ensure_database_exists, PgStore};
pub use query::{compare_values, Condition, OrderTerm, Query, Record};

use crate::config::ResolvedResource;
use crate::error::AppError;
use async_trait::async_trait;

/// Row storage for resolved resources. Every row has an integer `id` assigned on insert.
#[async_trait]
pub trait Store: Send + Sync {
    async fn count(&self, resource: &ResolvedResource, query: &Query) -> Result<u64, AppError>;

    async fn select(&self, resource: &ResolvedResource, query: &Query) -> Result<Vec<Record>, AppError>;

    /// Insert declared fields from `values`; returns the stored row.
    async fn insert(&self, resource: &ResolvedResource, values: Record) -> Result<Record, AppError>;

    /// Overwrite the fields present in `values`. `None` when the row does not exist.
    async fn update(&self, resource: &ResolvedResource, id: i64, values: Record) -> Result<Option<Record>, AppError>;

    /// Delete the row and, recursively, the rows of `resource.dependents` pointing at it.
    async fn delete(&self, resource: &ResolvedResource, id: i64) -> Result<bool, AppError>;

    async fn ping(&self) -> Result<(), AppError>;

    async fn select_one(&self, resource: &ResolvedResource, query: &Query) -> Result<Option<Record>, AppError> {
        let query = Query {
            limit: Some(1),
            ..query.clone()
        };
        Ok(self.select(resource, &query).await?.into_iter().next())
    }
}
