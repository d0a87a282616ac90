//! Example consumer: serves the resources declared in `config/resources.json`.
//!
//! Run from this directory: `cargo run`
//! With `DATABASE_URL` set, rows live in Postgres; otherwise in memory.

use resource_sdk::{
    app, apply_migrations, ensure_database_exists, load_from_path, resolve_with, AppState, MemoryStore, PgStore, Settings,
    Store,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("resource_sdk=info,example_consumer=info")),
        )
        .init();

    let settings = Settings::from_env();
    let config = load_from_path(&settings.config_path).await?;
    let model = resolve_with(&config, &settings.validate_only_param)?;

    let store: Arc<dyn Store> = match &settings.database_url {
        Some(database_url) => {
            ensure_database_exists(database_url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let store = PgStore::new(pool, settings.db_schema.clone());
            apply_migrations(&store, &model).await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let bind_addr = settings.bind_addr;
    let prefix = settings.api_prefix.clone();
    let app = app(AppState::new(store, model, settings));
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("listening on http://{}{}", listener.local_addr()?, prefix);
    axum::serve(listener, app).await?;
    Ok(())
}
