//! Process settings read from the environment (and `.env` via dotenvy).

use crate::pipeline::validate_only::DEFAULT_PARAM;
use std::net::SocketAddr;

pub const DEFAULT_API_PREFIX: &str = "/api/v1";

#[derive(Clone, Debug)]
pub struct Settings {
    /// Postgres connection string. Without one the in-memory store is used.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub api_prefix: String,
    pub db_schema: String,
    pub validate_only_param: String,
    pub body_limit_bytes: usize,
    pub config_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            api_prefix: DEFAULT_API_PREFIX.into(),
            db_schema: "public".into(),
            validate_only_param: DEFAULT_PARAM.into(),
            body_limit_bytes: 1024 * 1024,
            config_path: "config/resources.json".into(),
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Read settings, falling back to defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Settings::default();
        let bind_addr = var("BIND_ADDR")
            .and_then(|v| match v.parse() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!(value = %v, error = %e, "ignoring invalid BIND_ADDR");
                    None
                }
            })
            .unwrap_or(defaults.bind_addr);
        let body_limit_bytes = var("BODY_LIMIT_BYTES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.body_limit_bytes);
        Settings {
            database_url: var("DATABASE_URL"),
            bind_addr,
            api_prefix: var("API_PREFIX")
                .map(|p| normalize_prefix(&p))
                .unwrap_or(defaults.api_prefix),
            db_schema: var("DB_SCHEMA").unwrap_or(defaults.db_schema),
            validate_only_param: var("VALIDATE_ONLY_PARAM").unwrap_or(defaults.validate_only_param),
            body_limit_bytes,
            config_path: var("CONFIG_PATH").unwrap_or(defaults.config_path),
        }
    }
}

/// Leading slash, no trailing slash. `/` becomes the empty prefix.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_normalization() {
        assert_eq!(normalize_prefix("api/v1/"), "/api/v1");
        assert_eq!(normalize_prefix("/api"), "/api");
        assert_eq!(normalize_prefix("/"), "");
    }
}
