use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct OrderServiceConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub run_migrations: bool,
    pub cors_allowed_origins: Vec<String>,
}

pub(crate) fn parse_origins(raw: Option<String>) -> Vec<String> {
    raw.map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_else(|| vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()])
}

impl OrderServiceConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8084);
        let run_migrations = env::var("RUN_MIGRATIONS")
            .ok()
            .and_then(|value| value.parse::<bool>().ok())
            .unwrap_or(true);
        let cors_allowed_origins = parse_origins(env::var("CORS_ALLOWED_ORIGINS").ok());
        Ok(Self { database_url, host, port, run_migrations, cors_allowed_origins })
    }
}
