use std::time::Duration;

use thiserror::Error;

use crate::config::{env_string, env_u64};

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub primary_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub ping_timeout: Duration,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, DbConfigError> {
        let primary_url = env_string("DATABASE_URL").ok_or(DbConfigError::Missing {
            key: "DATABASE_URL",
        })?;

        let max_connections = env_u64("DB_MAX_CONNECTIONS")
            .map(|value| value.clamp(1, 100) as u32)
            .unwrap_or(10);

        Ok(Self {
            primary_url,
            max_connections,
            acquire_timeout: Duration::from_millis(env_u64("DB_ACQUIRE_TIMEOUT_MS").unwrap_or(5000)),
            ping_timeout: Duration::from_millis(env_u64("DB_PING_TIMEOUT_MS").unwrap_or(2000)),
        })
    }
}

#[derive(Debug, Error)]
pub enum DbConfigError {
    #[error("missing env var {key}")]
    Missing { key: &'static str },
}
