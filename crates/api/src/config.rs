//! Process configuration read from the environment.

use std::net::SocketAddr;

use thiserror::Error;

use salesdesk_observability::LogFormat;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not valid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl ToString) -> Self {
        Self::Invalid {
            var,
            reason: reason.to_string(),
        }
    }
}

/// Where orders and catalog entries live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// Process-local maps; everything is lost on restart.
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub storage: StorageConfig,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// `BIND_ADDR`, `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`, `LOG_FORMAT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("BIND_ADDR", e))?;

        let storage = match lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
            None => StorageConfig::InMemory,
            Some(database_url) => {
                let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
                    None => DEFAULT_MAX_CONNECTIONS,
                    Some(raw) => match raw.trim().parse::<u32>() {
                        Ok(0) => return Err(ConfigError::invalid("DATABASE_MAX_CONNECTIONS", "must be positive")),
                        Ok(n) => n,
                        Err(e) => return Err(ConfigError::invalid("DATABASE_MAX_CONNECTIONS", e)),
                    },
                };
                StorageConfig::Postgres {
                    database_url,
                    max_connections,
                }
            }
        };

        let log_format = match lookup("LOG_FORMAT") {
            None => LogFormat::default(),
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|e| ConfigError::invalid("LOG_FORMAT", e))?,
        };

        Ok(Self {
            bind_addr,
            storage,
            log_format,
        })
    }
}
