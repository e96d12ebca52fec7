use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::store::{DatabaseConfig, DatabaseType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Upper bound for a single API call step
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

impl ExecutionConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 30,
            user_agent: format!("nodeflow/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "nodeflow@localhost".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let defaults = Config::default();
        let config = Config {
            server: ServerConfig {
                addr: std::env::var("SERVER_ADDR").unwrap_or(defaults.server.addr),
            },
            database: DatabaseConfig {
                db_type: match std::env::var("DATABASE_TYPE")
                    .unwrap_or_else(|_| "sqlite".to_string())
                    .to_lowercase()
                    .as_str()
                {
                    "memory" => DatabaseType::Memory,
                    _ => DatabaseType::Sqlite,
                },
                sqlite_path: std::env::var("SQLITE_PATH")
                    .map(PathBuf::from)
                    .ok()
                    .or(defaults.database.sqlite_path),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", defaults.database.max_connections)?,
            },
            execution: ExecutionConfig {
                http_timeout_secs: parse_env("HTTP_TIMEOUT_SECS", defaults.execution.http_timeout_secs)?,
                user_agent: std::env::var("HTTP_USER_AGENT").unwrap_or(defaults.execution.user_agent),
            },
            mail: MailConfig {
                from: std::env::var("MAIL_FROM").unwrap_or(defaults.mail.from),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.database.validate().map_err(crate::Error::Config)?;

        if self.execution.http_timeout_secs == 0 {
            return Err(crate::Error::Config(
                "HTTP_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        if !self.mail.from.contains('@') {
            tracing::warn!("MAIL_FROM '{}' does not look like an email address", self.mail.from);
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> crate::Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| crate::Error::Config(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8080".to_string(),
            },
            database: DatabaseConfig::default(),
            execution: ExecutionConfig::default(),
            mail: MailConfig::default(),
        }
    }
}
