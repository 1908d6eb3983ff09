//! Environment configuration.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `DATABASE_URL` | full Postgres URL; wins over the `DB_*` parts | – |
//! | `DB_HOST` / `DB_PORT` | server address | `localhost` / `5432` |
//! | `DB_USER` / `DB_PASS` | credentials | `postgres` / empty |
//! | `DB_NAME` | database | `postgres` |
//! | `DB_SSL` | `true`/`1` requires TLS | off |
//! | `DB_MAX_CONNECTIONS` | pool size | `10` |
//! | `BIND_ADDR` | HTTP listen address | `0.0.0.0:8080` |
//! | `USE_PERSISTENT_STORES` | `true` selects Postgres | `false` |
//!
//! Every reader takes a lookup function so tests never touch the process
//! environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use thiserror::Error;

use crate::db::PgStore;
use crate::store::{StoreError, map_sqlx_error};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            name,
            reason: reason.to_string(),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Where and how to connect to Postgres.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub connect: PgConnectOptions,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let connect = match lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
            Some(url) => PgConnectOptions::from_str(&url)
                .map_err(|e| ConfigError::invalid("DATABASE_URL", e))?,
            None => {
                let port = match lookup("DB_PORT") {
                    Some(port) => port
                        .trim()
                        .parse::<u16>()
                        .map_err(|e| ConfigError::invalid("DB_PORT", e))?,
                    None => 5432,
                };
                PgConnectOptions::new()
                    .host(&lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string()))
                    .port(port)
                    .username(&lookup("DB_USER").unwrap_or_else(|| "postgres".to_string()))
                    .password(&lookup("DB_PASS").unwrap_or_default())
                    .database(&lookup("DB_NAME").unwrap_or_else(|| "postgres".to_string()))
            }
        };

        let connect = match lookup("DB_SSL") {
            Some(flag) if parse_flag(&flag) => connect.ssl_mode(PgSslMode::Require),
            _ => connect,
        };

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(n) => match n.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                Ok(_) => return Err(ConfigError::invalid("DB_MAX_CONNECTIONS", "must be at least 1")),
                Err(e) => return Err(ConfigError::invalid("DB_MAX_CONNECTIONS", e)),
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            connect,
            max_connections,
        })
    }

    /// Open a pool and verify that the server is reachable.
    pub async fn connect(&self) -> Result<PgPool, StoreError> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(self.connect.clone())
            .await
            .map_err(|e| map_sqlx_error("connect", e))
    }

    pub async fn open_store(&self) -> Result<PgStore, StoreError> {
        Ok(PgStore::new(self.connect().await?))
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub use_persistent_stores: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("BIND_ADDR", e))?;

        let use_persistent_stores = lookup("USE_PERSISTENT_STORES")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        Ok(Self {
            bind_addr,
            use_persistent_stores,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn database_parts_are_assembled() {
        let cfg = DatabaseConfig::from_lookup(env(&[
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
            ("DB_USER", "app"),
            ("DB_NAME", "credit"),
        ]))
        .unwrap();

        assert_eq!(cfg.connect.get_host(), "db.internal");
        assert_eq!(cfg.connect.get_port(), 6543);
        assert_eq!(cfg.connect.get_username(), "app");
        assert_eq!(cfg.connect.get_database(), Some("credit"));
        assert_eq!(cfg.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn database_url_wins_over_parts() {
        let cfg = DatabaseConfig::from_lookup(env(&[
            ("DATABASE_URL", "postgres://u:p@url-host:5433/urldb"),
            ("DB_HOST", "ignored"),
        ]))
        .unwrap();

        assert_eq!(cfg.connect.get_host(), "url-host");
        assert_eq!(cfg.connect.get_port(), 5433);
        assert_eq!(cfg.connect.get_database(), Some("urldb"));
    }

    #[test]
    fn ssl_flag_requires_tls() {
        let cfg = DatabaseConfig::from_lookup(env(&[("DB_SSL", "true")])).unwrap();
        assert!(matches!(cfg.connect.get_ssl_mode(), PgSslMode::Require));
    }

    #[test]
    fn bad_numbers_are_reported_by_name() {
        let err = DatabaseConfig::from_lookup(env(&[("DB_PORT", "abc")])).unwrap_err();
        assert!(err.to_string().contains("DB_PORT"));

        let err = DatabaseConfig::from_lookup(env(&[("DB_MAX_CONNECTIONS", "0")])).unwrap_err();
        assert!(err.to_string().contains("DB_MAX_CONNECTIONS"));
    }

    #[test]
    fn server_defaults() {
        let cfg = ServerConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert!(!cfg.use_persistent_stores);
    }

    #[test]
    fn server_overrides() {
        let cfg = ServerConfig::from_lookup(env(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("USE_PERSISTENT_STORES", "TRUE"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert!(cfg.use_persistent_stores);

        assert!(ServerConfig::from_lookup(env(&[("BIND_ADDR", "nope")])).is_err());
    }
}
