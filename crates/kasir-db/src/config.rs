//! # Configuration
//!
//! Runtime configuration for a Kasir backend process.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     KASIR_DATABASE_PATH=./data/kasir.db                                │
//! │     KASIR_MAX_CONNECTIONS=5                                            │
//! │     KASIR_SALE_MAX_ATTEMPTS=3                                          │
//! │     KASIR_RETRY_BACKOFF_MS=25                                          │
//! │                                                                         │
//! │  2. Default Values (lowest priority)                                   │
//! │     kasir.db in the working directory, 5 connections,                  │
//! │     3 attempts per sale, 25 ms linear backoff                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A variable that is set but unparsable is an error, not a silent default.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::pool::DbConfig;
use crate::service::SaleServiceConfig;

pub const ENV_DATABASE_PATH: &str = "KASIR_DATABASE_PATH";
pub const ENV_MAX_CONNECTIONS: &str = "KASIR_MAX_CONNECTIONS";
pub const ENV_SALE_MAX_ATTEMPTS: &str = "KASIR_SALE_MAX_ATTEMPTS";
pub const ENV_RETRY_BACKOFF_MS: &str = "KASIR_RETRY_BACKOFF_MS";

/// Default database file when `KASIR_DATABASE_PATH` is unset.
pub const DEFAULT_DATABASE_PATH: &str = "kasir.db";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything a backend process needs to open the store and run sales.
#[derive(Debug, Clone)]
pub struct KasirConfig {
    pub database: DbConfig,
    pub sale: SaleServiceConfig,
}

impl Default for KasirConfig {
    fn default() -> Self {
        KasirConfig {
            database: DbConfig::new(DEFAULT_DATABASE_PATH),
            sale: SaleServiceConfig::default(),
        }
    }
}

impl KasirConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = KasirConfig::default();

        if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|p| !p.trim().is_empty()) {
            debug!(path = %path, "Overriding database path from environment");
            config.database.database_path = path.into();
        }

        if let Some(max) = parse_positive(&lookup, ENV_MAX_CONNECTIONS)? {
            config.database.max_connections = max;
            config.database.min_connections = config.database.min_connections.min(max);
        }

        if let Some(attempts) = parse_positive(&lookup, ENV_SALE_MAX_ATTEMPTS)? {
            config.sale.max_attempts = attempts;
        }

        if let Some(raw) = lookup(ENV_RETRY_BACKOFF_MS) {
            let ms = raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                var: ENV_RETRY_BACKOFF_MS,
                value: raw.clone(),
                reason: e.to_string(),
            })?;
            config.sale.retry_backoff = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parse_positive<F>(lookup: &F, var: &'static str) -> Result<Option<u32>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };

    match raw.trim().parse::<u32>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            var,
            value: raw,
            reason: "must be greater than 0".to_string(),
        }),
        Ok(v) => Ok(Some(v)),
        Err(e) => Err(ConfigError::InvalidValue {
            var,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = KasirConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database.database_path, PathBuf::from(DEFAULT_DATABASE_PATH));
        assert_eq!(config.sale.max_attempts, 3);
        assert_eq!(config.sale.retry_backoff, Duration::from_millis(25));
    }

    #[test]
    fn test_overrides() {
        let config = KasirConfig::from_lookup(lookup(&[
            (ENV_DATABASE_PATH, "/var/lib/kasir/kasir.db"),
            (ENV_MAX_CONNECTIONS, "8"),
            (ENV_SALE_MAX_ATTEMPTS, "5"),
            (ENV_RETRY_BACKOFF_MS, "0"),
        ]))
        .unwrap();

        assert_eq!(
            config.database.database_path,
            PathBuf::from("/var/lib/kasir/kasir.db")
        );
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.sale.max_attempts, 5);
        assert_eq!(config.sale.retry_backoff, Duration::ZERO);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = KasirConfig::from_lookup(lookup(&[(ENV_SALE_MAX_ATTEMPTS, "0")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: ENV_SALE_MAX_ATTEMPTS,
                ..
            }
        ));

        assert!(KasirConfig::from_lookup(lookup(&[(ENV_MAX_CONNECTIONS, "many")])).is_err());
        assert!(KasirConfig::from_lookup(lookup(&[(ENV_RETRY_BACKOFF_MS, "-1")])).is_err());
    }
}
