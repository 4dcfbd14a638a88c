//! Connection settings from the environment.
//!
//! `DATABASE_URL` is required; `ROWSMITH_POOL_SIZE` is optional. A `.env`
//! file in the current directory (or a parent) is loaded first if present.

use deadpool_postgres::{CreatePoolError, PoolConfig, Runtime};
use tokio_postgres::NoTls;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const POOL_SIZE: &str = "ROWSMITH_POOL_SIZE";

const DEFAULT_POOL_SIZE: usize = 16;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{var} is invalid: {message}")]
    Invalid { var: &'static str, message: String },

    #[error("failed to create connection pool: {0}")]
    Pool(#[from] CreatePoolError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub pool_max_size: usize,
}

impl Config {
    /// Load from the process environment, after reading `.env` if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup(DATABASE_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(DATABASE_URL))?;

        let pool_max_size = match lookup(POOL_SIZE) {
            None => DEFAULT_POOL_SIZE,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        var: POOL_SIZE,
                        message: "must be at least 1".to_string(),
                    });
                }
                Ok(n) => n,
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: POOL_SIZE,
                        message: e.to_string(),
                    });
                }
            },
        };

        Ok(Self {
            database_url,
            pool_max_size,
        })
    }

    /// Build a connection pool. Connections are opened lazily.
    pub fn create_pool(&self) -> Result<deadpool_postgres::Pool, ConfigError> {
        let mut cfg = deadpool_postgres::Config::new();
        cfg.url = Some(self.database_url.clone());
        cfg.pool = Some(PoolConfig::new(self.pool_max_size));
        Ok(cfg.create_pool(Some(Runtime::Tokio1), NoTls)?)
    }

    /// The database URL with its password masked, for display.
    pub fn redacted_url(&self) -> String {
        mask_password(&self.database_url)
    }
}

fn mask_password(url: &str) -> String {
    // Replace the password between :// and @
    if let Some(start) = url.find("://")
        && let Some(at) = url.rfind('@')
        && at > start
    {
        let prefix = &url[..start + 3];
        let suffix = &url[at..];
        if let Some(colon) = url[start + 3..at].find(':') {
            let user = &url[start + 3..start + 3 + colon];
            return format!("{}{}:***{}", prefix, user, suffix);
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_pool_size() {
        let config = Config::from_lookup(lookup(&[(DATABASE_URL, "postgres://localhost/app")])).unwrap();
        assert_eq!(config.database_url, "postgres://localhost/app");
        assert_eq!(config.pool_max_size, DEFAULT_POOL_SIZE);
    }

    #[test]
    fn test_reads_pool_size() {
        let config = Config::from_lookup(lookup(&[
            (DATABASE_URL, "postgres://localhost/app"),
            (POOL_SIZE, "4"),
        ]))
        .unwrap();
        assert_eq!(config.pool_max_size, 4);
    }

    #[test]
    fn test_missing_url() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(DATABASE_URL)));
    }

    #[test]
    fn test_invalid_pool_size() {
        for bad in ["zero", "0", "-1"] {
            let err = Config::from_lookup(lookup(&[
                (DATABASE_URL, "postgres://localhost/app"),
                (POOL_SIZE, bad),
            ]))
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { var: POOL_SIZE, .. }), "{bad}");
        }
    }

    #[test]
    fn test_redacted_url() {
        let config = Config {
            database_url: "postgres://app:hunter2@db:5432/app".to_string(),
            pool_max_size: 1,
        };
        assert_eq!(config.redacted_url(), "postgres://app:***@db:5432/app");
        assert_eq!(mask_password("postgres://localhost/app"), "postgres://localhost/app");
    }
}
