//! Configuration loaded from environment variables

use std::env;

use anyhow::{Context, Result};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => anyhow::bail!("unknown log format `{}` (expected json or pretty)", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "ormgraph=info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite URL, e.g. `sqlite://data/app.db` or `sqlite::memory:`
    pub database_url: String,

    /// Pool size (forced to 1 for in-memory databases)
    pub database_max_connections: u32,

    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            database_max_connections: 5,
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env`, if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v.parse().context("Invalid DATABASE_MAX_CONNECTIONS")?,
            None => defaults.database_max_connections,
        };

        let format = match lookup("LOG_FORMAT") {
            Some(v) => v.parse().context("Invalid LOG_FORMAT")?,
            None => defaults.log.format,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections,
            log: LogConfig {
                filter: lookup("LOG_FILTER").unwrap_or(defaults.log.filter),
                format,
            },
        })
    }
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
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.log.filter, "ormgraph=info");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite://app.db"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("LOG_FORMAT", "JSON"),
            ("LOG_FILTER", "ormgraph=debug"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite://app.db");
        assert_eq!(config.database_max_connections, 12);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.filter, "ormgraph=debug");
    }

    #[test]
    fn test_invalid_number_names_variable() {
        let err = Config::from_lookup(lookup(&[("DATABASE_MAX_CONNECTIONS", "many")])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_MAX_CONNECTIONS"));
    }
}
