//! Server configuration read from the environment.

use cgraph_sync::{DanglingPolicy, SyncOptions};
use thiserror::Error;

pub const DEFAULT_DB_PATH: &str = "conceptgraph.db";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("CGRAPH_PORT must be a port number, got '{0}'")]
    InvalidPort(String),

    #[error("CGRAPH_DANGLING: {0}")]
    InvalidDanglingPolicy(String),
}

/// Settings of the HTTP server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub db_path: String,
    pub port: u16,
    pub dangling: DanglingPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            db_path: DEFAULT_DB_PATH.to_string(),
            port: DEFAULT_PORT,
            dangling: DanglingPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Reads `CGRAPH_DB_PATH`, `CGRAPH_PORT` and `CGRAPH_DANGLING`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source; unset
    /// variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServerConfig::default();
        if let Some(path) = lookup("CGRAPH_DB_PATH") {
            config.db_path = path;
        }
        if let Some(port) = lookup("CGRAPH_PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }
        if let Some(policy) = lookup("CGRAPH_DANGLING") {
            config.dangling = policy
                .parse()
                .map_err(ConfigError::InvalidDanglingPolicy)?;
        }
        Ok(config)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            dangling: self.dangling,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
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
    fn unset_variables_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.listen_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn variables_override_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("CGRAPH_DB_PATH", "/tmp/graph.db"),
            ("CGRAPH_PORT", "8080"),
            ("CGRAPH_DANGLING", "reject"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, "/tmp/graph.db");
        assert_eq!(config.port, 8080);
        assert_eq!(config.sync_options().dangling, DanglingPolicy::Reject);
    }

    #[test]
    fn malformed_values_are_errors() {
        let err = ServerConfig::from_lookup(lookup(&[("CGRAPH_PORT", "http")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidPort("http".to_string()));
        let err = ServerConfig::from_lookup(lookup(&[("CGRAPH_DANGLING", "drop")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDanglingPolicy(_)));
    }
}
