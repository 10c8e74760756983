//! API configuration
//!
//! Server settings come from `API_*` environment variables. The engine's
//! rule tables, templates and holidays come from a separate file named by
//! `API_ENGINE_CONFIG_PATH`; without one the built-in defaults apply.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use domain_dispute::{DisputeError, EngineConfig};

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Log level
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
    /// Engine configuration file (JSON, YAML or TOML)
    pub engine_config_path: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/disputes".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            engine_config_path: None,
        }
    }
}

/// Failures loading either configuration layer
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Configuration source error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("Could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Engine(#[from] DisputeError),
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Loads the engine configuration named by `engine_config_path`
    pub fn load_engine_config(&self) -> Result<EngineConfig, ConfigLoadError> {
        match &self.engine_config_path {
            Some(path) => load_engine_config(path),
            None => Ok(EngineConfig::default()),
        }
    }
}

/// Reads and validates an engine configuration file
///
/// JSON files are parsed directly so map keys such as state codes and
/// template names keep their case; other formats go through `config`.
pub fn load_engine_config(path: &str) -> Result<EngineConfig, ConfigLoadError> {
    let is_json = Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let engine = if is_json {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_string(),
            source,
        })?;
        EngineConfig::from_json(&text)?
    } else {
        config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?
            .try_deserialize::<EngineConfig>()?
    };

    engine.validate()?;
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_builtin_engine_config() {
        let config = ApiConfig::default();
        let engine = config.load_engine_config().unwrap();

        assert_eq!(engine, EngineConfig::default());
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_json_engine_config_is_loaded() {
        let mut engine = EngineConfig::default();
        engine.version = "2024.3".to_string();
        engine.urgent_threshold_days = 10;

        let path = std::env::temp_dir().join(format!("engine-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, serde_json::to_string(&engine).unwrap()).unwrap();

        let loaded = load_engine_config(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.version, "2024.3");
        assert_eq!(loaded.urgent_threshold_days, 10);
        assert_eq!(loaded.deadline_rules, EngineConfig::default().deadline_rules);
    }

    #[test]
    fn test_missing_engine_config_file() {
        let err = load_engine_config("/nonexistent/engine.json").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Read { .. }));
    }
}
