//! CLI configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via DOCWIRE_CONFIG or --config)
//! 3. Environment variables
//! 4. Command-line flags (applied by the caller)

use docwire_client::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server connection settings.
    pub server: ServerSection,
    /// Database that commands run against.
    pub database: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            database: "test".to_string(),
        }
    }
}

/// Server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Server address as `host:port`.
    pub addr: String,
    pub connect_timeout_secs: u64,
    /// Reply deadline; unset waits indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            addr: format!("127.0.0.1:{}", docwire_protocol::DEFAULT_PORT),
            connect_timeout_secs: 10,
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Loads configuration from `path` (or DOCWIRE_CONFIG when `None`), then
    /// applies environment variable overrides. The result is not validated,
    /// so command-line flags can still correct it.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env = |key: &str| std::env::var(key).ok();

        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env("DOCWIRE_CONFIG").map(PathBuf::from));
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_overrides(env);
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// production).
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = var("DOCWIRE_ADDR") {
            self.server.addr = addr;
        }

        if let Some(database) = var("DOCWIRE_DATABASE") {
            self.database = database;
        }

        if let Some(timeout) = var("DOCWIRE_CONNECT_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.server.connect_timeout_secs = secs;
            }
        }

        if let Some(timeout) = var("DOCWIRE_REQUEST_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.server.request_timeout_secs = Some(secs);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.addr.is_empty() {
            return Err(ConfigError::ValidationError(
                "server.addr must not be empty".into(),
            ));
        }
        if self.server.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "server.connect_timeout_secs must be positive".into(),
            ));
        }
        if self.database.is_empty() || self.database.contains('.') {
            return Err(ConfigError::ValidationError(format!(
                "invalid database name '{}'",
                self.database
            )));
        }
        Ok(())
    }

    /// Builds the client connection settings.
    pub fn connection_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(self.server.addr.clone())
            .with_connect_timeout(Duration::from_secs(self.server.connect_timeout_secs));
        if let Some(secs) = self.server.request_timeout_secs {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        config
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.addr, "127.0.0.1:27017");
        assert_eq!(config.server.connect_timeout_secs, 10);
        assert!(config.server.request_timeout_secs.is_none());
        assert_eq!(config.database, "test");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  addr: \"db.internal:27018\"\n  request_timeout_secs: 5\ndatabase: inventory"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.addr, "db.internal:27018");
        assert_eq!(config.server.connect_timeout_secs, 10);
        assert_eq!(config.server.request_timeout_secs, Some(5));
        assert_eq!(config.database, "inventory");

        let conn = config.connection_config();
        assert_eq!(conn.addr, "db.internal:27018");
        assert_eq!(conn.request_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        assert!(matches!(
            Config::from_file(&missing),
            Err(ConfigError::IoError(..))
        ));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "server: [not, a, map]").unwrap();
        let err = Config::from_file(&bad).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DOCWIRE_ADDR", "10.0.0.5:27017"),
            ("DOCWIRE_DATABASE", "app"),
            ("DOCWIRE_CONNECT_TIMEOUT", "3"),
            ("DOCWIRE_REQUEST_TIMEOUT", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.server.addr, "10.0.0.5:27017");
        assert_eq!(config.database, "app");
        assert_eq!(config.server.connect_timeout_secs, 3);
        assert!(config.server.request_timeout_secs.is_none());
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.database = "a.b".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = Config::default();
        config.server.connect_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_defers_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database: \"bad.name\"").unwrap();

        let mut config = Config::load(Some(file.path())).unwrap();
        assert!(config.validate().is_err());

        config.database = "inventory".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.server.addr, config.server.addr);
        assert_eq!(parsed.database, config.database);
    }
}
