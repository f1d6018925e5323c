use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{QfapError, Result};

pub const SERVER_VAR: &str = "QFAP_SERVER";
pub const SECRET_VAR: &str = "QFAP_SECRET";
pub const CONFIG_VAR: &str = "QFAP_CONFIG";

/// Optional tuning read from a TOML file. Every key has a default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub cache: CacheSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub database: String,
    pub collection: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database: "QFAP".to_string(),
            collection: "dataset".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub dir: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".cache"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    pub upcoming_count: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 5000,
            upcoming_count: 10,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            QfapError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Storage endpoint, from `QFAP_SERVER`.
    pub server_address: String,
    /// From `QFAP_SECRET`.
    pub secret_key: String,
    pub settings: Settings,
}

impl Config {
    /// Read the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| QfapError::Config(format!("environment variable {name} is not set")))
        };
        let server_address = required(SERVER_VAR)?;
        let secret_key = required(SECRET_VAR)?;

        let settings = match lookup(CONFIG_VAR) {
            Some(path) if !path.is_empty() => Settings::load(Path::new(&path))?,
            _ => Settings::default(),
        };

        Ok(Self {
            server_address,
            secret_key,
            settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            Config::from_lookup(lookup(&[(SERVER_VAR, "/srv/qfap"), (SECRET_VAR, "s3cret")]))
                .unwrap();
        assert_eq!(config.server_address, "/srv/qfap");
        assert_eq!(config.secret_key, "s3cret");
        assert_eq!(config.settings.storage.database, "QFAP");
        assert_eq!(config.settings.storage.collection, "dataset");
        assert_eq!(config.settings.cache.dir, PathBuf::from(".cache"));
        assert_eq!(config.settings.server.port, 5000);
        assert_eq!(config.settings.server.upcoming_count, 10);
    }

    #[test]
    fn test_missing_variables_fail_fast() {
        match Config::from_lookup(lookup(&[(SECRET_VAR, "s3cret")])) {
            Err(QfapError::Config(message)) => assert!(message.contains(SERVER_VAR)),
            other => panic!("expected a configuration error, got {:?}", other),
        }
        match Config::from_lookup(lookup(&[(SERVER_VAR, "/srv/qfap"), (SECRET_VAR, "")])) {
            Err(QfapError::Config(message)) => assert!(message.contains(SECRET_VAR)),
            other => panic!("expected a configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_settings_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qfap.toml");
        fs::write(&path, "[storage]\ncollection = \"events\"\n\n[server]\nport = 8080\n").unwrap();

        let config = Config::from_lookup(lookup(&[
            (SERVER_VAR, "/srv/qfap"),
            (SECRET_VAR, "s3cret"),
            (CONFIG_VAR, path.to_str().unwrap()),
        ]))
        .unwrap();
        assert_eq!(config.settings.storage.database, "QFAP");
        assert_eq!(config.settings.storage.collection, "events");
        assert_eq!(config.settings.server.port, 8080);
        assert_eq!(config.settings.server.upcoming_count, 10);
    }

    #[test]
    fn test_unreadable_settings_file() {
        let result = Config::from_lookup(lookup(&[
            (SERVER_VAR, "/srv/qfap"),
            (SECRET_VAR, "s3cret"),
            (CONFIG_VAR, "/definitely/not/here.toml"),
        ]));
        assert!(matches!(result, Err(QfapError::Config(_))));
    }
}
