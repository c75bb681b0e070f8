// Configuration management for Trellis

pub mod de;
pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

/// Layered property store.
///
/// Sources are merged in the order they are loaded; later sources win.
/// Properties are addressed with dotted paths such as
/// `router.versioning.default-version`.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    root: Value,
    env_prefix: Option<String>,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self {
            root: Value::Object(serde_json::Map::new()),
            env_prefix: None,
        }
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: Some(prefix.into()),
            ..Self::new()
        }
    }

    /// Load configuration from environment variables
    pub fn load_env(&mut self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        for (path, value) in loader.load() {
            loader::insert_path(&mut self.root, &path, value);
        }
        Ok(())
    }

    /// Load configuration from file, detecting the format from its name
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = ConfigLoader::auto(path)?.load_file(path)?;
        loader::merge_values(&mut self.root, data);
        Ok(())
    }

    /// Merge configuration from an already parsed string
    pub fn load_str(&mut self, content: &str, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).parse(content)?;
        loader::merge_values(&mut self.root, data);
        Ok(())
    }

    /// Set a configuration value
    pub fn set<T: serde::Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;
        loader::insert_path(&mut self.root, key, json_value);
        Ok(())
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .filter(|p| !p.is_empty())
            .try_fold(&self.root, |node, part| node.get(part))
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .lookup(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value.clone()).map_err(|e| ConfigError::DeserializationError {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Deserialize a whole section. A missing section deserializes from an
    /// empty object so that types with defaults still load.
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .lookup(key)
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Deserialize and validate a section
    pub fn load_validated<T: DeserializeOwned + Validate>(&self, key: &str) -> Result<T> {
        let section: T = self.section(key)?;
        section.validate()?;
        Ok(section)
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Top-level keys
    pub fn keys(&self) -> Vec<String> {
        match &self.root {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Merge configuration from another manager; its values win
    pub fn merge(&mut self, other: &ConfigManager) {
        loader::merge_values(&mut self.root, other.root.clone());
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
