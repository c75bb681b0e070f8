// Environment variable loading

use crate::loader::{env_key_to_path, parse_scalar};
use serde_json::Value;
use std::env;

/// Environment variable loader
///
/// With a prefix of `TRELLIS`, the variable
/// `TRELLIS_ROUTER__VERSIONING__DEFAULT_VERSION=2` maps to the property
/// `router.versioning.default-version`.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load all matching environment variables as `(property path, value)`
    /// pairs, sorted by path.
    pub fn load(&self) -> Vec<(String, Value)> {
        self.load_from(env::vars())
    }

    pub(crate) fn load_from(&self, vars: impl Iterator<Item = (String, String)>) -> Vec<(String, Value)> {
        let mut entries: Vec<(String, Value)> = vars
            .filter_map(|(key, value)| {
                let key = match &self.prefix {
                    Some(prefix) => key
                        .strip_prefix(prefix.as_str())?
                        .strip_prefix('_')?
                        .to_string(),
                    None => key,
                };
                if key.is_empty() {
                    return None;
                }
                Some((env_key_to_path(&key), parse_scalar(&value)))
            })
            .collect();

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(Some("TRELLIS".to_string()))
    }
}
