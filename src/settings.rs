//! Application settings
//!
//! One configuration file (TOML, JSON or `.env`) carries the router's
//! versioning section and the ordered list of discovery backends.
//! Environment variables prefixed with `TRELLIS_` override file values,
//! e.g. `TRELLIS_ROUTER__VERSIONING__DEFAULT_VERSION=2`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use trellis_config::{ConfigError, ConfigManager, FileFormat, Validate};
use trellis_discovery::{CompositeDiscovery, DiscoveryConfig, DiscoveryError};
use trellis_router::{RouteTable, Router, VersionResolver, VersioningConfig};

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "TRELLIS";

/// The `router` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RouterSettings {
    pub versioning: VersioningConfig,
}

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    pub router: RouterSettings,
    pub discovery: DiscoveryConfig,
}

impl Settings {
    /// Load from a file, then apply `TRELLIS_*` environment overrides.
    ///
    /// Invalid settings are rejected here rather than on first use.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut manager = ConfigManager::with_prefix(ENV_PREFIX);
        manager.load_file(path)?;
        manager.load_env()?;

        let settings = Self::from_manager(&manager)?;
        info!(
            path = %path.display(),
            backends = settings.discovery.backends.len(),
            versioning = settings.router.versioning.enabled,
            "Loaded settings"
        );
        Ok(settings)
    }

    /// Parse settings from a string, without environment overrides.
    pub fn parse(content: &str, format: FileFormat) -> Result<Self, ConfigError> {
        let mut manager = ConfigManager::new();
        manager.load_str(content, format)?;
        Self::from_manager(&manager)
    }

    /// Read the `router` and `discovery` sections of a populated manager.
    pub fn from_manager(manager: &ConfigManager) -> Result<Self, ConfigError> {
        let settings = Self {
            router: manager.section("router")?,
            discovery: manager.section("discovery")?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn version_resolver(&self) -> Result<VersionResolver, ConfigError> {
        VersionResolver::new(self.router.versioning.clone())
    }

    /// A router over `table` that resolves versions per these settings.
    pub fn router<T>(&self, table: impl Into<Arc<RouteTable<T>>>) -> Result<Router<T>, ConfigError> {
        Ok(Router::new(table, self.version_resolver()?))
    }

    /// The configured backends behind one composite client, in file order.
    pub fn discovery_client(&self) -> Result<CompositeDiscovery, DiscoveryError> {
        self.discovery.build()
    }
}

impl Validate for Settings {
    fn validate(&self) -> trellis_config::Result<()> {
        self.router.versioning.validate()?;
        self.discovery.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_discovery::AggregationPolicy;

    const SETTINGS: &str = r#"
        [router.versioning]
        enabled = true
        default-version = 1
        header-names = ["X-API-VERSION", "Accept-Version"]

        [discovery]
        policy = "best-effort"

        [[discovery.backends]]
        type = "static"
        services = { billing = ["http://10.0.0.5:8080"] }
    "#;

    #[test]
    fn test_parse_settings() {
        let settings = Settings::parse(SETTINGS, FileFormat::Toml).unwrap();

        let versioning = &settings.router.versioning;
        assert!(versioning.enabled);
        assert_eq!(versioning.default_version.as_deref(), Some("1"));
        assert_eq!(versioning.header_names.len(), 2);
        assert_eq!(settings.discovery.policy, AggregationPolicy::BestEffort);
        assert_eq!(settings.discovery.backends.len(), 1);
    }

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = Settings::parse("", FileFormat::Toml).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.version_resolver().is_ok());
        assert!(settings.discovery_client().unwrap().backends().is_empty());
    }

    #[test]
    fn test_blank_default_version_rejected() {
        let err = Settings::parse(
            r#"
            [router.versioning]
            default-version = " "
            "#,
            FileFormat::Toml,
        )
        .unwrap_err();
        assert!(err.to_string().contains("router.versioning.default-version"));
    }

    #[test]
    fn test_bad_backend_rejected() {
        let result = Settings::parse(
            r#"
            [[discovery.backends]]
            type = "consul"
            url = "localhost:8500"
            "#,
            FileFormat::Toml,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
