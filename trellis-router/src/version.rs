//! API version resolution and filtering
//!
//! The requested version is read, in order, from the configured headers,
//! the configured query parameters and finally the configured default. The
//! result may be absent; routes that declare a constraint never match an
//! absent version, routes without one always do.
//!
//! ```
//! use trellis_router::version::{VersionConstraint, VersionRequest};
//!
//! let constraint: VersionConstraint = "1..2".parse().unwrap();
//! assert!(constraint.accepts(&VersionRequest::of("1.5")));
//! assert!(!constraint.accepts(&VersionRequest::of("3")));
//! assert!(!constraint.accepts(&VersionRequest::absent()));
//! ```

use crate::error::RouteDefinitionError;
use crate::matcher::MatchResult;
use crate::request::{Headers, RequestHead};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::trace;
use trellis_config::{de, ConfigError, ConfigValidator, Validate};

// ============================================================================
// API Version
// ============================================================================

/// A numeric `major[.minor]` version, used by range constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    /// Major version number
    pub major: u32,
    /// Minor version number (defaults to 0)
    pub minor: u32,
}

impl ApiVersion {
    /// Create a new API version.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Create a version with only major number.
    pub const fn major_only(major: u32) -> Self {
        Self { major, minor: 0 }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minor == 0 {
            write!(f, "{}", self.major)
        } else {
            write!(f, "{}.{}", self.major, self.minor)
        }
    }
}

/// Error parsing an API version string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("Empty version string")]
    Empty,
    #[error("Invalid version format: {0}")]
    InvalidFormat(String),
}

impl FromStr for ApiVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = normalize_token(s);
        if token.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let invalid = || VersionParseError::InvalidFormat(s.to_string());
        match token.split_once('.') {
            Some((major, minor)) => Ok(ApiVersion::new(
                major.parse().map_err(|_| invalid())?,
                minor.parse().map_err(|_| invalid())?,
            )),
            None => Ok(ApiVersion::major_only(token.parse().map_err(|_| invalid())?)),
        }
    }
}

/// Trim and drop a leading `v`/`V`.
fn normalize_token(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('v')
        .or_else(|| s.strip_prefix('V'))
        .unwrap_or(s)
}

/// Check that a version token is a single word such as `2`, `v1.1` or
/// `2024-01-beta`.
pub fn is_version_token(s: &str) -> bool {
    let token = normalize_token(s);
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

// ============================================================================
// Version Request
// ============================================================================

/// The version a request asked for, possibly none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VersionRequest(Option<String>);

impl VersionRequest {
    /// No version requested.
    pub fn absent() -> Self {
        Self(None)
    }

    /// A specific version token.
    pub fn of(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(token) => f.write_str(token),
            None => f.write_str("<none>"),
        }
    }
}

// ============================================================================
// Version Constraint
// ============================================================================

/// Version requirement attached to a route.
///
/// Textual forms: `2` (exact), `>=1.1`, `<=3`, `1..2` (inclusive range),
/// `1|2|3` (one of).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Exact token match after trimming and dropping a leading `v`.
    /// `2` and `2.0` are different tokens.
    Exact(String),
    /// Minimum version (inclusive)
    Minimum(ApiVersion),
    /// Maximum version (inclusive)
    Maximum(ApiVersion),
    /// Version range (inclusive)
    Range { min: ApiVersion, max: ApiVersion },
    /// Any of the listed tokens, compared like `Exact`
    OneOf(Vec<String>),
}

impl VersionConstraint {
    /// Create an exact version constraint.
    pub fn exact(token: impl AsRef<str>) -> Self {
        Self::Exact(normalize_token(token.as_ref()).to_string())
    }

    /// Create a minimum version constraint.
    pub fn minimum(version: ApiVersion) -> Self {
        Self::Minimum(version)
    }

    /// Create a maximum version constraint.
    pub fn maximum(version: ApiVersion) -> Self {
        Self::Maximum(version)
    }

    /// Create a version range constraint.
    pub fn range(min: ApiVersion, max: ApiVersion) -> Self {
        Self::Range { min, max }
    }

    /// Parse the textual form.
    pub fn parse(s: &str) -> Result<Self, RouteDefinitionError> {
        let invalid = || RouteDefinitionError::InvalidVersionConstraint(s.to_string());
        let text = s.trim();
        let version = |v: &str| v.parse::<ApiVersion>().map_err(|_| invalid());

        if let Some(min) = text.strip_prefix(">=") {
            return Ok(Self::Minimum(version(min)?));
        }
        if let Some(max) = text.strip_prefix("<=") {
            return Ok(Self::Maximum(version(max)?));
        }
        if let Some((min, max)) = text.split_once("..") {
            let (min, max) = (version(min)?, version(max)?);
            if min > max {
                return Err(invalid());
            }
            return Ok(Self::Range { min, max });
        }
        if text.contains('|') {
            let tokens = text
                .split('|')
                .map(|t| is_version_token(t).then(|| normalize_token(t).to_string()))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(invalid)?;
            return Ok(Self::OneOf(tokens));
        }
        if is_version_token(text) {
            return Ok(Self::exact(text));
        }
        Err(invalid())
    }

    /// Check if a requested version satisfies this constraint. An absent
    /// version never does.
    pub fn accepts(&self, request: &VersionRequest) -> bool {
        let Some(raw) = request.as_str() else {
            return false;
        };
        let token = normalize_token(raw);

        match self {
            Self::Exact(expected) => token == expected,
            Self::OneOf(tokens) => tokens.iter().any(|t| t == token),
            Self::Minimum(min) => token.parse::<ApiVersion>().is_ok_and(|v| v >= *min),
            Self::Maximum(max) => token.parse::<ApiVersion>().is_ok_and(|v| v <= *max),
            Self::Range { min, max } => token
                .parse::<ApiVersion>()
                .is_ok_and(|v| v >= *min && v <= *max),
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = RouteDefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionConstraint::parse(s)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(token) => f.write_str(token),
            Self::Minimum(min) => write!(f, ">={}", min),
            Self::Maximum(max) => write!(f, "<={}", max),
            Self::Range { min, max } => write!(f, "{}..{}", min, max),
            Self::OneOf(tokens) => f.write_str(&tokens.join("|")),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Default header carrying the requested version.
pub const DEFAULT_VERSION_HEADER: &str = "X-API-VERSION";

/// Default query parameter carrying the requested version.
pub const DEFAULT_VERSION_PARAMETER: &str = "api-version";

/// `router.versioning` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct VersioningConfig {
    pub enabled: bool,
    #[serde(deserialize_with = "de::opt_string")]
    pub default_version: Option<String>,
    #[serde(deserialize_with = "de::string_list")]
    pub header_names: Vec<String>,
    #[serde(deserialize_with = "de::string_list")]
    pub parameter_names: Vec<String>,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_version: None,
            header_names: vec![DEFAULT_VERSION_HEADER.to_string()],
            parameter_names: vec![DEFAULT_VERSION_PARAMETER.to_string()],
        }
    }
}

impl VersioningConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_version(mut self, version: impl Into<String>) -> Self {
        self.default_version = Some(version.into());
        self
    }

    pub fn header_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn parameter_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameter_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Validate for VersioningConfig {
    fn validate(&self) -> trellis_config::Result<()> {
        if let Some(default) = &self.default_version {
            ConfigValidator::not_blank(default, "router.versioning.default-version")?;
            if !is_version_token(default) {
                return Err(ConfigError::invalid(
                    "router.versioning.default-version",
                    format!("'{}' is not a version", default),
                ));
            }
        }
        for name in &self.header_names {
            ConfigValidator::not_blank(name, "router.versioning.header-names")?;
        }
        for name in &self.parameter_names {
            ConfigValidator::not_blank(name, "router.versioning.parameter-names")?;
        }
        Ok(())
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Reads the requested version and narrows candidate routes by it.
///
/// Only constructible from a validated [`VersioningConfig`], so a bad
/// default version fails at startup.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    config: VersioningConfig,
}

impl VersionResolver {
    pub fn new(config: VersioningConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// A resolver that ignores versions entirely.
    pub fn disabled() -> Self {
        Self {
            config: VersioningConfig::default().enabled(false),
        }
    }

    pub fn config(&self) -> &VersioningConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Resolve from headers alone, then the default.
    pub fn resolve_headers(&self, headers: &Headers) -> VersionRequest {
        self.resolve_from(headers, &[])
    }

    /// Resolve from headers, query parameters, then the default.
    pub fn resolve(&self, request: &RequestHead) -> VersionRequest {
        self.resolve_from(&request.headers, &request.query)
    }

    fn resolve_from(&self, headers: &Headers, query: &[(String, String)]) -> VersionRequest {
        if !self.config.enabled {
            return VersionRequest::absent();
        }

        let from_headers = self
            .config
            .header_names
            .iter()
            .filter_map(|name| headers.get(name));
        let from_query = self.config.parameter_names.iter().filter_map(|name| {
            query
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        });

        let requested = from_headers
            .chain(from_query)
            .chain(self.config.default_version.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty());

        trace!(version = ?requested, "Resolved requested API version");
        VersionRequest(requested.map(str::to_string))
    }

    /// Drop candidates whose constraint rejects `version`. Unconstrained
    /// candidates always pass.
    pub fn filter<'t, T>(
        &self,
        mut candidates: Vec<MatchResult<'t, T>>,
        version: &VersionRequest,
    ) -> Vec<MatchResult<'t, T>> {
        if self.config.enabled {
            candidates.retain(|candidate| match candidate.entry.version_constraint() {
                Some(constraint) => constraint.accepts(version),
                None => true,
            });
        }
        candidates
    }
}

impl Default for VersionResolver {
    fn default() -> Self {
        Self {
            config: VersioningConfig::default(),
        }
    }
}
