//! Service instances, discovery traits and load-balanced resolution

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Service discovery errors
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Deregistration failed: {0}")]
    DeregistrationFailed(String),

    #[error("Resolution failed: {0}")]
    Resolution(String),

    #[error("Invalid instance metadata: {0}")]
    Metadata(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A backend failed during an aggregate call.
    #[error("Discovery backend {backend} failed: {source}")]
    Backend {
        backend: String,
        source: Box<DiscoveryError>,
    },

    /// One or more backends failed to close; `first` is the first failure.
    #[error("Failed to close {failures} discovery backend(s), first error: {first}")]
    Close {
        first: Box<DiscoveryError>,
        failures: usize,
    },

    #[error("Discovery client is closed: {0}")]
    Closed(String),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Health of an instance as reported by its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Up,
    Down,
    OutOfService,
    Unknown,
}

impl HealthStatus {
    /// Whether the instance may receive traffic.
    pub fn is_available(&self) -> bool {
        matches!(self, HealthStatus::Up | HealthStatus::Unknown)
    }
}

/// A concrete instance of a logical service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Unique per instance
    pub id: String,

    /// Hyphenated logical service name
    pub service_id: String,

    /// Where the instance is reached
    pub uri: Url,

    /// Open-ended key/value metadata
    pub metadata: HashMap<String, String>,

    /// Health, when the backend reports one
    pub health_status: Option<HealthStatus>,
}

impl ServiceInstance {
    /// Create a new service instance from a URI.
    pub fn new(id: impl Into<String>, service_id: &str, uri: &str) -> Result<Self> {
        let uri = Url::parse(uri)
            .map_err(|e| DiscoveryError::InvalidConfiguration(format!("Invalid URI '{}': {}", uri, e)))?;
        Ok(Self::from_url(id, service_id, uri))
    }

    /// Create a new service instance from an already parsed URL.
    pub fn from_url(id: impl Into<String>, service_id: &str, uri: Url) -> Self {
        Self {
            id: id.into(),
            service_id: hyphenate(service_id),
            uri,
            metadata: HashMap::new(),
            health_status: None,
        }
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set health status
    pub fn with_health_status(mut self, status: HealthStatus) -> Self {
        self.health_status = Some(status);
        self
    }

    pub fn host(&self) -> Option<&str> {
        self.uri.host_str()
    }

    /// Explicit port, or the default for the scheme.
    pub fn port(&self) -> Option<u16> {
        self.uri.port_or_known_default()
    }

    pub fn scheme(&self) -> &str {
        self.uri.scheme()
    }

    /// Whether a load balancer may pick this instance.
    pub fn is_available(&self) -> bool {
        self.health_status.is_none_or(|status| status.is_available())
    }

    /// Get full service URL
    pub fn url(&self) -> String {
        self.uri.as_str().trim_end_matches('/').to_string()
    }
}

/// Canonical hyphenated form of a service name.
///
/// `FooBar`, `fooBar`, `foo_bar` and `FOO_BAR` all become `foo-bar`.
pub fn hyphenate(name: &str) -> String {
    let chars: Vec<char> = name.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            continue;
        }

        if c.is_uppercase() && i > 0 && !out.is_empty() && !out.ends_with('-') {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                out.push('-');
            }
        }

        out.extend(c.to_lowercase());
    }

    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// A source of service instances.
///
/// Backends return an empty list for services they do not know about.
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// Instances of a service.
    async fn resolve_instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>>;

    /// Every service this backend knows about.
    async fn resolve_service_ids(&self) -> Result<Vec<String>>;

    /// Release resources. Closing twice is not an error.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Short description for logs and diagnostics.
    fn describe(&self) -> String;
}

#[async_trait]
impl<D: DiscoveryClient + ?Sized> DiscoveryClient for Arc<D> {
    async fn resolve_instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>> {
        (**self).resolve_instances(service_id).await
    }

    async fn resolve_service_ids(&self) -> Result<Vec<String>> {
        (**self).resolve_service_ids().await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Backends that accept registrations.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Register a service instance
    async fn register(&self, instance: &ServiceInstance) -> Result<()>;

    /// Deregister a service instance by instance id
    async fn deregister(&self, instance_id: &str) -> Result<()>;
}

/// Load balancing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancingStrategy {
    /// Round-robin selection
    #[default]
    RoundRobin,

    /// Random selection
    Random,

    /// Always pick first available
    First,
}

/// Service resolver with load balancing
pub struct ServiceResolver<D: DiscoveryClient> {
    discovery: D,
    strategy: LoadBalancingStrategy,
    round_robin_index: AtomicUsize,
}

impl<D: DiscoveryClient> ServiceResolver<D> {
    /// Create new service resolver
    pub fn new(discovery: D, strategy: LoadBalancingStrategy) -> Self {
        Self {
            discovery,
            strategy,
            round_robin_index: AtomicUsize::new(0),
        }
    }

    pub fn discovery(&self) -> &D {
        &self.discovery
    }

    /// Resolve a service instance using the configured strategy.
    ///
    /// Instances reported `Down` or `OutOfService` are never picked.
    pub async fn resolve(&self, service_id: &str) -> Result<ServiceInstance> {
        let mut instances = self.discovery.resolve_instances(service_id).await?;
        instances.retain(ServiceInstance::is_available);

        if instances.is_empty() {
            return Err(DiscoveryError::ServiceNotFound(service_id.to_string()));
        }

        let index = match self.strategy {
            LoadBalancingStrategy::RoundRobin => {
                self.round_robin_index.fetch_add(1, Ordering::SeqCst) % instances.len()
            }
            LoadBalancingStrategy::Random => rand::rng().random_range(0..instances.len()),
            LoadBalancingStrategy::First => 0,
        };

        Ok(instances.swap_remove(index))
    }
}

impl<D: DiscoveryClient> fmt::Debug for ServiceResolver<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceResolver")
            .field("discovery", &self.discovery.describe())
            .field("strategy", &self.strategy)
            .finish()
    }
}
