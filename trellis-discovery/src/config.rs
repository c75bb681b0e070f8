//! Discovery configuration
//!
//! ```toml
//! [discovery]
//! policy = "best-effort"
//!
//! [[discovery.backends]]
//! type = "static"
//! services = { billing = ["http://10.0.0.5:8080"] }
//!
//! [[discovery.backends]]
//! type = "dns"
//! domain = "svc.cluster.local"
//! port = 8080
//! ```

use crate::cloud::{CloudMetadataDiscovery, DEFAULT_METADATA_URL};
use crate::composite::{AggregationPolicy, CompositeDiscovery};
use crate::consul::ConsulDiscovery;
use crate::dns::DnsDiscovery;
use crate::service::{DiscoveryClient, DiscoveryError, Result};
use crate::static_config::StaticDiscovery;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use trellis_config::{ConfigError, ConfigValidator, Validate};

fn default_port() -> u16 {
    80
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_metadata_url() -> String {
    DEFAULT_METADATA_URL.to_string()
}

/// One discovery backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum BackendConfig {
    /// Fixed instances, `service id -> [uri]`.
    Static {
        #[serde(default)]
        services: BTreeMap<String, Vec<String>>,
    },

    /// Host name lookup per service id.
    Dns {
        #[serde(default)]
        domain: Option<String>,
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default = "default_scheme")]
        scheme: String,
        #[serde(default, deserialize_with = "trellis_config::de::string_list")]
        services: Vec<String>,
    },

    /// The local instance from the cloud metadata service.
    CloudMetadata {
        service_id: String,
        #[serde(default = "default_metadata_url")]
        url: String,
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default = "default_scheme")]
        scheme: String,
    },

    /// A Consul agent.
    Consul {
        url: String,
        #[serde(default)]
        passing_only: bool,
    },
}

impl BackendConfig {
    fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Static { .. } => "static",
            BackendConfig::Dns { .. } => "dns",
            BackendConfig::CloudMetadata { .. } => "cloud-metadata",
            BackendConfig::Consul { .. } => "consul",
        }
    }

    /// Construct the backend.
    pub fn build(&self) -> Result<Arc<dyn DiscoveryClient>> {
        let backend: Arc<dyn DiscoveryClient> = match self {
            BackendConfig::Static { services } => Arc::new(StaticDiscovery::new(services.clone())?),
            BackendConfig::Dns {
                domain,
                port,
                scheme,
                services,
            } => {
                let mut dns = DnsDiscovery::new(*port)
                    .with_scheme(scheme.clone())
                    .with_services(services);
                if let Some(domain) = domain {
                    dns = dns.with_domain(domain.clone());
                }
                Arc::new(dns)
            }
            BackendConfig::CloudMetadata {
                service_id,
                url,
                port,
                scheme,
            } => Arc::new(
                CloudMetadataDiscovery::with_url(service_id, url.clone(), *port)?
                    .with_scheme(scheme.clone()),
            ),
            BackendConfig::Consul { url, passing_only } => {
                Arc::new(ConsulDiscovery::new(url.clone())?.passing_only(*passing_only))
            }
        };
        Ok(backend)
    }
}

impl Validate for BackendConfig {
    fn validate(&self) -> trellis_config::Result<()> {
        match self {
            BackendConfig::Static { services } => {
                for (service, uris) in services {
                    ConfigValidator::not_blank(service, "discovery.backends.services")?;
                    for uri in uris {
                        if url::Url::parse(uri).is_err() {
                            return Err(ConfigError::invalid(
                                "discovery.backends.services",
                                format!("'{}' is not a valid URI for service '{}'", uri, service),
                            ));
                        }
                    }
                }
                Ok(())
            }
            BackendConfig::Dns { port, scheme, .. } => {
                ConfigValidator::is_port(*port, "discovery.backends.port")?;
                ConfigValidator::not_blank(scheme, "discovery.backends.scheme")
            }
            BackendConfig::CloudMetadata {
                service_id,
                url,
                port,
                scheme,
            } => {
                ConfigValidator::not_blank(service_id, "discovery.backends.service-id")?;
                ConfigValidator::is_url(url, "discovery.backends.url")?;
                ConfigValidator::is_port(*port, "discovery.backends.port")?;
                ConfigValidator::not_blank(scheme, "discovery.backends.scheme")
            }
            BackendConfig::Consul { url, .. } => ConfigValidator::is_url(url, "discovery.backends.url"),
        }
    }
}

/// The `discovery` configuration section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    pub policy: AggregationPolicy,
    pub backends: Vec<BackendConfig>,
}

impl DiscoveryConfig {
    /// Validate and build every backend, in order, behind one composite client.
    pub fn build(&self) -> Result<CompositeDiscovery> {
        self.validate()
            .map_err(|e| DiscoveryError::InvalidConfiguration(e.to_string()))?;

        let backends = self
            .backends
            .iter()
            .map(|backend| {
                backend.build().map_err(|e| {
                    DiscoveryError::InvalidConfiguration(format!("{} backend: {}", backend.kind(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            backends = backends.len(),
            policy = ?self.policy,
            "Built composite discovery client"
        );
        Ok(CompositeDiscovery::with_policy(backends, self.policy))
    }
}

impl Validate for DiscoveryConfig {
    fn validate(&self) -> trellis_config::Result<()> {
        self.backends.validate()
    }
}
