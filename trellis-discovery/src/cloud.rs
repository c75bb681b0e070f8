//! Cloud metadata discovery
//!
//! Describes the local droplet as a single instance using the DigitalOcean
//! metadata service. The document is fetched once and cached.

use crate::service::{hyphenate, DiscoveryClient, DiscoveryError, Result, ServiceInstance};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Default metadata endpoint.
pub const DEFAULT_METADATA_URL: &str = "http://169.254.169.254/metadata/v1.json";

/// Timeout applied to connecting and to the whole request.
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// The subset of the metadata document that is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DropletMetadata {
    #[serde(default)]
    pub droplet_id: Option<Value>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub vendor_data: Option<String>,
    #[serde(default)]
    pub user_data: Option<String>,
    #[serde(default)]
    pub interfaces: Interfaces,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Interfaces {
    #[serde(default)]
    pub public: Vec<NetworkInterface>,
    #[serde(default)]
    pub private: Vec<NetworkInterface>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkInterface {
    #[serde(default)]
    pub ipv4: Option<Address>,
    #[serde(default)]
    pub ipv6: Option<Address>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub ip_address: Option<String>,
}

fn first_ip(interfaces: &[NetworkInterface], pick: fn(&NetworkInterface) -> Option<&Address>) -> Option<String> {
    interfaces
        .first()
        .and_then(pick)
        .and_then(|a| a.ip_address.clone())
        .filter(|ip| !ip.is_empty())
}

impl DropletMetadata {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| DiscoveryError::Metadata(format!("Malformed metadata document: {}", e)))
    }

    /// The droplet id as text, whether the document carries a number or a string.
    pub fn instance_id(&self) -> Option<String> {
        match self.droplet_id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn public_ipv4(&self) -> Option<String> {
        first_ip(&self.interfaces.public, |i| i.ipv4.as_ref())
    }

    pub fn private_ipv4(&self) -> Option<String> {
        first_ip(&self.interfaces.private, |i| i.ipv4.as_ref())
    }

    pub fn public_ipv6(&self) -> Option<String> {
        first_ip(&self.interfaces.public, |i| i.ipv6.as_ref())
    }

    pub fn private_ipv6(&self) -> Option<String> {
        first_ip(&self.interfaces.private, |i| i.ipv6.as_ref())
    }
}

/// Discovery backed by the instance metadata service.
#[derive(Debug)]
pub struct CloudMetadataDiscovery {
    service_id: String,
    metadata_url: String,
    port: u16,
    scheme: String,
    client: reqwest::Client,
    cache: OnceCell<ServiceInstance>,
}

impl CloudMetadataDiscovery {
    pub fn new(service_id: &str, port: u16) -> Result<Self> {
        Self::with_url(service_id, DEFAULT_METADATA_URL, port)
    }

    /// Use another metadata endpoint.
    pub fn with_url(service_id: &str, metadata_url: impl Into<String>, port: u16) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(METADATA_TIMEOUT)
            .timeout(METADATA_TIMEOUT)
            .build()?;

        Ok(Self {
            service_id: hyphenate(service_id),
            metadata_url: metadata_url.into(),
            port,
            scheme: "http".to_string(),
            client,
            cache: OnceCell::new(),
        })
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// The local instance, fetching the metadata on first use.
    pub async fn local_instance(&self) -> Result<&ServiceInstance> {
        self.cache.get_or_try_init(|| self.fetch()).await
    }

    async fn fetch(&self) -> Result<ServiceInstance> {
        debug!(url = %self.metadata_url, "Fetching instance metadata");

        let body = self
            .client
            .get(&self.metadata_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let instance = self.to_instance(&DropletMetadata::parse(&body)?)?;
        info!(instance = %instance.id, uri = %instance.uri, "Resolved local instance from metadata");
        Ok(instance)
    }

    /// Build the instance described by a metadata document.
    pub fn to_instance(&self, metadata: &DropletMetadata) -> Result<ServiceInstance> {
        let ip = metadata
            .public_ipv4()
            .or_else(|| metadata.private_ipv4())
            .ok_or_else(|| DiscoveryError::Metadata("No IPv4 address in metadata".to_string()))?;

        let id = metadata
            .instance_id()
            .or_else(|| metadata.hostname.clone())
            .unwrap_or_else(|| ip.clone());

        let uri = format!("{}://{}:{}", self.scheme, ip, self.port);
        let mut instance = ServiceInstance::new(id, &self.service_id, &uri)?;

        let entries = [
            ("instance-id", metadata.instance_id()),
            ("name", metadata.hostname.clone()),
            ("region", metadata.region.clone()),
            ("private-ipv4", metadata.private_ipv4()),
            ("public-ipv4", metadata.public_ipv4()),
            ("private-ipv6", metadata.private_ipv6()),
            ("public-ipv6", metadata.public_ipv6()),
            ("user-data", metadata.user_data.clone()),
            ("vendor-data", metadata.vendor_data.clone()),
        ];
        for (key, value) in entries {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                instance = instance.with_metadata(key, value);
            }
        }

        Ok(instance)
    }
}

#[async_trait]
impl DiscoveryClient for CloudMetadataDiscovery {
    async fn resolve_instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>> {
        if hyphenate(service_id) != self.service_id {
            return Ok(Vec::new());
        }
        Ok(vec![self.local_instance().await?.clone()])
    }

    async fn resolve_service_ids(&self) -> Result<Vec<String>> {
        Ok(vec![self.service_id.clone()])
    }

    fn describe(&self) -> String {
        "cloudMetadata".to_string()
    }
}
