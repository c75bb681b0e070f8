//! Consul service discovery implementation

use crate::service::{
    hyphenate, DiscoveryClient, DiscoveryError, HealthStatus, Result, ServiceInstance,
    ServiceRegistry,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Consul service discovery client
pub struct ConsulDiscovery {
    base_url: String,
    scheme: String,
    passing_only: bool,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct HealthEntry {
    #[serde(rename = "Node", default)]
    node: Option<NodeDetail>,
    #[serde(rename = "Service")]
    service: ServiceDetail,
    #[serde(rename = "Checks", default)]
    checks: Vec<CheckDetail>,
}

#[derive(Debug, Deserialize)]
struct NodeDetail {
    #[serde(rename = "Address", default)]
    address: String,
}

#[derive(Debug, Deserialize)]
struct ServiceDetail {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Service")]
    service: String,
    #[serde(rename = "Address", default)]
    address: String,
    #[serde(rename = "Port")]
    port: u16,
    #[serde(rename = "Tags", default)]
    tags: Option<Vec<String>>,
    #[serde(rename = "Meta", default)]
    meta: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct CheckDetail {
    #[serde(rename = "CheckID", default)]
    check_id: String,
    #[serde(rename = "Status")]
    status: String,
}

fn health_of(checks: &[CheckDetail]) -> HealthStatus {
    if checks.is_empty() {
        return HealthStatus::Unknown;
    }
    if checks
        .iter()
        .any(|c| c.check_id.starts_with("_service_maintenance") || c.check_id.starts_with("_node_maintenance"))
    {
        return HealthStatus::OutOfService;
    }
    if checks.iter().any(|c| c.status == "critical") {
        return HealthStatus::Down;
    }
    HealthStatus::Up
}

impl ConsulDiscovery {
    /// Create new Consul discovery client
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use trellis_discovery::ConsulDiscovery;
    ///
    /// let consul = ConsulDiscovery::new("http://localhost:8500")?;
    /// ```
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        url::Url::parse(&base_url).map_err(|e| {
            DiscoveryError::InvalidConfiguration(format!("Invalid Consul URL '{}': {}", base_url, e))
        })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            scheme: "http".to_string(),
            passing_only: false,
            client: reqwest::Client::new(),
        })
    }

    /// Scheme used for the instance URIs.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Ask Consul to return only instances whose checks pass.
    pub fn passing_only(mut self, passing_only: bool) -> Self {
        self.passing_only = passing_only;
        self
    }

    fn health_url(&self, service_id: &str) -> String {
        let mut url = format!("{}/v1/health/service/{}", self.base_url, service_id);
        if self.passing_only {
            url.push_str("?passing");
        }
        url
    }

    fn to_instances(&self, entries: Vec<HealthEntry>) -> Result<Vec<ServiceInstance>> {
        entries
            .into_iter()
            .map(|entry| {
                let health = health_of(&entry.checks);
                let detail = entry.service;
                let address = if detail.address.is_empty() {
                    entry.node.map(|n| n.address).unwrap_or_default()
                } else {
                    detail.address
                };
                let host = if address.contains(':') {
                    format!("[{}]", address)
                } else {
                    address
                };

                let uri = format!("{}://{}:{}", self.scheme, host, detail.port);
                let mut instance = ServiceInstance::new(detail.id, &detail.service, &uri)
                    .map_err(|_| DiscoveryError::Resolution(format!("Consul returned unusable address '{}'", uri)))?
                    .with_health_status(health);
                instance.metadata = detail.meta.unwrap_or_default();
                if let Some(tags) = detail.tags.filter(|t| !t.is_empty()) {
                    instance.metadata.insert("tags".to_string(), tags.join(","));
                }
                Ok(instance)
            })
            .collect()
    }
}

#[async_trait]
impl ServiceRegistry for ConsulDiscovery {
    async fn register(&self, instance: &ServiceInstance) -> Result<()> {
        let url = format!("{}/v1/agent/service/register", self.base_url);

        let payload = serde_json::json!({
            "ID": instance.id,
            "Name": instance.service_id,
            "Address": instance.host(),
            "Port": instance.port(),
            "Meta": instance.metadata,
        });

        let response = self.client.put(&url).json(&payload).send().await?;

        if response.status().is_success() {
            info!("Registered service {} with Consul", instance.id);
            Ok(())
        } else {
            let error = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(DiscoveryError::RegistrationFailed(error))
        }
    }

    async fn deregister(&self, instance_id: &str) -> Result<()> {
        let url = format!(
            "{}/v1/agent/service/deregister/{}",
            self.base_url, instance_id
        );

        let response = self.client.put(&url).send().await?;

        if response.status().is_success() {
            info!("Deregistered service {} from Consul", instance_id);
            Ok(())
        } else {
            let error = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(DiscoveryError::DeregistrationFailed(error))
        }
    }
}

#[async_trait]
impl DiscoveryClient for ConsulDiscovery {
    async fn resolve_instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>> {
        let service_id = hyphenate(service_id);
        let response = self.client.get(self.health_url(&service_id)).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let entries: Vec<HealthEntry> = response.error_for_status()?.json().await?;
        let instances = self.to_instances(entries)?;

        debug!(
            "Discovered {} instances of service {}",
            instances.len(),
            service_id
        );
        Ok(instances)
    }

    async fn resolve_service_ids(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1/catalog/services", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Resolution(format!(
                "Failed to list services: {}",
                response.status()
            )));
        }

        let services: HashMap<String, Vec<String>> = response.json().await?;
        let mut ids: Vec<String> = services.into_keys().collect();
        ids.sort();
        Ok(ids)
    }

    fn describe(&self) -> String {
        format!("consul({})", self.base_url)
    }
}
