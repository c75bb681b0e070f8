//! DNS-based discovery
//!
//! Each service id is resolved as a host name, optionally under a search
//! domain (`billing` -> `billing.svc.cluster.local`), and every address
//! becomes one instance.

use crate::service::{hyphenate, DiscoveryClient, DiscoveryError, Result, ServiceInstance};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::net::lookup_host;
use tracing::debug;
use url::Url;

/// Resolves service ids through the system resolver.
#[derive(Debug, Clone)]
pub struct DnsDiscovery {
    domain: Option<String>,
    port: u16,
    scheme: String,
    services: Vec<String>,
}

impl DnsDiscovery {
    pub fn new(port: u16) -> Self {
        Self {
            domain: None,
            port,
            scheme: "http".to_string(),
            services: Vec::new(),
        }
    }

    /// Append a search domain to every service id.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        let domain = domain.into();
        let domain = domain.trim_matches('.');
        self.domain = (!domain.is_empty()).then(|| domain.to_string());
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Service ids reported by `resolve_service_ids`; DNS cannot list them.
    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.services = services.into_iter().map(|s| hyphenate(s.as_ref())).collect();
        self
    }

    /// Host name queried for a service id.
    pub fn host_for(&self, service_id: &str) -> String {
        match &self.domain {
            Some(domain) => format!("{}.{}", service_id, domain),
            None => service_id.to_string(),
        }
    }

    fn instance(&self, service_id: &str, addr: SocketAddr) -> Result<ServiceInstance> {
        let uri = Url::parse(&format!("{}://{}", self.scheme, addr))
            .map_err(|e| DiscoveryError::Resolution(format!("{}: {}", addr, e)))?;
        Ok(ServiceInstance::from_url(
            format!("{}-{}", service_id, addr.ip()),
            service_id,
            uri,
        ))
    }
}

/// Whether a lookup failed because the name does not exist, as opposed to
/// the resolver being unreachable or failing.
///
/// The system resolver only reports this through the error text
/// (`EAI_NONAME`/`EAI_NODATA`, `WSAHOST_NOT_FOUND`).
fn is_unknown_name(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::NotFound {
        return true;
    }
    let message = err.to_string().to_lowercase();
    [
        "name or service not known",
        "no address associated with hostname",
        "nodename nor servname provided",
        "no such host is known",
    ]
    .iter()
    .any(|pattern| message.contains(pattern))
}

#[async_trait]
impl DiscoveryClient for DnsDiscovery {
    async fn resolve_instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>> {
        let host = self.host_for(service_id);

        let addrs = match lookup_host((host.as_str(), self.port)).await {
            Ok(addrs) => addrs,
            Err(e) if is_unknown_name(&e) => {
                debug!(host = %host, "No DNS record for service");
                return Ok(Vec::new());
            }
            Err(e) => return Err(DiscoveryError::Resolution(format!("{}: {}", host, e))),
        };

        let mut seen: Vec<SocketAddr> = Vec::new();
        for addr in addrs {
            if !seen.contains(&addr) {
                seen.push(addr);
            }
        }
        debug!(host = %host, addresses = seen.len(), "Resolved service via DNS");

        seen.into_iter()
            .map(|addr| self.instance(service_id, addr))
            .collect()
    }

    async fn resolve_service_ids(&self) -> Result<Vec<String>> {
        Ok(self.services.clone())
    }

    fn describe(&self) -> String {
        match &self.domain {
            Some(domain) => format!("dns({})", domain),
            None => "dns".to_string(),
        }
    }
}
