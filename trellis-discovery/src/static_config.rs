//! Discovery from a fixed, configured list of instances

use crate::service::{hyphenate, DiscoveryClient, Result, ServiceInstance};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Instances listed in configuration, keyed by service id.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    services: BTreeMap<String, Vec<ServiceInstance>>,
}

impl StaticDiscovery {
    /// Build from `service id -> [uri]`. Instance ids are
    /// `<service>-<index>`.
    pub fn new<I, K, U>(services: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Vec<U>)>,
        K: AsRef<str>,
        U: AsRef<str>,
    {
        let mut map: BTreeMap<String, Vec<ServiceInstance>> = BTreeMap::new();
        for (service, uris) in services {
            let service_id = hyphenate(service.as_ref());
            let instances = map.entry(service_id.clone()).or_default();
            for uri in uris {
                let id = format!("{}-{}", service_id, instances.len());
                instances.push(ServiceInstance::new(id, &service_id, uri.as_ref())?);
            }
        }
        Ok(Self { services: map })
    }

    pub fn len(&self) -> usize {
        self.services.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DiscoveryClient for StaticDiscovery {
    async fn resolve_instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>> {
        Ok(self
            .services
            .get(&hyphenate(service_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn resolve_service_ids(&self) -> Result<Vec<String>> {
        Ok(self.services.keys().cloned().collect())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_instances() {
        let discovery = StaticDiscovery::new([
            ("billing", vec!["http://10.0.0.5:8080", "http://10.0.0.6:8080"]),
            ("userService", vec!["https://users.internal"]),
        ])
        .unwrap();

        assert_eq!(discovery.len(), 3);

        let billing = discovery.resolve_instances("billing").await.unwrap();
        let ids: Vec<_> = billing.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["billing-0", "billing-1"]);
        assert_eq!(billing[1].host(), Some("10.0.0.6"));

        let users = discovery.resolve_instances("user_service").await.unwrap();
        assert_eq!(users[0].port(), Some(443));

        assert_eq!(
            discovery.resolve_service_ids().await.unwrap(),
            vec!["billing".to_string(), "user-service".to_string()]
        );
        assert!(discovery.resolve_instances("unknown").await.unwrap().is_empty());
    }

    #[test]
    fn test_invalid_uri_rejected() {
        let result = StaticDiscovery::new([("billing", vec!["10.0.0.5:8080:bad"])]);
        assert!(result.is_err());
    }
}
