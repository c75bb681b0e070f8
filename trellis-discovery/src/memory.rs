//! In-memory service discovery (for testing)

use crate::service::{
    hyphenate, DiscoveryClient, DiscoveryError, Result, ServiceInstance, ServiceRegistry,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory service discovery (for testing/development)
///
/// Instances are kept in registration order; registering an existing id
/// replaces it in place.
#[derive(Clone)]
pub struct InMemoryDiscovery {
    name: String,
    services: Arc<RwLock<Vec<ServiceInstance>>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryDiscovery {
    /// Create new in-memory discovery
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// Create one with a description, to tell several apart.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            services: Arc::new(RwLock::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Clear all registered services
    pub async fn clear(&self) {
        self.services.write().await.clear();
    }

    /// Get count of registered instances
    pub async fn count(&self) -> usize {
        self.services.read().await.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(DiscoveryError::Closed(self.name.clone()));
        }
        Ok(())
    }
}

impl Default for InMemoryDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceRegistry for InMemoryDiscovery {
    async fn register(&self, instance: &ServiceInstance) -> Result<()> {
        self.ensure_open()?;
        let mut services = self.services.write().await;
        match services.iter_mut().find(|s| s.id == instance.id) {
            Some(existing) => *existing = instance.clone(),
            None => services.push(instance.clone()),
        }
        Ok(())
    }

    async fn deregister(&self, instance_id: &str) -> Result<()> {
        self.ensure_open()?;
        let mut services = self.services.write().await;
        let index = services
            .iter()
            .position(|s| s.id == instance_id)
            .ok_or_else(|| DiscoveryError::ServiceNotFound(instance_id.to_string()))?;
        services.remove(index);
        Ok(())
    }
}

#[async_trait]
impl DiscoveryClient for InMemoryDiscovery {
    async fn resolve_instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>> {
        self.ensure_open()?;
        let service_id = hyphenate(service_id);
        Ok(self
            .services
            .read()
            .await
            .iter()
            .filter(|s| s.service_id == service_id)
            .cloned()
            .collect())
    }

    async fn resolve_service_ids(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut service_ids: Vec<String> = self
            .services
            .read()
            .await
            .iter()
            .map(|s| s.service_id.clone())
            .collect();

        service_ids.sort();
        service_ids.dedup();

        Ok(service_ids)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: &str, service: &str) -> ServiceInstance {
        ServiceInstance::new(id, service, "http://localhost:8080").unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_discovery() {
        let discovery = InMemoryDiscovery::new();

        // Register
        discovery.register(&instance("svc-1", "api")).await.unwrap();
        discovery.register(&instance("svc-2", "api")).await.unwrap();
        assert_eq!(discovery.count().await, 2);

        // Discover, in registration order
        let instances = discovery.resolve_instances("api").await.unwrap();
        let ids: Vec<_> = instances.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["svc-1", "svc-2"]);

        // Deregister
        discovery.deregister("svc-1").await.unwrap();
        assert_eq!(discovery.count().await, 1);
        assert!(discovery.deregister("svc-1").await.is_err());
    }

    #[tokio::test]
    async fn test_register_replaces_same_id() {
        let discovery = InMemoryDiscovery::new();
        discovery.register(&instance("svc-1", "api")).await.unwrap();
        discovery
            .register(&instance("svc-1", "api").with_metadata("zone", "b"))
            .await
            .unwrap();

        let instances = discovery.resolve_instances("api").await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].metadata.get("zone").map(String::as_str), Some("b"));
    }

    #[tokio::test]
    async fn test_unknown_service_is_empty() {
        let discovery = InMemoryDiscovery::new();
        assert!(discovery.resolve_instances("nonexistent").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_service_ids_sorted_and_hyphenated() {
        let discovery = InMemoryDiscovery::new();
        discovery.register(&instance("1", "userService")).await.unwrap();
        discovery.register(&instance("2", "billing")).await.unwrap();
        discovery.register(&instance("3", "user_service")).await.unwrap();

        assert_eq!(
            discovery.resolve_service_ids().await.unwrap(),
            vec!["billing".to_string(), "user-service".to_string()]
        );
        assert_eq!(discovery.resolve_instances("UserService").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_closed_discovery_fails() {
        let discovery = InMemoryDiscovery::named("primary");
        discovery.close().await.unwrap();
        discovery.close().await.unwrap();

        let err = discovery.resolve_service_ids().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Closed(ref name) if name == "primary"));
        assert!(discovery.is_closed());
    }
}
