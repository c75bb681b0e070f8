//! Composite discovery
//!
//! Fans a query out to every backend concurrently and concatenates the
//! results in backend order. Duplicates across backends are kept.

use crate::service::{hyphenate, DiscoveryClient, DiscoveryError, Result, ServiceInstance};
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// How backend failures affect an aggregate query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationPolicy {
    /// Any backend failure fails the whole query.
    #[default]
    Strict,

    /// Failed backends are logged and left out of the result.
    BestEffort,
}

/// Aggregates several discovery backends behind one client.
#[derive(Clone, Default)]
pub struct CompositeDiscovery {
    backends: Vec<Arc<dyn DiscoveryClient>>,
    policy: AggregationPolicy,
}

impl CompositeDiscovery {
    pub fn new(backends: Vec<Arc<dyn DiscoveryClient>>) -> Self {
        Self::with_policy(backends, AggregationPolicy::default())
    }

    pub fn with_policy(backends: Vec<Arc<dyn DiscoveryClient>>, policy: AggregationPolicy) -> Self {
        Self { backends, policy }
    }

    /// Add a backend after the existing ones.
    pub fn push(&mut self, backend: Arc<dyn DiscoveryClient>) {
        self.backends.push(backend);
    }

    pub fn backends(&self) -> &[Arc<dyn DiscoveryClient>] {
        &self.backends
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    /// Instances of a service from every backend, in backend order.
    pub async fn get_instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>> {
        let service_id = hyphenate(service_id);
        debug!(service = %service_id, backends = self.backends.len(), "Resolving instances");

        self.fan_out(move |backend| {
            let service_id = service_id.clone();
            async move { backend.resolve_instances(&service_id).await }
        })
        .await
    }

    /// Service ids known to any backend, in backend order.
    pub async fn get_service_ids(&self) -> Result<Vec<String>> {
        self.fan_out(|backend| async move { backend.resolve_service_ids().await })
            .await
    }

    /// Close every backend. All are attempted even after a failure.
    pub async fn close_all(&self) -> Result<()> {
        let mut first = None;
        let mut failures = 0;

        for backend in &self.backends {
            if let Err(e) = backend.close().await {
                warn!(backend = %backend.describe(), error = %e, "Failed to close discovery backend");
                failures += 1;
                first.get_or_insert(e);
            }
        }

        match first {
            Some(first) => Err(DiscoveryError::Close {
                first: Box::new(first),
                failures,
            }),
            None => Ok(()),
        }
    }

    async fn fan_out<T, F, Fut>(&self, query: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn DiscoveryClient>) -> Fut,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        let mut set = JoinSet::new();
        for (index, backend) in self.backends.iter().enumerate() {
            let fut = query(Arc::clone(backend));
            set.spawn(async move { (index, AssertUnwindSafe(fut).catch_unwind().await) });
        }

        let mut slots: Vec<Option<Vec<T>>> = Vec::with_capacity(self.backends.len());
        slots.resize_with(self.backends.len(), || None);

        while let Some(joined) = set.join_next().await {
            let (index, outcome) = joined.map_err(|e| {
                DiscoveryError::Resolution(format!("Discovery task failed: {}", e))
            })?;
            let backend = self.backends[index].describe();

            let result = match outcome {
                Ok(result) => result,
                Err(_) => Err(DiscoveryError::Resolution("backend panicked".to_string())),
            };

            match result {
                Ok(items) => slots[index] = Some(items),
                Err(e) if self.policy == AggregationPolicy::BestEffort => {
                    warn!(backend = %backend, error = %e, "Discovery backend failed, skipping");
                }
                Err(e) => {
                    set.abort_all();
                    return Err(DiscoveryError::Backend {
                        backend,
                        source: Box::new(e),
                    });
                }
            }
        }

        Ok(slots.into_iter().flatten().flatten().collect())
    }
}

#[async_trait]
impl DiscoveryClient for CompositeDiscovery {
    async fn resolve_instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>> {
        self.get_instances(service_id).await
    }

    async fn resolve_service_ids(&self) -> Result<Vec<String>> {
        self.get_service_ids().await
    }

    async fn close(&self) -> Result<()> {
        self.close_all().await
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CompositeDiscovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.backends.iter().map(|b| b.describe()).collect();
        write!(f, "compositeDiscoveryClient({})", names.join(","))
    }
}

impl fmt::Debug for CompositeDiscovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeDiscovery")
            .field("backends", &self.to_string())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDiscovery;
    use crate::service::ServiceRegistry;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct Failing;

    #[async_trait]
    impl DiscoveryClient for Failing {
        async fn resolve_instances(&self, _service_id: &str) -> Result<Vec<ServiceInstance>> {
            Err(DiscoveryError::Resolution("unreachable".to_string()))
        }

        async fn resolve_service_ids(&self) -> Result<Vec<String>> {
            Err(DiscoveryError::Resolution("unreachable".to_string()))
        }

        async fn close(&self) -> Result<()> {
            Err(DiscoveryError::Resolution("stuck".to_string()))
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    struct Slow(Arc<InMemoryDiscovery>);

    #[async_trait]
    impl DiscoveryClient for Slow {
        async fn resolve_instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.0.resolve_instances(service_id).await
        }

        async fn resolve_service_ids(&self) -> Result<Vec<String>> {
            self.0.resolve_service_ids().await
        }

        fn describe(&self) -> String {
            "slow".to_string()
        }
    }

    /// Sets its flag once the in-flight lookup future is dropped.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Never answers within a test's lifetime.
    struct Stalled {
        dropped: Arc<AtomicBool>,
    }

    #[async_trait]
    impl DiscoveryClient for Stalled {
        async fn resolve_instances(&self, _service_id: &str) -> Result<Vec<ServiceInstance>> {
            let _flag = DropFlag(Arc::clone(&self.dropped));
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }

        async fn resolve_service_ids(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn describe(&self) -> String {
            "stalled".to_string()
        }
    }

    /// Records whether its lookup ran to completion.
    struct Delayed {
        completed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl DiscoveryClient for Delayed {
        async fn resolve_instances(&self, _service_id: &str) -> Result<Vec<ServiceInstance>> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.completed.store(true, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn resolve_service_ids(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn describe(&self) -> String {
            "delayed".to_string()
        }
    }

    async fn wait_for(flag: &AtomicBool) -> bool {
        for _ in 0..100 {
            if flag.load(Ordering::SeqCst) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        flag.load(Ordering::SeqCst)
    }

    async fn memory(name: &str, ids: &[&str]) -> Arc<InMemoryDiscovery> {
        let discovery = InMemoryDiscovery::named(name);
        for id in ids {
            let instance = ServiceInstance::new(*id, "billing", "http://10.0.0.1:8080").unwrap();
            discovery.register(&instance).await.unwrap();
        }
        Arc::new(discovery)
    }

    #[tokio::test]
    async fn test_results_keep_backend_order() {
        let slow = Arc::new(Slow(memory("a", &["a1"]).await));
        let fast = memory("b", &["b1", "b2"]).await;
        let composite = CompositeDiscovery::new(vec![slow, fast]);

        let ids: Vec<String> = composite
            .get_instances("Billing")
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["a1", "b1", "b2"]);
    }

    #[tokio::test]
    async fn test_service_ids_are_not_deduplicated() {
        let composite = CompositeDiscovery::new(vec![
            memory("a", &["a1"]).await,
            memory("b", &["b1"]).await,
        ]);
        assert_eq!(
            composite.get_service_ids().await.unwrap(),
            vec!["billing".to_string(), "billing".to_string()]
        );
    }

    #[tokio::test]
    async fn test_strict_policy_fails() {
        let composite = CompositeDiscovery::new(vec![memory("a", &["a1"]).await, Arc::new(Failing)]);

        let err = composite.get_instances("billing").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Backend { ref backend, .. } if backend == "failing"));
    }

    #[tokio::test]
    async fn test_strict_failure_cancels_pending_backends() {
        let completed = Arc::new(AtomicBool::new(false));
        let composite = CompositeDiscovery::new(vec![
            Arc::new(Delayed {
                completed: Arc::clone(&completed),
            }),
            Arc::new(Failing),
        ]);

        let err = composite.get_instances("billing").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Backend { ref backend, .. } if backend == "failing"));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!completed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_dropped_query_cancels_backends() {
        let dropped = Arc::new(AtomicBool::new(false));
        let composite = CompositeDiscovery::new(vec![
            memory("a", &["a1"]).await,
            Arc::new(Stalled {
                dropped: Arc::clone(&dropped),
            }),
        ]);

        let outcome =
            tokio::time::timeout(Duration::from_millis(50), composite.get_instances("billing")).await;
        assert!(outcome.is_err());
        assert!(wait_for(&dropped).await);
    }

    #[tokio::test]
    async fn test_best_effort_skips_failures() {
        let composite = CompositeDiscovery::with_policy(
            vec![Arc::new(Failing), memory("b", &["b1"]).await],
            AggregationPolicy::BestEffort,
        );

        let instances = composite.get_instances("billing").await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].id, "b1");
    }

    #[tokio::test]
    async fn test_no_backends() {
        let composite = CompositeDiscovery::default();
        assert!(composite.get_instances("billing").await.unwrap().is_empty());
        assert!(composite.get_service_ids().await.unwrap().is_empty());
        assert!(composite.close_all().await.is_ok());
        assert_eq!(composite.describe(), "compositeDiscoveryClient()");
    }

    #[tokio::test]
    async fn test_close_attempts_every_backend() {
        let a = memory("a", &[]).await;
        let c = memory("c", &[]).await;
        let composite = CompositeDiscovery::new(vec![
            a.clone(),
            Arc::new(Failing),
            Arc::new(Failing),
            c.clone(),
        ]);

        let err = composite.close().await.unwrap_err();
        match err {
            DiscoveryError::Close { first, failures } => {
                assert_eq!(failures, 2);
                assert!(first.to_string().contains("stuck"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(a.is_closed());
        assert!(c.is_closed());
    }

    #[tokio::test]
    async fn test_describe() {
        let composite = CompositeDiscovery::new(vec![
            memory("primary", &[]).await,
            memory("secondary", &[]).await,
        ]);
        assert_eq!(composite.describe(), "compositeDiscoveryClient(primary,secondary)");
        assert_eq!(composite.policy(), AggregationPolicy::Strict);
    }

    #[test]
    fn test_policy_serde() {
        let policy: AggregationPolicy = serde_json::from_str("\"best-effort\"").unwrap();
        assert_eq!(policy, AggregationPolicy::BestEffort);
    }
}
