//! Service Discovery for Trellis
//!
//! This crate resolves logical service ids to concrete instances.
//!
//! ## Features
//!
//! - **Composite Discovery** - Query several backends concurrently and merge the results
//! - **Backends** - Static configuration, DNS, cloud metadata, Consul, or in-memory
//! - **Load Balancing** - Round-robin, random or first-available selection
//! - **Configuration** - Build the whole stack from a `discovery` config section
//!
//! Service ids are hyphenated before lookup, so `billingService`,
//! `billing_service` and `billing-service` name the same service.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis_discovery::*;
//!
//! # tokio_test::block_on(async {
//! let primary = InMemoryDiscovery::named("primary");
//! primary
//!     .register(&ServiceInstance::new("api-1", "api", "http://10.0.0.1:8080").unwrap())
//!     .await
//!     .unwrap();
//!
//! let fallback = StaticDiscovery::new([("api", vec!["http://10.0.0.2:8080"])]).unwrap();
//!
//! let discovery = CompositeDiscovery::new(vec![Arc::new(primary), Arc::new(fallback)]);
//! let instances = discovery.get_instances("api").await.unwrap();
//! assert_eq!(instances.len(), 2);
//!
//! // Pick one with a load balancer
//! let resolver = ServiceResolver::new(discovery, LoadBalancingStrategy::RoundRobin);
//! let instance = resolver.resolve("api").await.unwrap();
//! println!("Calling {}", instance.url());
//! # });
//! ```
//!
//! ### Consul Discovery
//!
//! ```rust,ignore
//! use trellis_discovery::*;
//!
//! let consul = ConsulDiscovery::new("http://localhost:8500")?;
//! let instances = consul.resolve_instances("api").await?;
//! ```

pub mod cloud;
pub mod composite;
pub mod config;
pub mod consul;
pub mod dns;
pub mod memory;
pub mod service;
pub mod static_config;

pub use cloud::{CloudMetadataDiscovery, DropletMetadata};
pub use composite::{AggregationPolicy, CompositeDiscovery};
pub use config::{BackendConfig, DiscoveryConfig};
pub use consul::ConsulDiscovery;
pub use dns::DnsDiscovery;
pub use memory::InMemoryDiscovery;
pub use service::{
    hyphenate, DiscoveryClient, DiscoveryError, HealthStatus, LoadBalancingStrategy, Result,
    ServiceInstance, ServiceRegistry, ServiceResolver,
};
pub use static_config::StaticDiscovery;
