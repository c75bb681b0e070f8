//! Trellis - URI route resolution, version-aware dispatch and composite
//! service discovery.
//!
//! This crate re-exports the Trellis member crates and adds [`Settings`],
//! which builds the router's version resolver and the composite discovery
//! client from one configuration file.
//!
//! ```rust
//! use trellis::prelude::*;
//!
//! let settings = Settings::parse(
//!     r#"
//!     [router.versioning]
//!     default-version = "1"
//!
//!     [[discovery.backends]]
//!     type = "static"
//!     services = { billing = ["http://10.0.0.5:8080"] }
//!     "#,
//!     FileFormat::Toml,
//! )
//! .unwrap();
//!
//! let table = RouteTable::builder()
//!     .route(RouteEntry::get("/invoices/{id}", "show_invoice_v1").version("1"))
//!     .route(RouteEntry::get("/invoices/{id}", "show_invoice_v2").version(">=2"))
//!     .build()
//!     .unwrap();
//!
//! let router = settings.router(table).unwrap();
//! let matched = router.route(&RequestHead::get("/invoices/7")).unwrap();
//! assert_eq!(*matched.target(), "show_invoice_v1");
//!
//! # tokio_test::block_on(async {
//! let discovery = settings.discovery_client().unwrap();
//! assert_eq!(discovery.get_instances("billing").await.unwrap().len(), 1);
//! # });
//! ```

pub mod settings;

pub use settings::{RouterSettings, Settings};

pub use trellis_config as config;
pub use trellis_discovery as discovery;
pub use trellis_log as log;
pub use trellis_router as router;

pub use trellis_config::{ConfigError, ConfigManager, FileFormat, Validate};
pub use trellis_discovery::{
    AggregationPolicy, CompositeDiscovery, DiscoveryClient, DiscoveryConfig, DiscoveryError,
    ServiceInstance, ServiceResolver,
};
pub use trellis_router::{
    HttpMethod, RequestHead, RouteDefinitionError, RouteEntry, RouteError, RouteMatch, RouteTable,
    Router, VersionResolver, VersioningConfig,
};

/// Prelude for common imports
pub mod prelude {
    pub use crate::settings::Settings;
    pub use trellis_config::{ConfigError, FileFormat};
    pub use trellis_discovery::{
        AggregationPolicy, CompositeDiscovery, DiscoveryClient, DiscoveryError,
        LoadBalancingStrategy, ServiceInstance, ServiceResolver,
    };
    pub use trellis_router::prelude::*;
}
