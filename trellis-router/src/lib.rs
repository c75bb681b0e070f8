//! URI routing for Trellis
//!
//! This crate resolves HTTP requests to registered routes.
//!
//! ## Features
//!
//! - **URI templates** - Literal segments, `{name}` variables and a trailing
//!   wildcard
//! - **Version-aware dispatch** - Requested API version from headers, query
//!   parameters or a configured default, matched against route constraints
//! - **Content negotiation** - `Content-Type` against consumed types,
//!   `Accept` against produced types
//! - **Typed failures** - Not found, method not allowed and ambiguous routes
//!   are distinct errors
//!
//! ## Quick Start
//!
//! ```
//! use trellis_router::prelude::*;
//!
//! let table = RouteTable::builder()
//!     .route(RouteEntry::get("/a/{x}", "by_variable"))
//!     .route(RouteEntry::get("/a/literal", "by_literal"))
//!     .build()
//!     .unwrap();
//! let router = Router::new(table, VersionResolver::default());
//!
//! let matched = router.route(&RequestHead::get("/a/literal")).unwrap();
//! assert_eq!(*matched.target(), "by_literal");
//! ```
//!
//! ## Pipeline
//!
//! 1. [`RouteMatcher`] finds every entry whose method and pattern match
//! 2. [`VersionResolver`] drops entries whose version constraint rejects the
//!    requested version
//! 3. [`RouteSelector`] picks the single best entry

pub mod error;
pub mod matcher;
pub mod media;
pub mod method;
pub mod pattern;
pub mod request;
pub mod route;
pub mod router;
pub mod selector;
pub mod version;

pub use error::{RouteDefinitionError, RouteError};
pub use matcher::{MatchResult, Matches, RouteMatcher};
pub use media::{Accept, MediaType};
pub use method::HttpMethod;
pub use pattern::{PathVariables, Segment, UriTemplate};
pub use request::{Headers, RequestHead};
pub use route::{RouteDescriptor, RouteEntry, RouteEntryBuilder, RouteTable, RouteTableBuilder};
pub use router::{RouteMatch, Router};
pub use selector::RouteSelector;
pub use version::{
    ApiVersion, VersionConstraint, VersionRequest, VersionResolver, VersioningConfig,
};

/// Prelude for common imports.
///
/// ```
/// use trellis_router::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{RouteDefinitionError, RouteError};
    pub use crate::method::HttpMethod;
    pub use crate::request::RequestHead;
    pub use crate::route::{RouteEntry, RouteTable};
    pub use crate::router::{RouteMatch, Router};
    pub use crate::version::{VersionConstraint, VersionRequest, VersionResolver, VersioningConfig};
}
