//! Request routing
//!
//! [`Router`] runs the full pipeline for one request: structural matching,
//! version filtering and candidate selection.
//!
//! ```
//! use trellis_router::prelude::*;
//!
//! let table = RouteTable::builder()
//!     .route(RouteEntry::get("/users/{id}", "show_user_v1").version("1"))
//!     .route(RouteEntry::get("/users/{id}", "show_user_v2").version(">=2"))
//!     .build()
//!     .unwrap();
//! let router = Router::new(table, VersionResolver::default());
//!
//! let request = RequestHead::get("/users/42").header("X-API-VERSION", "2");
//! let matched = router.route(&request).unwrap();
//! assert_eq!(*matched.target(), "show_user_v2");
//! assert_eq!(matched.path_variables.get("id"), Some("42"));
//! ```

use crate::error::RouteError;
use crate::matcher::{MatchResult, RouteMatcher};
use crate::pattern::PathVariables;
use crate::request::RequestHead;
use crate::route::{RouteDescriptor, RouteEntry, RouteTable};
use crate::selector::RouteSelector;
use crate::version::{VersionRequest, VersionResolver, VersioningConfig};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use trellis_config::ConfigError;

/// The route chosen for a request.
#[derive(Debug)]
pub struct RouteMatch<'t, T> {
    pub entry: &'t RouteEntry<T>,
    pub path_variables: PathVariables,
    /// Query parameters of the request, decoded.
    pub query: Vec<(String, String)>,
    /// The version the request asked for.
    pub version: VersionRequest,
}

impl<'t, T> RouteMatch<'t, T> {
    fn new(result: MatchResult<'t, T>, request: &RequestHead, version: VersionRequest) -> Self {
        Self {
            entry: result.entry,
            path_variables: result.path_variables,
            query: request.query.clone(),
            version,
        }
    }

    /// The handler registered for the route.
    pub fn target(&self) -> &'t T {
        self.entry.target()
    }

    pub fn path_variable(&self, name: &str) -> Option<&str> {
        self.path_variables.get(name)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Routes requests against a fixed route table.
///
/// Cloning is cheap; clones share the table.
pub struct Router<T> {
    table: Arc<RouteTable<T>>,
    resolver: VersionResolver,
    selector: RouteSelector,
}

impl<T> Clone for Router<T> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            resolver: self.resolver.clone(),
            selector: self.selector,
        }
    }
}

impl<T> fmt::Debug for Router<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.table.len())
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl<T> Router<T> {
    pub fn new(table: impl Into<Arc<RouteTable<T>>>, resolver: VersionResolver) -> Self {
        Self {
            table: table.into(),
            resolver,
            selector: RouteSelector::new(),
        }
    }

    /// Create a router, validating the versioning configuration.
    pub fn with_versioning(
        table: impl Into<Arc<RouteTable<T>>>,
        config: VersioningConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(table, VersionResolver::new(config)?))
    }

    pub fn table(&self) -> &Arc<RouteTable<T>> {
        &self.table
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    /// Route a request to exactly one entry.
    ///
    /// - `MethodNotAllowed` when the path only matches other methods
    /// - `NotFound` when nothing matches, or version filtering removes
    ///   every candidate
    /// - `Ambiguous` when selection cannot pick a single candidate
    pub fn route(&self, request: &RequestHead) -> Result<RouteMatch<'_, T>, RouteError> {
        let matcher = RouteMatcher::new(&self.table);
        let candidates: Vec<_> = matcher.match_request(request).collect();

        if candidates.is_empty() {
            let allowed = matcher.allowed_methods(&request.path);
            debug!(method = %request.method, path = %request.path, ?allowed, "No route matched");
            return Err(if allowed.is_empty() {
                RouteError::NotFound(request.path.clone())
            } else {
                RouteError::MethodNotAllowed {
                    method: request.method,
                    path: request.path.clone(),
                    allowed,
                }
            });
        }

        let version = self.resolver.resolve(request);
        let matched = candidates.len();
        let candidates = self.resolver.filter(candidates, &version);

        if candidates.is_empty() {
            debug!(path = %request.path, %version, matched, "No route for requested version");
            return Err(RouteError::NotFound(format!(
                "{} (version {})",
                request.path, version
            )));
        }

        let winner = self.selector.select(candidates, request)?;
        debug!(
            method = %request.method,
            path = %request.path,
            route = %winner.entry,
            "Route selected"
        );
        Ok(RouteMatch::new(winner, request, version))
    }
}

impl<T: fmt::Display> Router<T> {
    /// Describe every registered route.
    pub fn describe(&self) -> Vec<RouteDescriptor> {
        self.table.describe()
    }
}
