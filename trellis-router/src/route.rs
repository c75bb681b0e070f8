//! Route entries and the route table
//!
//! Routes are registered once, in order, through [`RouteTableBuilder`]; the
//! resulting [`RouteTable`] is immutable and can be shared across request
//! tasks behind an `Arc`.
//!
//! ```
//! use trellis_router::route::{RouteEntry, RouteTable};
//!
//! let table = RouteTable::builder()
//!     .route(RouteEntry::get("/users/{id}", "show_user").produces("application/json"))
//!     .route(RouteEntry::post("/users", "create_user").consumes("application/json"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(table.len(), 2);
//! ```

use crate::error::RouteDefinitionError;
use crate::media::MediaType;
use crate::pattern::UriTemplate;
use crate::version::VersionConstraint;
use crate::HttpMethod;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// One registered endpoint.
#[derive(Debug, Clone)]
pub struct RouteEntry<T> {
    template: UriTemplate,
    method: HttpMethod,
    produces: Vec<MediaType>,
    consumes: Vec<MediaType>,
    version: Option<VersionConstraint>,
    target: T,
}

impl<T> RouteEntry<T> {
    /// Start building an entry for any method.
    pub fn builder(method: HttpMethod, pattern: impl Into<String>, target: T) -> RouteEntryBuilder<T> {
        RouteEntryBuilder {
            method,
            pattern: pattern.into(),
            produces: Vec::new(),
            consumes: Vec::new(),
            version: None,
            target,
        }
    }

    pub fn get(pattern: impl Into<String>, target: T) -> RouteEntryBuilder<T> {
        Self::builder(HttpMethod::GET, pattern, target)
    }

    pub fn post(pattern: impl Into<String>, target: T) -> RouteEntryBuilder<T> {
        Self::builder(HttpMethod::POST, pattern, target)
    }

    pub fn put(pattern: impl Into<String>, target: T) -> RouteEntryBuilder<T> {
        Self::builder(HttpMethod::PUT, pattern, target)
    }

    pub fn delete(pattern: impl Into<String>, target: T) -> RouteEntryBuilder<T> {
        Self::builder(HttpMethod::DELETE, pattern, target)
    }

    pub fn patch(pattern: impl Into<String>, target: T) -> RouteEntryBuilder<T> {
        Self::builder(HttpMethod::PATCH, pattern, target)
    }

    pub fn head(pattern: impl Into<String>, target: T) -> RouteEntryBuilder<T> {
        Self::builder(HttpMethod::HEAD, pattern, target)
    }

    pub fn options(pattern: impl Into<String>, target: T) -> RouteEntryBuilder<T> {
        Self::builder(HttpMethod::OPTIONS, pattern, target)
    }

    pub fn template(&self) -> &UriTemplate {
        &self.template
    }

    pub fn pattern(&self) -> &str {
        self.template.as_str()
    }

    pub fn http_method(&self) -> HttpMethod {
        self.method
    }

    /// Media types this route can produce; empty means any.
    pub fn produces_types(&self) -> &[MediaType] {
        &self.produces
    }

    /// Media types this route accepts as a body; empty means any.
    pub fn consumes_types(&self) -> &[MediaType] {
        &self.consumes
    }

    pub fn version_constraint(&self) -> Option<&VersionConstraint> {
        self.version.as_ref()
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Number of literal segments in the pattern.
    pub fn specificity(&self) -> usize {
        self.template.literal_count()
    }
}

/// `GET /users/{id}` or `GET /users/{id} [version 2]`.
impl<T> fmt::Display for RouteEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)?;
        if let Some(version) = &self.version {
            write!(f, " [version {}]", version)?;
        }
        Ok(())
    }
}

/// Builder for [`RouteEntry`]. Media types and the version constraint are
/// kept as text until [`build`](Self::build) validates them.
#[derive(Debug, Clone)]
pub struct RouteEntryBuilder<T> {
    method: HttpMethod,
    pattern: String,
    produces: Vec<String>,
    consumes: Vec<String>,
    version: Option<String>,
    target: T,
}

impl<T> RouteEntryBuilder<T> {
    /// Add a produced media type.
    pub fn produces(mut self, media_type: impl Into<String>) -> Self {
        self.produces.push(media_type.into());
        self
    }

    /// Add a consumed media type.
    pub fn consumes(mut self, media_type: impl Into<String>) -> Self {
        self.consumes.push(media_type.into());
        self
    }

    /// Restrict the route to a version constraint (`2`, `>=1.1`, `1..2`, `1|2`).
    pub fn version(mut self, constraint: impl Into<String>) -> Self {
        self.version = Some(constraint.into());
        self
    }

    /// Validate and build the entry.
    pub fn build(self) -> Result<RouteEntry<T>, RouteDefinitionError> {
        let version = self
            .version
            .as_deref()
            .map(VersionConstraint::parse)
            .transpose()?;

        Ok(RouteEntry {
            template: UriTemplate::parse(&self.pattern)?,
            method: self.method,
            produces: parse_media_types(&self.produces)?,
            consumes: parse_media_types(&self.consumes)?,
            version,
            target: self.target,
        })
    }
}

/// Parse, keeping the first occurrence of duplicates.
fn parse_media_types(raw: &[String]) -> Result<Vec<MediaType>, RouteDefinitionError> {
    let mut types: Vec<MediaType> = Vec::with_capacity(raw.len());
    for text in raw {
        let media_type = MediaType::parse(text)
            .ok_or_else(|| RouteDefinitionError::InvalidMediaType(text.clone()))?;
        if !types.contains(&media_type) {
            types.push(media_type);
        }
    }
    Ok(types)
}

// ============================================================================
// Route Table
// ============================================================================

/// Immutable, ordered set of registered routes.
#[derive(Debug, Clone)]
pub struct RouteTable<T> {
    entries: Box<[RouteEntry<T>]>,
}

impl<T> RouteTable<T> {
    pub fn builder() -> RouteTableBuilder<T> {
        RouteTableBuilder::new()
    }

    pub fn entries(&self) -> &[RouteEntry<T>] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RouteEntry<T>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: fmt::Display> RouteTable<T> {
    /// Describe every route, in registration order.
    pub fn describe(&self) -> Vec<RouteDescriptor> {
        self.entries.iter().map(RouteDescriptor::from_entry).collect()
    }
}

impl<'a, T> IntoIterator for &'a RouteTable<T> {
    type Item = &'a RouteEntry<T>;
    type IntoIter = std::slice::Iter<'a, RouteEntry<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Ordered registration of routes.
///
/// Each entry is validated as it is added; the first failure is reported
/// by [`build`](Self::build).
#[derive(Debug)]
pub struct RouteTableBuilder<T> {
    entries: Vec<RouteEntry<T>>,
    error: Option<RouteDefinitionError>,
}

impl<T> RouteTableBuilder<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            error: None,
        }
    }

    /// Register a route.
    pub fn route(mut self, entry: RouteEntryBuilder<T>) -> Self {
        if self.error.is_none() {
            match entry.build() {
                Ok(entry) => self.entries.push(entry),
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    /// Register an already built route.
    pub fn entry(mut self, entry: RouteEntry<T>) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn build(self) -> Result<RouteTable<T>, RouteDefinitionError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(RouteTable {
                entries: self.entries.into_boxed_slice(),
            }),
        }
    }
}

impl<T> Default for RouteTableBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Route Descriptors
// ============================================================================

/// Serializable summary of a route, as listed by a management endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDescriptor {
    pub method: HttpMethod,
    pub pattern: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Route data; the target's description is stored under `method`.
    pub data: BTreeMap<String, String>,
}

impl RouteDescriptor {
    pub fn from_entry<T: fmt::Display>(entry: &RouteEntry<T>) -> Self {
        let mut data = BTreeMap::new();
        data.insert("method".to_string(), entry.target.to_string());

        Self {
            method: entry.method,
            pattern: entry.pattern().to_string(),
            produces: entry.produces.iter().map(ToString::to_string).collect(),
            consumes: entry.consumes.iter().map(ToString::to_string).collect(),
            version: entry.version.as_ref().map(ToString::to_string),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_entry() {
        let entry = RouteEntry::get("/users/{id}", "show")
            .produces("application/json")
            .produces("Application/JSON")
            .produces("text/html")
            .version(">=2")
            .build()
            .unwrap();

        assert_eq!(entry.http_method(), HttpMethod::GET);
        assert_eq!(entry.pattern(), "/users/{id}");
        assert_eq!(entry.specificity(), 1);
        assert_eq!(entry.produces_types(), &[MediaType::json(), MediaType::html()]);
        assert!(entry.consumes_types().is_empty());
        assert_eq!(entry.target(), &"show");
        assert_eq!(entry.to_string(), "GET /users/{id} [version >=2]");
    }

    #[test]
    fn test_method_shorthands() {
        let entries = [
            RouteEntry::get("/", ()),
            RouteEntry::post("/", ()),
            RouteEntry::put("/", ()),
            RouteEntry::delete("/", ()),
            RouteEntry::patch("/", ()),
            RouteEntry::head("/", ()),
            RouteEntry::options("/", ()),
        ];
        let methods: Vec<HttpMethod> = entries
            .into_iter()
            .map(|builder| builder.build().unwrap().http_method())
            .collect();

        assert_eq!(
            methods,
            vec![
                HttpMethod::GET,
                HttpMethod::POST,
                HttpMethod::PUT,
                HttpMethod::DELETE,
                HttpMethod::PATCH,
                HttpMethod::HEAD,
                HttpMethod::OPTIONS,
            ]
        );
    }

    #[test]
    fn test_build_rejects_bad_definitions() {
        assert!(matches!(
            RouteEntry::get("/a/{", ()).build(),
            Err(RouteDefinitionError::MalformedSegment { .. })
        ));
        assert!(matches!(
            RouteEntry::post("/a", ()).consumes("json").build(),
            Err(RouteDefinitionError::InvalidMediaType(_))
        ));
        assert!(matches!(
            RouteEntry::get("/a", ()).version("2..1").build(),
            Err(RouteDefinitionError::InvalidVersionConstraint(_))
        ));
    }

    #[test]
    fn test_table_keeps_registration_order() {
        let table = RouteTable::builder()
            .route(RouteEntry::get("/b", 1))
            .route(RouteEntry::get("/a", 2))
            .route(RouteEntry::get("/a", 3))
            .build()
            .unwrap();

        let targets: Vec<_> = table.iter().map(|e| *e.target()).collect();
        assert_eq!(targets, vec![1, 2, 3]);
    }

    #[test]
    fn test_table_reports_first_error() {
        let result = RouteTable::builder()
            .route(RouteEntry::get("/ok", ()))
            .route(RouteEntry::get("/*/bad", ()))
            .route(RouteEntry::get("/{x}/{x}", ()))
            .build();

        assert!(matches!(result, Err(RouteDefinitionError::WildcardNotLast(_))));
    }

    #[test]
    fn test_describe() {
        let table = RouteTable::builder()
            .route(
                RouteEntry::get("/users/{id}", "UserController::show")
                    .produces("application/json")
                    .version("2"),
            )
            .build()
            .unwrap();

        let descriptors = table.describe();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(
            descriptors[0].data.get("method").map(String::as_str),
            Some("UserController::show")
        );

        let json = serde_json::to_value(&descriptors[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "method": "GET",
                "pattern": "/users/{id}",
                "produces": ["application/json"],
                "version": "2",
                "data": {"method": "UserController::show"},
            })
        );
    }
}
