// Error types for route definition and resolution

use crate::HttpMethod;
use thiserror::Error;

/// Failure to resolve a request to exactly one route.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// No route matches the path, or every match was filtered out.
    #[error("Route not found: {0}")]
    NotFound(String),

    /// The path matches routes registered for other methods only.
    #[error("Method not allowed: {method} {path} (allowed: {})", join_methods(.allowed))]
    MethodNotAllowed {
        method: HttpMethod,
        path: String,
        allowed: Vec<HttpMethod>,
    },

    /// Several routes remain after every tie-break rule.
    #[error("Ambiguous route for {path}: {}", .candidates.join(" | "))]
    Ambiguous {
        path: String,
        candidates: Vec<String>,
    },
}

impl RouteError {
    /// HTTP status code the transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            RouteError::NotFound(_) => 404,
            RouteError::MethodNotAllowed { .. } => 405,
            RouteError::Ambiguous { .. } => 500,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Value for the `Allow` response header, for `MethodNotAllowed`.
    pub fn allow_header(&self) -> Option<String> {
        match self {
            RouteError::MethodNotAllowed { allowed, .. } => Some(join_methods(allowed)),
            _ => None,
        }
    }
}

fn join_methods(methods: &[HttpMethod]) -> String {
    methods
        .iter()
        .map(HttpMethod::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A route that cannot be registered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteDefinitionError {
    #[error("Malformed segment '{segment}' in pattern '{pattern}'")]
    MalformedSegment { pattern: String, segment: String },

    #[error("Wildcard must be the last segment of pattern '{0}'")]
    WildcardNotLast(String),

    #[error("Variable '{name}' declared twice in pattern '{pattern}'")]
    DuplicateVariable { pattern: String, name: String },

    #[error("Invalid media type '{0}'")]
    InvalidMediaType(String),

    #[error("Invalid version constraint '{0}'")]
    InvalidVersionConstraint(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(RouteError::NotFound("/x".into()).status_code(), 404);
        let not_allowed = RouteError::MethodNotAllowed {
            method: HttpMethod::DELETE,
            path: "/users".into(),
            allowed: vec![HttpMethod::GET, HttpMethod::POST],
        };
        assert_eq!(not_allowed.status_code(), 405);
        assert!(not_allowed.is_client_error());

        let ambiguous = RouteError::Ambiguous {
            path: "/a".into(),
            candidates: vec!["GET /a/{x}".into(), "GET /a/{y}".into()],
        };
        assert_eq!(ambiguous.status_code(), 500);
        assert!(!ambiguous.is_client_error());
    }

    #[test]
    fn test_messages() {
        let not_allowed = RouteError::MethodNotAllowed {
            method: HttpMethod::DELETE,
            path: "/users".into(),
            allowed: vec![HttpMethod::GET, HttpMethod::POST],
        };
        assert_eq!(
            not_allowed.to_string(),
            "Method not allowed: DELETE /users (allowed: GET, POST)"
        );
        assert_eq!(not_allowed.allow_header().as_deref(), Some("GET, POST"));

        let ambiguous = RouteError::Ambiguous {
            path: "/a".into(),
            candidates: vec!["GET /a/{x}".into(), "GET /a/{y}".into()],
        };
        assert!(ambiguous.to_string().contains("GET /a/{x} | GET /a/{y}"));
        assert_eq!(ambiguous.allow_header(), None);
    }
}
