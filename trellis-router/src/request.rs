// The parts of an incoming request that routing looks at

use crate::media::{Accept, MediaType};
use crate::HttpMethod;
use std::collections::HashMap;

/// Case-insensitive header map. Names are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any previous value.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.inner
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Get a header by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Method, path, query and headers of a request.
///
/// The body is not part of routing and is never seen here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: HttpMethod,
    /// Path without the query string.
    pub path: String,
    /// Decoded query parameters in the order they appeared.
    pub query: Vec<(String, String)>,
    pub headers: Headers,
}

impl RequestHead {
    /// Create a request head from a request target; a query string after
    /// `?` is split off and parsed.
    pub fn new(method: HttpMethod, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query_string(query)),
            None => (target, Vec::new()),
        };

        Self {
            method,
            path: path.to_string(),
            query,
            headers: Headers::new(),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(HttpMethod::GET, target)
    }

    pub fn post(target: &str) -> Self {
        Self::new(HttpMethod::POST, target)
    }

    /// Add a header.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The parsed `Content-Type`, if present and well formed.
    pub fn content_type(&self) -> Option<MediaType> {
        self.headers.get("content-type").and_then(MediaType::parse)
    }

    /// The parsed `Accept` header; `*/*` when absent.
    pub fn accept(&self) -> Accept {
        self.headers
            .get("accept")
            .map(Accept::parse)
            .unwrap_or_default()
    }
}

/// Parse `a=1&b=two%20words` into decoded pairs. A key without `=` gets an
/// empty value.
pub fn parse_query_string(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_case_insensitive() {
        let headers: Headers = [("X-API-VERSION", "2"), ("Accept", "text/html")]
            .into_iter()
            .collect();
        assert_eq!(headers.get("x-api-version"), Some("2"));
        assert_eq!(headers.get("ACCEPT"), Some("text/html"));
        assert!(!headers.contains("content-type"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_request_splits_query() {
        let request = RequestHead::get("/search?q=rust+lang&page=2&flag");
        assert_eq!(request.path, "/search");
        assert_eq!(request.query_param("q"), Some("rust lang"));
        assert_eq!(request.query_param("page"), Some("2"));
        assert_eq!(request.query_param("flag"), Some(""));
        assert_eq!(request.query_param("missing"), None);
    }

    #[test]
    fn test_query_decoding() {
        let query = parse_query_string("name=a%26b&&x=%FF");
        assert_eq!(
            query,
            vec![("name".to_string(), "a&b".to_string()), ("x".to_string(), "%FF".to_string())]
        );
    }

    #[test]
    fn test_negotiation_headers() {
        let request = RequestHead::post("/upload")
            .header("Content-Type", "application/json; charset=utf-8")
            .header("Accept", "text/html");
        assert_eq!(request.content_type().map(|m| m.mime_type()).as_deref(), Some("application/json"));
        assert!(request.accept().accepts(&MediaType::html()));
        assert!(!request.accept().accepts(&MediaType::json()));

        let bare = RequestHead::get("/");
        assert!(bare.content_type().is_none());
        assert!(bare.accept().accepts(&MediaType::json()));
    }
}
