//! URI templates
//!
//! A template is parsed once, when its route is registered:
//!
//! - **Literal segments** (`users`, `v1`) must match the request segment
//!   exactly, case included
//! - **Variables** (`{id}` or `:id`) capture one non-empty segment
//! - **Trailing wildcard** (`*`, `**`, `{*rest}` or `{+rest}`) captures every
//!   remaining segment, joined with `/`; anonymous wildcards are captured
//!   under the name `*`
//!
//! Empty segments are ignored on both sides, so `/a//b/` and `/a/b` are the
//! same path. Captured values are percent-decoded.

use crate::error::RouteDefinitionError;
use smallvec::SmallVec;
use std::fmt;

/// Path segments stored inline before spilling to the heap.
pub const INLINE_SEGMENT_COUNT: usize = 8;

/// Path variables stored inline before spilling to the heap.
pub const INLINE_VARIABLE_COUNT: usize = 4;

/// Name under which an anonymous wildcard is captured.
pub const ANONYMOUS_WILDCARD: &str = "*";

/// Split a request path into its non-empty segments.
pub fn split_path(path: &str) -> SmallVec<[&str; INLINE_SEGMENT_COUNT]> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// A parsed template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text that must match exactly.
    Literal(String),
    /// Named single-segment capture.
    Variable(String),
    /// Capture of all remaining segments.
    Wildcard(String),
}

impl Segment {
    fn parse(pattern: &str, raw: &str) -> Result<Self, RouteDefinitionError> {
        let malformed = || RouteDefinitionError::MalformedSegment {
            pattern: pattern.to_string(),
            segment: raw.to_string(),
        };

        if raw == "*" || raw == "**" {
            return Ok(Segment::Wildcard(ANONYMOUS_WILDCARD.to_string()));
        }

        if let Some(name) = raw.strip_prefix(':') {
            return if is_variable_name(name) {
                Ok(Segment::Variable(name.to_string()))
            } else {
                Err(malformed())
            };
        }

        if raw.contains('{') || raw.contains('}') {
            let inner = raw
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .ok_or_else(malformed)?;

            return match inner.strip_prefix('*').or_else(|| inner.strip_prefix('+')) {
                Some(name) if is_variable_name(name) => Ok(Segment::Wildcard(name.to_string())),
                Some(_) => Err(malformed()),
                None if is_variable_name(inner) => Ok(Segment::Variable(inner.to_string())),
                None => Err(malformed()),
            };
        }

        Ok(Segment::Literal(raw.to_string()))
    }

    /// Check if this is a literal segment.
    pub fn is_literal(&self) -> bool {
        matches!(self, Segment::Literal(_))
    }

    /// Check if this is a wildcard.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Segment::Wildcard(_))
    }

    /// Variable or wildcard name, if the segment captures.
    pub fn name(&self) -> Option<&str> {
        match self {
            Segment::Literal(_) => None,
            Segment::Variable(name) | Segment::Wildcard(name) => Some(name),
        }
    }
}

fn is_variable_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// A compiled URI template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    raw: String,
    segments: SmallVec<[Segment; INLINE_SEGMENT_COUNT]>,
    literal_count: usize,
}

impl UriTemplate {
    /// Parse a template.
    ///
    /// Fails on malformed placeholders, duplicate variable names and a
    /// wildcard anywhere but the last segment.
    pub fn parse(pattern: &str) -> Result<Self, RouteDefinitionError> {
        let parts: SmallVec<[&str; INLINE_SEGMENT_COUNT]> = split_path(pattern);
        let mut segments: SmallVec<[Segment; INLINE_SEGMENT_COUNT]> =
            SmallVec::with_capacity(parts.len());

        for (i, raw) in parts.iter().enumerate() {
            let segment = Segment::parse(pattern, raw)?;

            if segment.is_wildcard() && i + 1 != parts.len() {
                return Err(RouteDefinitionError::WildcardNotLast(pattern.to_string()));
            }

            if let Some(name) = segment.name()
                && segments.iter().any(|s| s.name() == Some(name))
            {
                return Err(RouteDefinitionError::DuplicateVariable {
                    pattern: pattern.to_string(),
                    name: name.to_string(),
                });
            }

            segments.push(segment);
        }

        let literal_count = segments.iter().filter(|s| s.is_literal()).count();

        Ok(Self {
            raw: pattern.to_string(),
            segments,
            literal_count,
        })
    }

    /// The template as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of literal segments; the specificity of a match.
    pub fn literal_count(&self) -> usize {
        self.literal_count
    }

    /// Check if the template ends in a wildcard.
    pub fn has_wildcard(&self) -> bool {
        self.segments.last().is_some_and(Segment::is_wildcard)
    }

    /// Variable and wildcard names in declaration order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::name)
    }

    /// Match a raw request path.
    pub fn match_path(&self, path: &str) -> Option<PathVariables> {
        self.match_segments(&split_path(path))
    }

    /// Match an already split request path.
    pub fn match_segments(&self, path: &[&str]) -> Option<PathVariables> {
        if !self.is_structural_match(path) {
            return None;
        }

        let mut variables = PathVariables::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(_) => {}
                Segment::Variable(name) => variables.push(name, decode(path[i]).into_owned()),
                Segment::Wildcard(name) => {
                    let rest = path[i..]
                        .iter()
                        .map(|s| decode(s))
                        .collect::<Vec<_>>()
                        .join("/");
                    variables.push(name, rest);
                }
            }
        }
        Some(variables)
    }

    /// Check the shape of `path` without capturing anything.
    pub fn is_structural_match(&self, path: &[&str]) -> bool {
        let fixed = self.segments.len() - usize::from(self.has_wildcard());
        let length_ok = if self.has_wildcard() {
            path.len() >= fixed
        } else {
            path.len() == fixed
        };

        length_ok
            && self.segments[..fixed]
                .iter()
                .zip(path)
                .all(|(segment, value)| match segment {
                    Segment::Literal(literal) => literal.as_str() == *value,
                    _ => !value.is_empty(),
                })
    }
}

fn decode(segment: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::decode(segment).unwrap_or(std::borrow::Cow::Borrowed(segment))
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for UriTemplate {
    type Err = RouteDefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UriTemplate::parse(s)
    }
}

/// Values captured from a matched path, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathVariables {
    vars: SmallVec<[(String, String); INLINE_VARIABLE_COUNT]>,
}

impl PathVariables {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, value: String) {
        self.vars.push((name.to_string(), value));
    }

    /// Get a variable by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a variable and parse it.
    pub fn get_parsed<T: std::str::FromStr>(&self, name: &str) -> Option<Result<T, T::Err>> {
        self.get(name).map(str::parse)
    }

    /// Number of captured variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl<'a> IntoIterator for &'a PathVariables {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments() {
        let template = UriTemplate::parse("/api/users/{id}/:tab/{*rest}").unwrap();
        assert_eq!(
            template.segments(),
            &[
                Segment::Literal("api".into()),
                Segment::Literal("users".into()),
                Segment::Variable("id".into()),
                Segment::Variable("tab".into()),
                Segment::Wildcard("rest".into()),
            ]
        );
        assert_eq!(template.literal_count(), 2);
        assert!(template.has_wildcard());
        assert_eq!(template.variable_names().collect::<Vec<_>>(), vec!["id", "tab", "rest"]);
    }

    #[test]
    fn test_empty_segments_ignored() {
        let a = UriTemplate::parse("/a//b/").unwrap();
        let b = UriTemplate::parse("a/b").unwrap();
        assert_eq!(a.segments(), b.segments());
        assert!(a.match_path("//a/b//").is_some());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            UriTemplate::parse("/a/{id"),
            Err(RouteDefinitionError::MalformedSegment { .. })
        ));
        assert!(matches!(
            UriTemplate::parse("/a/{}"),
            Err(RouteDefinitionError::MalformedSegment { .. })
        ));
        assert!(matches!(
            UriTemplate::parse("/a/x{id}"),
            Err(RouteDefinitionError::MalformedSegment { .. })
        ));
        assert!(matches!(
            UriTemplate::parse("/a/:"),
            Err(RouteDefinitionError::MalformedSegment { .. })
        ));
        assert!(matches!(
            UriTemplate::parse("/a/*/b"),
            Err(RouteDefinitionError::WildcardNotLast(_))
        ));
        assert!(matches!(
            UriTemplate::parse("/{id}/x/{id}"),
            Err(RouteDefinitionError::DuplicateVariable { ref name, .. }) if name == "id"
        ));
    }

    #[test]
    fn test_match_variable() {
        let template = UriTemplate::parse("/users/{id}").unwrap();
        let vars = template.match_path("/users/42").unwrap();
        assert_eq!(vars.get("id"), Some("42"));
        assert_eq!(vars.get_parsed::<u32>("id"), Some(Ok(42)));
        assert_eq!(vars.len(), 1);

        assert!(template.match_path("/users").is_none());
        assert!(template.match_path("/users/42/posts").is_none());
        assert!(template.match_path("/Users/42").is_none());
    }

    #[test]
    fn test_match_percent_decodes() {
        let template = UriTemplate::parse("/files/{name}").unwrap();
        let vars = template.match_path("/files/a%20b").unwrap();
        assert_eq!(vars.get("name"), Some("a b"));

        // Invalid UTF-8 after decoding is kept verbatim
        let vars = template.match_path("/files/%FF").unwrap();
        assert_eq!(vars.get("name"), Some("%FF"));
    }

    #[test]
    fn test_match_wildcard() {
        let template = UriTemplate::parse("/static/**").unwrap();
        let vars = template.match_path("/static/css/site.css").unwrap();
        assert_eq!(vars.get(ANONYMOUS_WILDCARD), Some("css/site.css"));

        let vars = template.match_path("/static").unwrap();
        assert_eq!(vars.get(ANONYMOUS_WILDCARD), Some(""));

        let named = UriTemplate::parse("/proxy/{+path}").unwrap();
        let vars = named.match_path("/proxy/a/b").unwrap();
        assert_eq!(vars.get("path"), Some("a/b"));
    }

    #[test]
    fn test_root_template() {
        let template = UriTemplate::parse("/").unwrap();
        assert_eq!(template.literal_count(), 0);
        assert!(template.match_path("/").unwrap().is_empty());
        assert!(template.match_path("/a").is_none());
    }

    #[test]
    fn test_iteration_order() {
        let template = UriTemplate::parse("/{b}/{a}").unwrap();
        let vars = template.match_path("/1/2").unwrap();
        let collected: Vec<_> = (&vars).into_iter().collect();
        assert_eq!(collected, vec![("b", "1"), ("a", "2")]);
    }
}
