//! Media types and `Accept` header negotiation.
//!
//! Routes declare the media types they consume and produce. The selector
//! ranks candidates by how specifically those declarations match the
//! request's `Content-Type` and `Accept` headers:
//!
//! | declared        | rank |
//! |-----------------|------|
//! | `text/html`     | 3    |
//! | `text/*`        | 2    |
//! | `*/*`           | 1    |
//! | no match        | 0    |
//!
//! # Examples
//!
//! ```
//! use trellis_router::media::{Accept, MediaType};
//!
//! let accept = Accept::parse("application/json, text/html;q=0.9, */*;q=0.1");
//! assert_eq!(accept.quality_for(&MediaType::json()), 1.0);
//! assert_eq!(accept.quality_for(&MediaType::new("image", "png")), 0.1);
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Media Types
// ============================================================================

/// Represents a media type (MIME type) with optional parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    /// The type (e.g., "application", "text", "*")
    pub type_: String,
    /// The subtype (e.g., "json", "html", "*")
    pub subtype: String,
    /// Parameters other than `q` (e.g., charset=utf-8)
    pub params: BTreeMap<String, String>,
}

impl MediaType {
    /// Create a new media type.
    pub fn new(type_: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            type_: type_.into().to_lowercase(),
            subtype: subtype.into().to_lowercase(),
            params: BTreeMap::new(),
        }
    }

    /// Create a media type with a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// `application/json`
    pub fn json() -> Self {
        Self::new("application", "json")
    }

    /// `text/html`
    pub fn html() -> Self {
        Self::new("text", "html")
    }

    /// `text/plain`
    pub fn plain_text() -> Self {
        Self::new("text", "plain")
    }

    /// `application/x-www-form-urlencoded`
    pub fn form_urlencoded() -> Self {
        Self::new("application", "x-www-form-urlencoded")
    }

    /// `*/*`
    pub fn any() -> Self {
        Self::new("*", "*")
    }

    /// Parse a media type from a string (quality values are dropped).
    ///
    /// Returns `None` for text that is not `type/subtype`, and for a
    /// wildcard type with a concrete subtype (`*/json`).
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split(';');

        let (type_, subtype) = parts.next()?.trim().split_once('/')?;
        let type_ = type_.trim().to_lowercase();
        let subtype = subtype.trim().to_lowercase();

        if !is_token(&type_) || !is_token(&subtype) || (type_ == "*" && subtype != "*") {
            return None;
        }

        let params = parts
            .filter_map(|param| {
                let (key, value) = param.trim().split_once('=')?;
                let key = key.trim().to_lowercase();
                (key != "q").then(|| (key, value.trim().trim_matches('"').to_string()))
            })
            .collect();

        Some(Self {
            type_,
            subtype,
            params,
        })
    }

    /// Check if this media type matches another (considering wildcards on
    /// either side).
    pub fn matches(&self, other: &MediaType) -> bool {
        let type_matches = self.type_ == "*" || other.type_ == "*" || self.type_ == other.type_;
        let subtype_matches =
            self.subtype == "*" || other.subtype == "*" || self.subtype == other.subtype;
        type_matches && subtype_matches
    }

    /// Check if this is the full wildcard (`*/*`).
    pub fn is_any(&self) -> bool {
        self.type_ == "*" && self.subtype == "*"
    }

    /// Check if the subtype is a wildcard (`something/*`).
    pub fn is_subtype_wildcard(&self) -> bool {
        self.subtype == "*"
    }

    /// Specificity rank: exact 3, subtype wildcard 2, full wildcard 1.
    pub fn specificity(&self) -> u8 {
        if self.is_any() {
            1
        } else if self.is_subtype_wildcard() {
            2
        } else {
            3
        }
    }

    /// Get the MIME type string without parameters.
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.type_, self.subtype)
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$&-^_.+*".contains(c))
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)?;
        for (key, value) in &self.params {
            write!(f, "; {}={}", key, value)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaType::parse(s).ok_or_else(|| s.to_string())
    }
}

/// Rank of a declared media type against a concrete request media type.
///
/// 0 when the declaration does not cover the request type.
pub fn match_rank(declared: &MediaType, requested: &MediaType) -> u8 {
    if declared.matches(requested) {
        declared.specificity()
    } else {
        0
    }
}

// ============================================================================
// Accept Header
// ============================================================================

/// Quality value in thousandths so that it can be ordered exactly.
pub type Quality = u16;

const FULL_QUALITY: Quality = 1000;

/// Represents a parsed `Accept` header with quality values.
#[derive(Debug, Clone)]
pub struct Accept {
    /// Media ranges with their quality values, sorted by preference.
    pub media_types: Vec<(MediaType, Quality)>,
}

impl Default for Accept {
    fn default() -> Self {
        Self::any()
    }
}

impl Accept {
    /// An `Accept` that takes anything (`*/*`), used when the header is
    /// absent.
    pub fn any() -> Self {
        Self {
            media_types: vec![(MediaType::any(), FULL_QUALITY)],
        }
    }

    /// Parse an Accept header string.
    ///
    /// Unparseable ranges are skipped; a header with no usable range
    /// behaves like `*/*`.
    pub fn parse(header: &str) -> Self {
        let mut media_types: Vec<(MediaType, Quality)> = header
            .split(',')
            .filter_map(|part| {
                let part = part.trim();
                if part.is_empty() {
                    return None;
                }
                let quality = extract_quality(part);
                MediaType::parse(part).map(|mt| (mt, quality))
            })
            .collect();

        if media_types.is_empty() {
            return Self::any();
        }

        // Highest quality first, then most specific
        media_types.sort_by(|a, b| match b.1.cmp(&a.1) {
            Ordering::Equal => b.0.specificity().cmp(&a.0.specificity()),
            ord => ord,
        });

        Self { media_types }
    }

    /// Quality for a media type: the quality of the most specific range
    /// covering it, 0 when nothing covers it.
    pub fn quality(&self, media_type: &MediaType) -> Quality {
        self.media_types
            .iter()
            .filter(|(range, _)| range.matches(media_type))
            .max_by_key(|(range, _)| range.specificity())
            .map(|(_, q)| *q)
            .unwrap_or(0)
    }

    /// Quality as a float between 0 and 1.
    pub fn quality_for(&self, media_type: &MediaType) -> f32 {
        f32::from(self.quality(media_type)) / f32::from(FULL_QUALITY)
    }

    /// Check if a media type is acceptable.
    pub fn accepts(&self, media_type: &MediaType) -> bool {
        self.quality(media_type) > 0
    }
}

/// Extract the `q` parameter, defaulting to 1.
fn extract_quality(s: &str) -> Quality {
    s.split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("q"))
        .and_then(|(_, value)| value.trim().parse::<f32>().ok())
        .map(|q| (q.clamp(0.0, 1.0) * f32::from(FULL_QUALITY)).round() as Quality)
        .unwrap_or(FULL_QUALITY)
}
