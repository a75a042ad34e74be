//! Media types for content negotiation.
//!
//! Routes declare what they `consume` (request `Content-Type`) and what they
//! `produce` (matched against the request `Accept` list). Compatibility is
//! symmetric and wildcard-aware: `*/*` matches everything, `text/*` matches
//! any `text` subtype.
//!
//! ```
//! use waypoint_core::media::MediaType;
//!
//! let accept = MediaType::parse_accept("application/json, text/*;q=0.5");
//! assert!(accept[1].matches(&MediaType::plain_text()));
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A media type (MIME type) with optional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    /// The type (e.g., "application", "text")
    pub type_: String,
    /// The subtype (e.g., "json", "html")
    pub subtype: String,
    /// Parameters other than `q`
    pub params: BTreeMap<String, String>,
    /// Quality value from an Accept header, 1.0 otherwise
    pub quality: f32,
}

impl MediaType {
    pub fn new(type_: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            type_: type_.into().to_lowercase(),
            subtype: subtype.into().to_lowercase(),
            params: BTreeMap::new(),
            quality: 1.0,
        }
    }

    /// `*/*`
    pub fn any() -> Self {
        Self::new("*", "*")
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

    /// `multipart/form-data`
    pub fn multipart_form_data() -> Self {
        Self::new("multipart", "form-data")
    }

    /// Parse a single media type. A bare `*` is read as `*/*`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split(';');
        let essence = parts.next()?.trim();
        if essence.is_empty() {
            return None;
        }

        let (type_, subtype) = match essence.split_once('/') {
            Some((t, st)) => (t.trim(), st.trim()),
            None if essence == "*" => ("*", "*"),
            None => return None,
        };
        if type_.is_empty() || subtype.is_empty() {
            return None;
        }

        let mut media_type = Self::new(type_, subtype);
        for param in parts {
            if let Some((key, value)) = param.trim().split_once('=') {
                let key = key.trim().to_lowercase();
                let value = value.trim().trim_matches('"');
                if key == "q" {
                    media_type.quality = value.parse::<f32>().unwrap_or(1.0).clamp(0.0, 1.0);
                } else {
                    media_type.params.insert(key, value.to_string());
                }
            }
        }
        Some(media_type)
    }

    /// Parse an `Accept` header, most preferred first.
    ///
    /// Entries are ordered by quality, then specificity; ties keep header order.
    /// Entries with `q=0` are dropped.
    pub fn parse_accept(header: &str) -> Vec<MediaType> {
        let mut types: Vec<MediaType> = header
            .split(',')
            .filter_map(MediaType::parse)
            .filter(|mt| mt.quality > 0.0)
            .collect();

        types.sort_by(|a, b| {
            match b.quality.partial_cmp(&a.quality) {
                Some(Ordering::Equal) | None => {}
                Some(ord) => return ord,
            }
            b.specificity().cmp(&a.specificity())
        });
        types
    }

    /// Check if this media type is compatible with another (considering wildcards).
    pub fn matches(&self, other: &MediaType) -> bool {
        let type_matches = self.type_ == "*" || other.type_ == "*" || self.type_ == other.type_;
        let subtype_matches =
            self.subtype == "*" || other.subtype == "*" || self.subtype == other.subtype;
        type_matches && subtype_matches
    }

    /// `*/*`
    pub fn is_any(&self) -> bool {
        self.type_ == "*" && self.subtype == "*"
    }

    fn specificity(&self) -> u8 {
        let mut score = 0u8;
        if self.type_ != "*" {
            score += 2;
        }
        if self.subtype != "*" {
            score += 1;
        }
        score
    }

    /// `type/subtype`, without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.type_, self.subtype)
    }
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

/// True when `content_type` (absent means `*/*`) is compatible with one of `consumes`.
pub fn can_consume(consumes: &[MediaType], content_type: Option<&MediaType>) -> bool {
    match content_type {
        None => true,
        Some(ct) => consumes.iter().any(|mt| mt.matches(ct)),
    }
}

/// True when one of `accept` (empty means `*/*`) is compatible with one of `produces`.
pub fn can_produce(produces: &[MediaType], accept: &[MediaType]) -> bool {
    if accept.is_empty() {
        return true;
    }
    accept
        .iter()
        .any(|wanted| produces.iter().any(|mt| mt.matches(wanted)))
}
