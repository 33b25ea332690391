//! Media types used to describe request payloads and formatter capabilities.
//!
//! A formatter advertises the media types it can read as a list of
//! [`MediaType`]s. Supported types may contain wildcards (`*/*`,
//! `text/*`) or a structured-syntax suffix pattern (`application/*+json`).
//!
//! # Examples
//!
//! ```
//! use girder_core::media_type::MediaType;
//!
//! let supported = MediaType::parse("application/*+json").unwrap();
//! let request = MediaType::parse("application/problem+json; charset=utf-8").unwrap();
//!
//! assert!(supported.accepts(&request));
//! assert_eq!(request.charset(), Some("utf-8"));
//! ```

use std::collections::HashMap;
use std::fmt;

/// Represents a media type (MIME type) with optional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// The type (e.g., "application", "text")
    pub type_: String,
    /// The subtype (e.g., "json", "x-www-form-urlencoded")
    pub subtype: String,
    /// Optional parameters (e.g., charset=utf-8)
    pub params: HashMap<String, String>,
}

impl MediaType {
    /// Create a new media type.
    pub fn new(type_: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            type_: type_.into().to_lowercase(),
            subtype: subtype.into().to_lowercase(),
            params: HashMap::new(),
        }
    }

    /// Create a media type with a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into().to_lowercase(), value.into());
        self
    }

    /// `application/json`
    pub fn json() -> Self {
        Self::new("application", "json")
    }

    /// `text/json`
    pub fn text_json() -> Self {
        Self::new("text", "json")
    }

    /// `application/*+json`
    pub fn any_json() -> Self {
        Self::new("application", "*+json")
    }

    /// `text/plain`
    pub fn plain_text() -> Self {
        Self::new("text", "plain")
    }

    /// `application/x-www-form-urlencoded`
    pub fn form_urlencoded() -> Self {
        Self::new("application", "x-www-form-urlencoded")
    }

    /// `application/octet-stream`
    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    /// `*/*`
    pub fn any() -> Self {
        Self::new("*", "*")
    }

    /// Parse a media type from a header value.
    ///
    /// Returns `None` when the value has no `type/subtype` pair.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split(';');

        let (type_, subtype) = parts.next()?.trim().split_once('/')?;
        let type_ = type_.trim().to_lowercase();
        let subtype = subtype.trim().to_lowercase();
        if type_.is_empty() || subtype.is_empty() {
            return None;
        }

        let mut params = HashMap::new();
        for param in parts {
            if let Some((key, value)) = param.trim().split_once('=') {
                let key = key.trim().to_lowercase();
                // Quality only matters for Accept negotiation
                if key != "q" {
                    params.insert(key, value.trim().trim_matches('"').to_string());
                }
            }
        }

        Some(Self {
            type_,
            subtype,
            params,
        })
    }

    /// Whether a formatter advertising `self` can read a payload of `requested`.
    ///
    /// `self` may contain wildcards or a `*+suffix` subtype; parameters on
    /// `self` are ignored except `charset`, which must match when present.
    pub fn accepts(&self, requested: &MediaType) -> bool {
        if !self.is_type_wildcard() && self.type_ != requested.type_ {
            return false;
        }

        let subtype_matches = if self.is_subtype_wildcard() {
            true
        } else if let Some(suffix) = self.subtype.strip_prefix("*+") {
            requested.suffix() == Some(suffix)
        } else {
            self.subtype == requested.subtype
        };
        if !subtype_matches {
            return false;
        }

        match (self.charset(), requested.charset()) {
            (Some(ours), Some(theirs)) => ours.eq_ignore_ascii_case(theirs),
            _ => true,
        }
    }

    /// Check if this media type matches another, with wildcards on either side.
    pub fn matches(&self, other: &MediaType) -> bool {
        let type_matches = self.type_ == "*" || other.type_ == "*" || self.type_ == other.type_;
        let subtype_matches =
            self.subtype == "*" || other.subtype == "*" || self.subtype == other.subtype;
        type_matches && subtype_matches
    }

    /// Check if this is a wildcard type (`*/*`).
    pub fn is_any(&self) -> bool {
        self.type_ == "*" && self.subtype == "*"
    }

    /// Check if the type is a wildcard (`*/something`).
    pub fn is_type_wildcard(&self) -> bool {
        self.type_ == "*"
    }

    /// Check if the subtype is a wildcard (`something/*`).
    pub fn is_subtype_wildcard(&self) -> bool {
        self.subtype == "*"
    }

    /// Structured-syntax suffix, e.g. `json` for `application/problem+json`.
    pub fn suffix(&self) -> Option<&str> {
        self.subtype.rsplit_once('+').map(|(_, suffix)| suffix)
    }

    /// The `charset` parameter, if present.
    pub fn charset(&self) -> Option<&str> {
        self.params.get("charset").map(String::as_str)
    }

    /// Get the full MIME type string without parameters.
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.type_, self.subtype)
    }

    /// Get the full MIME type string with parameters.
    pub fn to_header_value(&self) -> String {
        let mut result = self.mime_type();
        let mut params: Vec<_> = self.params.iter().collect();
        params.sort();
        for (key, value) in params {
            result.push_str(&format!("; {}={}", key, value));
        }
        result
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_header_value())
    }
}
