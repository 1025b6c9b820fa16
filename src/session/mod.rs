//! Authenticated HTTP session against a target
//!
//! # Module Layout
//!
//! - [`context`] -- [`HttpContext`], the chainable request configurator and
//!   uniform executor with status classification and tracing
//! - [`upload`]  -- multipart body assembly and content sniffing for file
//!   uploads
//!
//! This module also holds the pieces shared by both: media-type shorthand
//! expansion, request bodies, and the display style used to render JSON.

pub mod context;
pub mod upload;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use context::{is_success, render_body, HttpContext, Reply};

/// Vendor media-type prefix used when expanding shorthand media types.
pub const DEFAULT_MEDIA_PREFIX: &str = "vnd.vmware.horizon.manager.";

/// Expands a media-type shorthand.
///
/// Bare words become `application/<prefix><word>+json`, the word `json`
/// becomes `application/json`, and anything containing `/` is returned as-is.
///
/// # Examples
///
/// ```
/// use idmctl::session::expand_media_type;
///
/// assert_eq!(
///     expand_media_type("user", "vnd.example."),
///     "application/vnd.example.user+json"
/// );
/// assert_eq!(expand_media_type("json", "vnd.example."), "application/json");
/// assert_eq!(expand_media_type("text/plain", "vnd.example."), "text/plain");
/// ```
pub fn expand_media_type(short: &str, prefix: &str) -> String {
    if short.is_empty() || short.contains('/') {
        short.to_string()
    } else if short == "json" {
        "application/json".to_string()
    } else {
        format!("application/{}{}+json", prefix, short)
    }
}

/// How structured response bodies are rendered for people.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStyle {
    /// YAML documents
    #[default]
    Yaml,
    /// Indented JSON
    Json,
}

impl DisplayStyle {
    /// Renders a JSON value in this style.
    pub fn render(&self, value: &serde_json::Value) -> String {
        match self {
            DisplayStyle::Yaml => {
                serde_yaml::to_string(value).unwrap_or_else(|_| value.to_string())
            }
            DisplayStyle::Json => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

impl std::str::FromStr for DisplayStyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yaml" => Ok(DisplayStyle::Yaml),
            "json" => Ok(DisplayStyle::Json),
            other => Err(format!("unknown output style: {}", other)),
        }
    }
}

/// Payload of an outgoing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// Bytes sent unchanged
    Raw(Vec<u8>),
    /// A structured value sent JSON-encoded
    Json(serde_json::Value),
}

impl RequestBody {
    /// JSON-encodes any serializable value.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(RequestBody::Json(serde_json::to_value(value)?))
    }

    /// `application/x-www-form-urlencoded` body from key/value pairs.
    pub fn form<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in pairs {
            serializer.append_pair(key, value);
        }
        RequestBody::Raw(serializer.finish().into_bytes())
    }

    pub(crate) fn into_bytes(self) -> Result<Option<Vec<u8>>> {
        match self {
            RequestBody::Empty => Ok(None),
            RequestBody::Raw(bytes) => Ok(Some(bytes)),
            RequestBody::Json(value) => Ok(Some(serde_json::to_vec(&value)?)),
        }
    }
}

impl From<&str> for RequestBody {
    fn from(s: &str) -> Self {
        RequestBody::Raw(s.as_bytes().to_vec())
    }
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Raw(s.into_bytes())
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Raw(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_bare_word() {
        assert_eq!(
            expand_media_type("foo", DEFAULT_MEDIA_PREFIX),
            "application/vnd.vmware.horizon.manager.foo+json"
        );
    }

    #[test]
    fn test_expand_json_shorthand() {
        assert_eq!(
            expand_media_type("json", DEFAULT_MEDIA_PREFIX),
            "application/json"
        );
    }

    #[test]
    fn test_expand_passes_full_types_through() {
        for full in ["application/xml", "text/plain", "multipart/form-data; boundary=x"] {
            assert_eq!(expand_media_type(full, DEFAULT_MEDIA_PREFIX), full);
        }
    }

    #[test]
    fn test_expand_empty_stays_empty() {
        assert_eq!(expand_media_type("", DEFAULT_MEDIA_PREFIX), "");
    }

    #[test]
    fn test_display_style_parse() {
        assert_eq!("JSON".parse::<DisplayStyle>(), Ok(DisplayStyle::Json));
        assert_eq!("yaml".parse::<DisplayStyle>(), Ok(DisplayStyle::Yaml));
        assert!("xml".parse::<DisplayStyle>().is_err());
    }

    #[test]
    fn test_display_style_render() {
        let value = serde_json::json!({"name": "alice"});
        assert_eq!(DisplayStyle::Yaml.render(&value), "name: alice\n");
        assert!(DisplayStyle::Json.render(&value).contains("\"name\": \"alice\""));
    }

    #[test]
    fn test_form_body_is_url_encoded() {
        let body = RequestBody::form([("grant_type", "client_credentials"), ("x", "a b")]);
        assert_eq!(
            body,
            RequestBody::Raw(b"grant_type=client_credentials&x=a+b".to_vec())
        );
    }

    #[test]
    fn test_json_body_bytes() {
        let body = RequestBody::json(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(body.into_bytes().unwrap(), Some(b"{\"a\":1}".to_vec()));
    }
}
