//! Mock records and HTTP methods.
//!
//! A [`MockRecord`] is one entry of a YAML collection file:
//!
//! ```yaml
//! - method: GET
//!   url_pattern: "widgets/\\d+"
//!   status: 418
//!   headers:
//!     Content-Type: application/json
//!   body:
//!     name: teapot
//!   interpolate:
//!     name: requested_name
//! ```

use crate::error::HotMockError;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Supported HTTP methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    Connect,
}

impl HttpMethod {
    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = HotMockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "TRACE" => Ok(HttpMethod::Trace),
            "CONNECT" => Ok(HttpMethod::Connect),
            _ => Err(HotMockError::InvalidMethod(s.to_string())),
        }
    }
}

impl Serialize for HttpMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HttpMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
            HttpMethod::Trace => reqwest::Method::TRACE,
            HttpMethod::Connect => reqwest::Method::CONNECT,
        }
    }
}

/// A canned response keyed by method and URL pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockRecord {
    /// Method to match (absent = any method)
    #[serde(default)]
    pub method: Option<HttpMethod>,

    /// Regular expression matched anywhere within the outgoing URL
    pub url_pattern: String,

    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response headers, in insertion order
    #[serde(default)]
    pub headers: IndexMap<String, String>,

    /// Response body
    #[serde(default)]
    pub body: serde_json::Value,

    /// Body field -> request body field substitutions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpolate: Option<IndexMap<String, String>>,
}

fn default_status() -> u16 {
    200
}

impl MockRecord {
    /// Create a record answering `method` calls whose URL matches `url_pattern`.
    pub fn new(method: HttpMethod, url_pattern: impl Into<String>) -> Self {
        Self {
            method: Some(method),
            url_pattern: url_pattern.into(),
            status: default_status(),
            headers: IndexMap::new(),
            body: serde_json::Value::Null,
            interpolate: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: IndexMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }

    /// Substitute `target` in the body with the request body's `source` field.
    pub fn with_interpolation(
        mut self,
        target: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        self.interpolate
            .get_or_insert_with(IndexMap::new)
            .insert(target.into(), source.into());
        self
    }

    /// Whether this record has the same (method, url_pattern) key.
    pub fn same_key(&self, method: Option<HttpMethod>, url_pattern: &str) -> bool {
        self.method == method && self.url_pattern == url_pattern
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Insert a header, replacing any existing entry whose name differs only by case.
pub(crate) fn set_header(headers: &mut IndexMap<String, String>, name: String, value: String) {
    if let Some(existing) = headers
        .keys()
        .find(|k| k.eq_ignore_ascii_case(&name))
        .cloned()
    {
        headers.shift_remove(&existing);
    }
    headers.insert(name, value);
}
