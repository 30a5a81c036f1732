//! Request and response types that flow through the controller.
//!
//! These are transport-agnostic: the proxy converts to and from axum types,
//! the network client to and from reqwest types, and the cache stores them
//! as rows.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// How the client issued a request, mirroring the fetch `mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// A full-page load.
    Navigate,
    SameOrigin,
    Cors,
    NoCors,
}

impl RequestMode {
    /// Parse a `Sec-Fetch-Mode` header value.
    pub fn from_fetch_mode(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "navigate" => Some(Self::Navigate),
            "same-origin" => Some(Self::SameOrigin),
            "cors" => Some(Self::Cors),
            "no-cors" => Some(Self::NoCors),
            _ => None,
        }
    }
}

/// Classification of a response relative to the app origin.
///
/// Only `Basic` responses have a status and body that the app can vouch for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response.
    Basic,
    /// Cross-origin response obtained in CORS mode.
    Cors,
    /// Cross-origin response obtained without CORS.
    Opaque,
    /// Synthetic network error response.
    Error,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Cors => "cors",
            Self::Opaque => "opaque",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "cors" => Ok(Self::Cors),
            "opaque" => Ok(Self::Opaque),
            "error" => Ok(Self::Error),
            other => Err(Error::CorruptEntry(format!("unknown response kind: {other}"))),
        }
    }
}

/// An outgoing request observed by the controller.
#[derive(Debug, Clone)]
pub struct ShellRequest {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ShellRequest {
    /// A bodiless `GET` with no headers.
    pub fn get(url: Url, mode: RequestMode) -> Self {
        Self { method: "GET".to_string(), url, mode, headers: Vec::new(), body: Bytes::new() }
    }

    /// A full-page navigation to `url`.
    pub fn navigate(url: Url) -> Self {
        Self::get(url, RequestMode::Navigate)
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Whether the request identifies a user (`Cookie` or `Authorization`).
    pub fn has_credentials(&self) -> bool {
        self.header("cookie").is_some() || self.header("authorization").is_some()
    }
}

/// A response returned to the client, live or from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellResponse {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub kind: ResponseKind,
}

impl ShellResponse {
    /// Whether the status is in the 2xx range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether this response may be written to a cache store.
    ///
    /// Failed statuses and anything that is not same-origin are rejected so
    /// the store never holds error pages or content it cannot verify.
    pub fn is_cacheable(&self) -> bool {
        self.ok() && self.kind == ResponseKind::Basic
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
