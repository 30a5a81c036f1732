//! Upstream fetch pipeline.
//!
//! ### Network seam
//! - [`Network`] is the only way the controller reaches the origin.
//! - [`FetchClient`] implements it over reqwest.
//!
//! ### Response classification
//! - Same-origin final URL (after redirects): `basic`
//! - Cross-origin in `cors` mode: `cors`, otherwise `opaque`
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 10MB (configurable)
//! - No timeout unless configured

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, Method};
use shellcache_core::{AppConfig, Error, RequestMode, ResponseKind, ShellRequest, ShellResponse};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize, resolve, same_origin};

/// Headers that describe a single connection and never cross a proxy.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Whether a header must be dropped when forwarding.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Classify a response by where it finally came from.
pub fn classify_response(mode: RequestMode, final_url: &::url::Url, origin: &::url::Url) -> ResponseKind {
    if same_origin(final_url, origin) {
        ResponseKind::Basic
    } else if mode == RequestMode::Cors {
        ResponseKind::Cors
    } else {
        ResponseKind::Opaque
    }
}

/// Anything that can answer a request from the network.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request once. No retries.
    async fn fetch(&self, request: &ShellRequest) -> Result<ShellResponse, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "shellcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: none)
    pub timeout: Option<Duration>,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "shellcache/0.1".to_string(), max_bytes: 10 * 1024 * 1024, timeout: None, max_redirects: 5 }
    }
}

impl FetchConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// HTTP fetch client bound to the app origin.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
    origin: ::url::Url,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig, origin: ::url::Url) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config, origin })
    }
}

fn network_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(err.to_string())
    } else {
        Error::HttpError(format!("network error: {err}"))
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &ShellRequest) -> Result<ShellResponse, Error> {
        let start = Instant::now();

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {e}", request.method)))?;

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in &request.headers {
            // reqwest negotiates and decodes compression itself
            if is_hop_by_hop(name) || name.eq_ignore_ascii_case("accept-encoding") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status().as_u16();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let body = response.bytes().await.map_err(network_error)?;
        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        let kind = classify_response(request.mode, &final_url, &self.origin);

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            final_url = %final_url,
            status,
            kind = %kind,
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "upstream fetch"
        );

        Ok(ShellResponse { url: final_url, status, headers, body, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> ::url::Url {
        ::url::Url::parse(s).unwrap()
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "shellcache/0.1");
        assert_eq!(config.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.timeout, None);
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app() {
        let app = AppConfig { user_agent: "creatrid-edge".into(), timeout_ms: Some(2500), ..Default::default() };
        let config = FetchConfig::from_app(&app);
        assert_eq!(config.user_agent, "creatrid-edge");
        assert_eq!(config.timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_hop_by_hop() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("transfer-encoding"));
        assert!(is_hop_by_hop("Host"));
        assert!(!is_hop_by_hop("content-type"));
        assert!(!is_hop_by_hop("cookie"));
    }

    #[test]
    fn test_classify_same_origin_is_basic() {
        let origin = url("https://creatrid.com");
        let kind = classify_response(RequestMode::NoCors, &url("https://creatrid.com/_next/app.js"), &origin);
        assert_eq!(kind, ResponseKind::Basic);
    }

    #[test]
    fn test_classify_cross_origin() {
        let origin = url("https://creatrid.com");
        let cdn = url("https://cdn.example.com/font.woff2");
        assert_eq!(classify_response(RequestMode::NoCors, &cdn, &origin), ResponseKind::Opaque);
        assert_eq!(classify_response(RequestMode::Cors, &cdn, &origin), ResponseKind::Cors);
        assert_eq!(classify_response(RequestMode::Navigate, &cdn, &origin), ResponseKind::Opaque);
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(FetchConfig::default(), url("http://localhost:3000"));
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_network_error() {
        let client = FetchClient::new(FetchConfig::default(), url("http://127.0.0.1:9")).unwrap();
        let request = ShellRequest::navigate(url("http://127.0.0.1:9/"));
        let err = client.fetch(&request).await.unwrap_err();
        assert!(err.is_network());
    }
}
