//! Reverse proxy in front of the app origin.
//!
//! Every request, whatever its path, is converted to a [`ShellRequest`] and
//! answered by the controller.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use shellcache_client::ShellController;
use shellcache_client::fetch::is_hop_by_hop;
use shellcache_core::{Error, RequestMode, ShellRequest, ShellResponse};
use url::Url;

use crate::error::ProxyError;

#[derive(Clone)]
pub struct ProxyState {
    controller: Arc<ShellController>,
    origin: Url,
    max_bytes: usize,
}

impl ProxyState {
    pub fn new(controller: Arc<ShellController>, origin: Url, max_bytes: usize) -> Self {
        Self { controller, origin, max_bytes }
    }
}

pub fn router(state: ProxyState) -> Router {
    Router::new().fallback(intercept).with_state(state)
}

async fn intercept(State(state): State<ProxyState>, request: Request) -> Result<Response, ProxyError> {
    let request = into_shell_request(request, &state.origin, state.max_bytes).await?;
    let response = state.controller.handle_fetch(request).await?;
    Ok(into_response(response))
}

/// Convert an incoming request, resolving origin-form targets against `origin`.
pub async fn into_shell_request(request: Request, origin: &Url, max_bytes: usize) -> Result<ShellRequest, ProxyError> {
    let (parts, body) = request.into_parts();

    let url = request_url(&parts.uri, origin)?;
    let mode = request_mode(&parts.method, &parts.headers);
    let headers = parts
        .headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();
    let body = axum::body::to_bytes(body, max_bytes)
        .await
        .map_err(|e| ProxyError::BadRequest(format!("failed to read request body: {e}")))?;

    Ok(ShellRequest { method: parts.method.as_str().to_string(), url, mode, headers, body })
}

/// Absolute-form targets keep their own origin; origin-form targets are
/// always placed on the app origin.
fn request_url(uri: &Uri, origin: &Url) -> Result<Url, Error> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Url::parse(&uri.to_string()).map_err(|e| Error::InvalidUrl(e.to_string()));
    }

    let mut url = origin.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    Ok(url)
}

/// Derive the fetch mode from `Sec-Fetch-Mode`, or guess from `Accept`.
pub fn request_mode(method: &Method, headers: &HeaderMap) -> RequestMode {
    if let Some(mode) = headers
        .get("sec-fetch-mode")
        .and_then(|v| v.to_str().ok())
        .and_then(RequestMode::from_fetch_mode)
    {
        return mode;
    }

    let prefers_html = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .and_then(|accept| accept.split(',').next())
        .is_some_and(|first| first.trim().starts_with("text/html"));

    if method == Method::GET && prefers_html { RequestMode::Navigate } else { RequestMode::NoCors }
}

pub fn into_response(response: ShellResponse) -> Response {
    let mut builder = Response::builder().status(response.status);
    for (name, value) in &response.headers {
        if !is_hop_by_hop(name) {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }

    match builder.body(Body::from(response.body)) {
        Ok(resp) => resp,
        Err(err) => {
            tracing::warn!(url = %response.url, error = %err, "upstream response could not be relayed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}
