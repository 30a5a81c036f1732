//! Per-request routing: which policy answers a request.

use shellcache_core::{RequestMode, ShellRequest};
use url::Url;

use crate::fetch::same_origin;

/// Why a request skipped the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// Path matched a bypass prefix such as `/api/`.
    Api,
    CrossOrigin,
    /// Only `GET` responses are stored.
    Method,
}

/// Policy chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Straight to the network; the cache is neither read nor written.
    Bypass(BypassReason),
    /// Network first, falling back to the cache.
    Navigation,
    /// Cache first, filling the cache on a miss.
    Asset,
}

/// Pick the route for a request made by a page of `origin`.
pub fn classify(request: &ShellRequest, origin: &Url, bypass_prefixes: &[String]) -> Route {
    if !same_origin(&request.url, origin) {
        return Route::Bypass(BypassReason::CrossOrigin);
    }

    let path = request.url.path();
    if bypass_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str())) {
        return Route::Bypass(BypassReason::Api);
    }

    if !request.is_get() {
        return Route::Bypass(BypassReason::Method);
    }

    if request.mode == RequestMode::Navigate { Route::Navigation } else { Route::Asset }
}
