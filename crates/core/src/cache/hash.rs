//! Request-addressed cache key generation.

use sha2::{Digest, Sha256};
use url::Url;

/// Compute the cache key for a request.
///
/// The method is upper-cased and the fragment dropped, so `get /a#top`
/// and `GET /a` share an entry. Query strings are kept verbatim.
pub fn compute_cache_key(method: &str, url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}
