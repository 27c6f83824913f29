//! Normalized request keys for bucket entries.

use sha2::{Digest, Sha256};
use url::Url;

use crate::InterceptedRequest;

/// Compute the content-addressed key of a request within a bucket.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalize a URL for keying: drop the fragment, keep the query as-is.
///
/// Hosts of special schemes are already lowercased by the parser.
pub fn normalize_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// Key under which a request's response is stored in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    /// SHA-256 of method and normalized URL, hex encoded.
    pub hash: String,
    /// The normalized URL, kept for listing.
    pub url: String,
}

impl RequestKey {
    pub fn for_request(request: &InterceptedRequest) -> Self {
        let url = normalize_url(&request.url);
        Self { hash: compute_cache_key(&request.method, &url), url }
    }

    /// Key of a plain `GET` for `url`.
    pub fn for_url(url: &Url) -> Self {
        let url = normalize_url(url);
        Self { hash: compute_cache_key("GET", &url), url }
    }
}
