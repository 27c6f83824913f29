//! URL handling for intercepted requests.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Whether a scheme belongs to a browser extension (`chrome-extension`,
/// `moz-extension`, `safari-web-extension`, ...).
pub fn is_extension_scheme(scheme: &str) -> bool {
    scheme.ends_with("-extension")
}

/// Canonicalize a URL string as the host would see it in a request.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve root-relative paths (`/api/...`) against `origin`
/// 3. Default scheme to https:// if missing
/// 4. Lowercase the host, remove the fragment, keep the query intact
///
/// Only http(s) and browser-extension schemes are accepted; extension
/// URLs are kept so the classifier can let them through untouched.
pub fn canonicalize(input: &str, origin: &url::Url) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = if trimmed.starts_with('/') && !trimmed.starts_with("//") {
        origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    } else if trimmed.contains("://") {
        url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    } else {
        url::Url::parse(&format!("https://{}", trimmed.trim_start_matches('/')))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme if is_extension_scheme(scheme) => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let lower = host.to_lowercase();
        if lower != host {
            parsed
                .set_host(Some(&lower))
                .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        }
    }

    parsed.set_fragment(None);

    Ok(parsed)
}
