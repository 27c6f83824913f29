//! Request and response snapshots exchanged between the host and the cache.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// Whether a request loads a top-level document or a sub-resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level document load (`request.mode == "navigate"`).
    Navigate,
    #[default]
    Subresource,
}

/// Read-only snapshot of an outgoing request at the moment of interception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub method: String,
    pub url: Url,
    pub destination: Destination,
    pub accept: Option<String>,
}

impl InterceptedRequest {
    /// A `GET` sub-resource request for `url`.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".to_string(), url, destination: Destination::Subresource, accept: None }
    }

    /// Parse `url` and build a request with the given method.
    pub fn parse(method: &str, url: &str) -> Result<Self, Error> {
        let url = Url::parse(url.trim()).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self { method: method.trim().to_ascii_uppercase(), ..Self::get(url) })
    }

    /// Mark the request as a top-level navigation.
    pub fn navigate(mut self) -> Self {
        self.destination = Destination::Navigate;
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Navigate
    }
}

/// A response as seen by the requesting page, cached or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    /// Header name/value pairs in wire order.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// URL the response was produced for, if known.
    pub url: Option<String>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, status_text: String::new(), headers: Vec::new(), body: body.into(), url: None }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    /// Synthetic response returned when neither cache nor network can answer.
    pub fn offline() -> Self {
        Self::new(503, Bytes::from_static(b"Offline"))
            .with_status_text("Service Unavailable")
            .with_header("Content-Type", "text/plain")
    }

    /// 2xx, the only statuses ever written to a bucket.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uppercases_method() {
        let req = InterceptedRequest::parse("post", "https://example.com/api/bookings").unwrap();
        assert_eq!(req.method, "POST");
        assert!(!req.is_get());
        assert_eq!(req.destination, Destination::Subresource);
    }

    #[test]
    fn test_parse_invalid_url() {
        let result = InterceptedRequest::parse("GET", "not a url");
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_builders() {
        let req = InterceptedRequest::parse("GET", "https://example.com/providers")
            .unwrap()
            .navigate()
            .with_accept("text/html");
        assert!(req.is_navigation());
        assert_eq!(req.accept.as_deref(), Some("text/html"));
        assert!(req.with_method("get").is_get());
    }

    #[test]
    fn test_offline_response() {
        let resp = Response::offline();
        assert_eq!(resp.status, 503);
        assert_eq!(resp.status_text, "Service Unavailable");
        assert_eq!(&resp.body[..], b"Offline");
        assert_eq!(resp.content_type(), Some("text/plain"));
        assert!(!resp.is_success());
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let resp = Response::new(200, "ok").with_header("ETag", "\"abc\"");
        assert_eq!(resp.header("etag"), Some("\"abc\""));
        assert_eq!(resp.header("last-modified"), None);
        assert!(resp.is_success());
    }
}
