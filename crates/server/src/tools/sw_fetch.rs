//! sw_fetch tool implementation.
//!
//! Feeds one intercepted request through the active worker. Requests the
//! worker declines are sent to the network directly, as a page would.

use chrono::{DateTime, Utc};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::Network;
use swcache_client::Registration;
use swcache_client::fetch::canonicalize;
use swcache_client::worker::{BypassReason, ClientId, Dispatch, Origin, RequestClass};
use swcache_core::{Error, InterceptedRequest, Response};

use super::json_result;

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a root-relative path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests are cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Optional Accept header.
    #[serde(default)]
    pub accept: Option<String>,

    /// Treat the request as a top-level navigation.
    #[serde(default)]
    pub navigate: bool,

    /// Requesting client from sw_client; omitted means a controlled page.
    #[serde(default)]
    pub client_id: Option<ClientId>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SwFetchOutput {
    pub url: String,
    /// Classification, when the worker handled the request.
    pub class: Option<RequestClass>,
    /// Why the worker declined the request.
    pub bypass: Option<BypassReason>,
    pub origin: Origin,
    pub status: u16,
    pub status_text: String,
    /// Whether the network response was written to a bucket.
    pub cached_after: bool,
    /// When the served cache entry was stored.
    pub stored_at: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub body: String,
}

impl SwFetchOutput {
    fn new(url: &str, response: &Response, origin: Origin) -> Self {
        Self {
            url: url.to_string(),
            class: None,
            bypass: None,
            origin,
            status: response.status,
            status_text: response.status_text.clone(),
            cached_after: false,
            stored_at: None,
            content_type: response.content_type().map(str::to_string),
            body: String::from_utf8_lossy(&response.body).into_owned(),
        }
    }
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(
    registration: &Registration, network: &dyn Network, params: SwFetchParams,
) -> Result<CallToolResult, McpError> {
    let origin = registration.config().origin_url().map_err(Error::from)?;
    let url = canonicalize(&params.url, &origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let method = params.method.trim().to_ascii_uppercase();
    if method.is_empty() {
        return Err(Error::InvalidInput("method cannot be empty".into()).into());
    }

    let mut request = InterceptedRequest::get(url).with_method(method);
    if let Some(accept) = params.accept {
        request = request.with_accept(accept);
    }
    if params.navigate {
        request = request.navigate();
    }

    let dispatch = match params.client_id {
        Some(client) => registration.fetch(client, &request).await?,
        None => registration.handle(&request).await,
    };

    let output = match dispatch {
        Dispatch::Respond { class, outcome } => SwFetchOutput {
            class: Some(class),
            cached_after: outcome.cached_after,
            stored_at: outcome.stored_at,
            ..SwFetchOutput::new(request.url.as_str(), &outcome.response, outcome.origin)
        },
        Dispatch::Bypass(reason) => {
            tracing::debug!(url = %request.url, ?reason, "passing request through");
            let response = network.fetch(&request).await?;
            SwFetchOutput { bypass: Some(reason), ..SwFetchOutput::new(request.url.as_str(), &response, Origin::Network) }
        }
    };

    json_result(&output)
}
