//! sw_client tool implementation.
//!
//! Opens or closes a client (a page). Closing the last controlled client
//! lets a waiting version take over.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::Registration;
use swcache_client::worker::{ClientId, ClientInfo};
use swcache_core::Error;

use crate::tools::json_result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClientAction {
    Open,
    Close,
}

/// Parameters for the sw_client tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwClientParams {
    pub action: ClientAction,

    /// Client to close; required for "close".
    #[serde(default)]
    pub client_id: Option<ClientId>,
}

/// Output from the sw_client tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SwClientOutput {
    /// The opened client.
    pub client: Option<ClientInfo>,
    /// Whether closing activated the waiting version.
    pub activated_waiting: bool,
}

/// Implementation of the sw_client tool.
pub async fn client_impl(registration: &Registration, params: SwClientParams) -> Result<CallToolResult, McpError> {
    let output = match params.action {
        ClientAction::Open => SwClientOutput { client: Some(registration.open_client().await), activated_waiting: false },
        ClientAction::Close => {
            let id = params
                .client_id
                .ok_or_else(|| Error::InvalidInput("client_id is required to close a client".to_string()))?;
            SwClientOutput { client: None, activated_waiting: registration.close_client(id).await? }
        }
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{harness, output_json};

    #[tokio::test]
    async fn test_open_and_close() {
        let h = harness();
        h.registration.register(None).await.unwrap();

        let open = SwClientParams { action: ClientAction::Open, client_id: None };
        let output = output_json(&client_impl(&h.registration, open).await.unwrap());
        assert_eq!(output["client"]["controlled"], true);
        let id = output["client"]["id"].as_u64().unwrap();

        let close = SwClientParams { action: ClientAction::Close, client_id: Some(id) };
        let output = output_json(&client_impl(&h.registration, close).await.unwrap());
        assert_eq!(output["activated_waiting"], false);
        assert!(output["client"].is_null());
    }

    #[tokio::test]
    async fn test_close_requires_id() {
        let h = harness();
        let close = SwClientParams { action: ClientAction::Close, client_id: None };
        let err = client_impl(&h.registration, close).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[tokio::test]
    async fn test_close_unknown_client() {
        let h = harness();
        let close = SwClientParams { action: ClientAction::Close, client_id: Some(7) };
        assert!(client_impl(&h.registration, close).await.is_err());
    }
}
