//! sw_message tool implementation.
//!
//! Posts a `{ "type": ... }` control message to the waiting worker, or to
//! the active one when nothing waits.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{ControlMessage, Registration};
use swcache_core::Error;

use crate::tools::json_result;

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message type, e.g. "SKIP_WAITING". Unknown types are ignored.
    #[serde(rename = "type")]
    pub message_type: String,
}

/// Implementation of the sw_message tool.
pub async fn message_impl(registration: &Registration, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let message: ControlMessage = serde_json::from_value(serde_json::json!({ "type": params.message_type.trim() }))
        .map_err(|e| Error::InvalidInput(format!("invalid control message: {e}")))?;

    let report = registration.post_message(&message).await?;
    json_result(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{harness, output_json};

    fn params(message_type: &str) -> SwMessageParams {
        SwMessageParams { message_type: message_type.into() }
    }

    #[tokio::test]
    async fn test_message_without_worker() {
        let h = harness();
        let err = message_impl(&h.registration, params("SKIP_WAITING")).await.unwrap_err();
        assert_eq!(err.code.0, -32014);
    }

    #[tokio::test]
    async fn test_skip_waiting_to_active_worker() {
        let h = harness();
        h.registration.register(None).await.unwrap();

        let output = output_json(&message_impl(&h.registration, params("SKIP_WAITING")).await.unwrap());
        assert_eq!(output["version"], "v1");
        assert_eq!(output["activated"], false);
    }

    #[tokio::test]
    async fn test_unknown_message_ignored() {
        let h = harness();
        h.registration.register(None).await.unwrap();

        let output = output_json(&message_impl(&h.registration, params("REFRESH_FILTERS")).await.unwrap());
        assert_eq!(output["activated"], false);
    }

    #[test]
    fn test_params_use_type_field() {
        let p: SwMessageParams = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(p.message_type, "SKIP_WAITING");
    }
}
