//! sw_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::Serialize;
use swcache_client::Registration;
use swcache_client::worker::RegistrationStatus;

use crate::tools::json_result;

/// Output from the sw_status tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SwStatusOutput {
    /// Configured origin requests are resolved against.
    pub origin: String,
    #[serde(flatten)]
    pub registration: RegistrationStatus,
    /// Every bucket currently in the store, oldest first.
    pub buckets: Vec<String>,
}

/// Implementation of the sw_status tool.
pub async fn status_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let buckets = registration.storage().keys().await?;
    let output = SwStatusOutput {
        origin: registration.config().origin.clone(),
        registration: registration.status().await,
        buckets,
    };
    json_result(&output)
}
