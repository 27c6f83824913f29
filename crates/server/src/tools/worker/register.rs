//! sw_register tool implementation.
//!
//! Installs a new worker version and activates it when nothing is active
//! or the version skips waiting.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::Registration;
use swcache_core::Error;

use crate::tools::json_result;

/// Parameters for the sw_register tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwRegisterParams {
    /// Version tag for the new buckets (default: the configured version).
    #[serde(default)]
    pub version: Option<String>,
}

/// Implementation of the sw_register tool.
pub async fn register_impl(registration: &Registration, params: SwRegisterParams) -> Result<CallToolResult, McpError> {
    let version = params.version.as_deref().map(str::trim);
    if version.is_some_and(str::is_empty) {
        return Err(Error::InvalidInput("version cannot be empty".to_string()).into());
    }

    let report = registration.register(version).await?;
    json_result(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{harness, output_json};

    #[tokio::test]
    async fn test_register_default_version() {
        let h = harness();
        let result = register_impl(&h.registration, SwRegisterParams::default()).await.unwrap();
        let output = output_json(&result);
        assert_eq!(output["version"], "v1");
        assert_eq!(output["activated"], true);
        assert_eq!(output["cached"], 5);
    }

    #[tokio::test]
    async fn test_register_version_override() {
        let h = harness();
        register_impl(&h.registration, SwRegisterParams::default()).await.unwrap();

        let params = SwRegisterParams { version: Some("v2".into()) };
        let output = output_json(&register_impl(&h.registration, params).await.unwrap());
        assert_eq!(output["version"], "v2");
        assert_eq!(output["deleted"], serde_json::json!(["static-v1"]));
    }

    #[tokio::test]
    async fn test_register_rejects_blank_version() {
        let h = harness();
        let params = SwRegisterParams { version: Some("  ".into()) };
        assert!(register_impl(&h.registration, params).await.is_err());
    }

    #[tokio::test]
    async fn test_register_install_failure() {
        let h = harness();
        h.network.go_offline();
        let err = register_impl(&h.registration, SwRegisterParams::default()).await.unwrap_err();
        assert_eq!(err.code.0, -32013);
        assert!(h.registration.active().await.is_none());
    }
}
