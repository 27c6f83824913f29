//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::cache::{CacheListParams, CachePurgeParams, list_impl, purge_impl};
use crate::tools::sw_fetch::{SwFetchParams, fetch_impl};
use crate::tools::worker::{
    SwClientParams, SwMessageParams, SwRegisterParams, client_impl, message_impl, register_impl, status_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use swcache_client::{Network, Registration};

/// The main MCP server handler for swcache.
#[derive(Clone)]
pub struct SwCacheServer {
    tool_router: ToolRouter<Self>,
    registration: Arc<Registration>,
    network: Arc<dyn Network>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SwCacheServer {
    /// Create a new server handler.
    ///
    /// `network` is used for requests the worker does not intercept.
    pub fn new(registration: Arc<Registration>, network: Arc<dyn Network>) -> Self {
        Self { tool_router: Self::tool_router(), registration, network }
    }

    #[tool(
        description = "Send a request through the offline cache. Returns status, body and whether it came from cache, network or the offline fallback."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, self.network.as_ref(), params.0).await
    }

    #[tool(description = "Install a new cache version (pre-caches the app shell) and activate it when allowed.")]
    async fn sw_register(&self, params: Parameters<SwRegisterParams>) -> Result<CallToolResult, McpError> {
        register_impl(&self.registration, params.0).await
    }

    #[tool(description = "Post a control message such as SKIP_WAITING to the waiting or active version.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.registration, params.0).await
    }

    #[tool(description = "Open or close a client page. Closing the last controlled client activates a waiting version.")]
    async fn sw_client(&self, params: Parameters<SwClientParams>) -> Result<CallToolResult, McpError> {
        client_impl(&self.registration, params.0).await
    }

    #[tool(description = "Show installing, waiting and active versions, open clients and existing buckets.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.registration).await
    }

    #[tool(description = "List cache buckets with entry counts, or the entries of one bucket.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.registration, params.0).await
    }

    #[tool(description = "Delete a cache bucket, or trim it to its newest N entries.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.registration, params.0).await
    }
}

impl ServerHandler for SwCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "swcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::harness;

    #[test]
    fn test_all_tools_listed() {
        let h = harness();
        let server = SwCacheServer::new(h.registration, h.network);
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["cache_list", "cache_purge", "sw_client", "sw_fetch", "sw_message", "sw_register", "sw_status"]
        );
    }
}
