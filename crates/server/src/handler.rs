//! MCP server handler implementation.
//!
//! This module defines the main server handler that routes tool calls to the
//! cache agent.
use std::sync::Arc;

use crate::tools::{
    OfflineFetchParams,
    cache::{CacheGetParams, CacheListParams, CachePurgeParams, get_impl, list_impl, purge_impl},
    fetch_impl, status_impl,
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
use store_finder_client::{CacheAgent, FetchClient};
use store_finder_core::CacheDb;

/// Agent type served over MCP: SQLite buckets and a real HTTP client.
pub type Agent = CacheAgent<CacheDb, FetchClient>;

/// The main MCP server handler for store-finder.
#[derive(Clone)]
pub struct StoreFinderServer {
    tool_router: ToolRouter<Self>,
    agent: Arc<Agent>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl StoreFinderServer {
    /// Create a new server handler around an installed agent.
    pub fn new(agent: Arc<Agent>) -> Self {
        Self { tool_router: Self::tool_router(), agent }
    }

    /// Dispatch a request through the offline cache agent.
    #[tool(description = "Fetch a URL through the offline cache agent. \
        Same-origin GET requests are answered cache-first, with a 503 offline response when nothing is cached \
        and the network is down. Other requests go to the network unaltered.")]
    async fn offline_fetch(&self, params: Parameters<OfflineFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.agent, params.0).await
    }

    /// Report lifecycle state and bucket names.
    #[tool(description = "Report the cache agent lifecycle state, its bucket names, and pending background tasks.")]
    async fn agent_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.agent).await
    }

    /// List buckets, or the entries of one bucket.
    #[tool(description = "List cache buckets with entry counts, or the request keys stored in one bucket.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.agent, params.0).await
    }

    /// Look up a stored response without touching the network.
    #[tool(description = "Return the cached response for a URL, checking the precache before the runtime bucket.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.agent, params.0).await
    }

    /// Delete a bucket.
    #[tool(description = "Delete a cache bucket and all of its entries.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.agent, params.0).await
    }
}

impl ServerHandler for StoreFinderServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "store-finder".into(),
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
