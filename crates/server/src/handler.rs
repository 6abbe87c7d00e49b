//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    CacheBackfillParams, CacheGetParams, EnhanceManualParams, ImproveItemParams, RateLimitResetParams,
    ResolveUrlParams, backfill, cache, enhance, rate_limit, resolve,
};

use itemmeta_client::Resolver;
use itemmeta_core::{AppConfig, RateLimiter};
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

/// The main MCP server handler for itemmeta.
#[derive(Clone)]
pub struct ItemMetaServer {
    tool_router: ToolRouter<Self>,
    config: Arc<AppConfig>,
    resolver: Arc<Resolver>,
    limiter: RateLimiter,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ItemMetaServer {
    /// Create a new server handler.
    pub fn new(config: Arc<AppConfig>, resolver: Arc<Resolver>, limiter: RateLimiter) -> Self {
        Self { tool_router: Self::tool_router(), config, resolver, limiter }
    }

    #[tool(
        description = "Resolve a product URL to a display-ready item: name, description, image_url, price. Served from cache when possible; failures are reported in the body with success=false."
    )]
    async fn resolve_url(&self, params: Parameters<ResolveUrlParams>) -> Result<CallToolResult, McpError> {
        resolve::resolve_impl(&self.resolver, &self.limiter, params.0).await
    }

    #[tool(description = "Turn a hand-typed item note into a brand-free name and a short description.")]
    async fn enhance_manual(&self, params: Parameters<EnhanceManualParams>) -> Result<CallToolResult, McpError> {
        enhance::manual_impl(self.resolver.enhancer(), &self.limiter, params.0).await
    }

    #[tool(description = "Rewrite an existing item's name and description without brands or marketing language.")]
    async fn improve_item(&self, params: Parameters<ImproveItemParams>) -> Result<CallToolResult, McpError> {
        enhance::improve_impl(self.resolver.enhancer(), &self.limiter, params.0).await
    }

    #[tool(description = "Fill missing image_url fields from each cached item's stored raw metadata. Idempotent. Pass nextCursor back as after to continue a partial scan.")]
    async fn cache_backfill(&self, params: Parameters<CacheBackfillParams>) -> Result<CallToolResult, McpError> {
        backfill::backfill_impl(self.resolver.db(), self.config.backfill_batch_size, params.0).await
    }

    #[tool(description = "Clear a client's rate limit counter. Not available in production.")]
    async fn rate_limit_reset(&self, params: Parameters<RateLimitResetParams>) -> Result<CallToolResult, McpError> {
        rate_limit::reset_impl(&self.config, &self.limiter, params.0)
    }

    #[tool(description = "Retrieve a cached item by key or URL.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        cache::get_impl(self.resolver.db(), params.0).await
    }
}

impl ServerHandler for ItemMetaServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "itemmeta".into(),
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
