//! resolve_url tool implementation.
//!
//! Resolves a product URL to a display-ready record through the cache.
//! Failures are reported inside the response body with `success: false`.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use itemmeta_client::{ResolveOutcome, Resolver};
use itemmeta_core::{Error, RateLimiter};

use super::{client_id, default_client_id};

/// Input parameters for resolve_url tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveUrlParams {
    /// The product page URL.
    pub url: String,

    /// What the item is for, passed to the text enhancer (e.g. "grade 5 science kit").
    #[serde(default)]
    pub search_context: Option<String>,

    /// Caller identity for rate limiting (default: "local").
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

/// Output structure for resolve_url tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveUrlOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Absent when no image was found; show a placeholder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub cache_hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_count: Option<i64>,
    pub enhanced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ResolveOutcome> for ResolveUrlOutput {
    fn from(outcome: ResolveOutcome) -> Self {
        let record = outcome.record;
        Self {
            success: true,
            name: record.name,
            description: record.description,
            image_url: record.image_url,
            price: record.price,
            cache_hit: outcome.cache_hit,
            hit_count: Some(record.hit_count),
            enhanced: record.enhanced,
            error: None,
        }
    }
}

impl ResolveUrlOutput {
    fn failure(err: &Error) -> Self {
        Self { success: false, error: Some(err.to_string()), ..Default::default() }
    }
}

/// Implementation of the resolve_url tool.
pub async fn resolve_impl(
    resolver: &Resolver, limiter: &RateLimiter, params: ResolveUrlParams,
) -> Result<CallToolResult, McpError> {
    let client = client_id(&params.client_id);

    let result = match limiter.check(client) {
        Ok(()) => resolver.resolve(&params.url, params.search_context.as_deref()).await,
        Err(e) => Err(e),
    };

    let (output, is_error) = match result {
        Ok(outcome) => (ResolveUrlOutput::from(outcome), false),
        Err(e) => {
            tracing::warn!(
                url = %params.url,
                client_id = client,
                retryable = e.is_retryable(),
                error = %e,
                "resolve_url failed"
            );
            (ResolveUrlOutput::failure(&e), true)
        }
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    if is_error {
        Ok(CallToolResult::error(vec![Content::text(json)]))
    } else {
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}
