//! rate_limit_reset tool implementation.
//!
//! Clears a client's request log. Refused in production.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use itemmeta_core::{AppConfig, Error, RateLimiter};

use super::{client_id, default_client_id};

/// Input parameters for rate_limit_reset tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResetParams {
    /// Client whose counter is cleared (default: "local").
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

/// Output structure for rate_limit_reset tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResetOutput {
    pub client_id: String,
    /// False when the client had no recorded requests.
    pub cleared: bool,
}

/// Implementation of the rate_limit_reset tool.
pub fn reset_impl(
    config: &AppConfig, limiter: &RateLimiter, params: RateLimitResetParams,
) -> Result<CallToolResult, McpError> {
    if config.is_production() {
        return Err(Error::Forbidden("rate_limit_reset is disabled in production".into()).into());
    }

    let client = client_id(&params.client_id).to_string();
    let cleared = limiter.reset(&client);
    tracing::info!(client_id = %client, cleared, "rate limit reset");

    let output = RateLimitResetOutput { client_id: client, cleared };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
