//! enhance_manual and improve_item tool implementations.
//!
//! Both always answer with `{name, description, enhanced}`; when the
//! rewriting service is unavailable the input text comes back unchanged
//! with `enhanced: false`.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use itemmeta_client::{Enhancement, ItemEnhancementRequest, TextEnhancer};
use itemmeta_core::{Error, RateLimiter};

use super::{client_id, default_client_id};

/// Input parameters for enhance_manual tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceManualParams {
    /// What the user typed, e.g. "safety goggles for chem lab".
    pub user_input: String,

    /// What the item is for.
    #[serde(default)]
    pub search_context: Option<String>,

    /// Caller identity for rate limiting (default: "local").
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

/// Input parameters for improve_item tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImproveItemParams {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub url: Option<String>,

    /// Caller identity for rate limiting (default: "local").
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

fn to_result(enhancement: &Enhancement) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(enhancement)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Implementation of the enhance_manual tool.
pub async fn manual_impl(
    enhancer: &TextEnhancer, limiter: &RateLimiter, params: EnhanceManualParams,
) -> Result<CallToolResult, McpError> {
    if params.user_input.trim().is_empty() {
        return Err(Error::InvalidInput("user_input cannot be empty".into()).into());
    }

    limiter.check(client_id(&params.client_id))?;

    let enhancement = enhancer
        .enhance_manual(&params.user_input, params.search_context.as_deref())
        .await;
    to_result(&enhancement)
}

/// Implementation of the improve_item tool.
pub async fn improve_impl(
    enhancer: &TextEnhancer, limiter: &RateLimiter, params: ImproveItemParams,
) -> Result<CallToolResult, McpError> {
    let req = ItemEnhancementRequest {
        url: params.url,
        title: params.title,
        description: params.description,
        price: params.price,
        image: params.image,
        ..Default::default()
    };

    if !req.has_text() {
        return Err(Error::InvalidInput("title or description is required".into()).into());
    }

    limiter.check(client_id(&params.client_id))?;

    let enhancement = enhancer.improve_existing(&req).await;
    to_result(&enhancement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{enhancer, result_json};
    use std::time::Duration;

    #[tokio::test]
    async fn test_manual_enhanced() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        let params = EnhanceManualParams {
            user_input: "lab goggles".into(),
            search_context: Some("chemistry".into()),
            client_id: "local".into(),
        };

        let result = manual_impl(&enhancer(), &limiter, params).await.unwrap();
        let output: Enhancement = result_json(&result);
        assert!(output.enhanced);
        assert_eq!(output.name, "Lab goggles");
    }

    #[tokio::test]
    async fn test_manual_fallback_without_service() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        let params =
            EnhanceManualParams { user_input: "glue sticks".into(), search_context: None, client_id: "local".into() };

        let result = manual_impl(&TextEnhancer::new(None, Vec::new()), &limiter, params).await.unwrap();
        let output: Enhancement = result_json(&result);
        assert!(!output.enhanced);
        assert_eq!(output.name, "glue sticks");
        assert_eq!(output.description, "");
    }

    #[tokio::test]
    async fn test_manual_empty_input() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        let params = EnhanceManualParams { user_input: "  ".into(), search_context: None, client_id: "local".into() };
        assert!(manual_impl(&enhancer(), &limiter, params).await.is_err());
    }

    #[tokio::test]
    async fn test_improve_rate_limited() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let params = ImproveItemParams {
            title: Some("Goggles".into()),
            description: None,
            price: None,
            image: None,
            url: None,
            client_id: "room-4".into(),
        };

        assert!(improve_impl(&enhancer(), &limiter, params.clone()).await.is_ok());
        let denied = improve_impl(&enhancer(), &limiter, params).await.unwrap_err();
        assert_eq!(denied.code.0, -32010);
    }

    #[tokio::test]
    async fn test_improve_requires_text() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        let params = ImproveItemParams {
            title: None,
            description: None,
            price: Some("4.99".into()),
            image: None,
            url: None,
            client_id: "local".into(),
        };
        let err = improve_impl(&enhancer(), &limiter, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
