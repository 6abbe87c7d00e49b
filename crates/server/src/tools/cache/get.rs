//! cache_get tool implementation.
//!
//! Retrieves a cached item by key or by URL.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use itemmeta_client::fetch::canonicalize;
use itemmeta_core::cache::hash::is_valid_key;
use itemmeta_core::{CacheDb, CacheRecord, Error};

/// Parameters for the cache_get tool. Give either `key` or `url`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheGetParams {
    /// SHA-256 cache key of the item.
    #[serde(default)]
    pub key: Option<String>,

    /// Product URL; canonicalized before lookup.
    #[serde(default)]
    pub url: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    /// The cached item.
    pub item: CacheRecord,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(cache: &CacheDb, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let item = match (params.key.as_deref(), params.url.as_deref()) {
        (Some(key), _) => {
            if !is_valid_key(key) {
                return Err(Error::InvalidInput(format!("not a cache key: {key}")).into());
            }
            cache
                .get_item(key)
                .await?
                .ok_or_else(|| Error::CacheMiss(key.to_string()))?
        }
        (None, Some(url)) => {
            let canonical = canonicalize(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
            cache
                .get_item_by_url(canonical.as_str())
                .await?
                .ok_or_else(|| Error::CacheMiss(canonical.to_string()))?
        }
        (None, None) => return Err(Error::InvalidInput("key or url is required".into()).into()),
    };

    let output = CacheGetOutput { item };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize item: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
