//! cache_backfill tool implementation.
//!
//! Fills missing `image_url` values from the image stored in each record's
//! raw metadata. Safe to re-run.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use itemmeta_core::{CacheDb, Error, backfill};

/// Input parameters for cache_backfill tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheBackfillParams {
    /// Maximum records to scan (default: `backfill_batch_size` from config).
    #[serde(default)]
    pub batch_limit: Option<usize>,

    /// Resume after this cache key (the `next_cursor` of a previous run).
    #[serde(default)]
    pub after: Option<String>,
}

/// Implementation of the cache_backfill tool.
pub async fn backfill_impl(
    db: &CacheDb, default_batch: usize, params: CacheBackfillParams,
) -> Result<CallToolResult, McpError> {
    let batch_limit = params.batch_limit.unwrap_or(default_batch);
    if batch_limit == 0 {
        return Err(Error::InvalidInput("batch_limit must be greater than 0".into()).into());
    }

    let report = backfill::run(db, batch_limit, params.after.as_deref()).await?;

    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize report: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::result_json;
    use itemmeta_core::{BackfillReport, CacheRecord};

    #[tokio::test]
    async fn test_backfill_fills_then_noops() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let legacy = CacheRecord::new(
            "https://shop.example.com/item/9",
            r#"{"title":"Ruler","image":"https://cdn.example.com/ruler.jpg"}"#.into(),
        );
        db.put_item(&legacy).await.unwrap();

        let first: BackfillReport =
            result_json(&backfill_impl(&db, 100, CacheBackfillParams::default()).await.unwrap());
        assert_eq!(first.updated, 1);

        let second: BackfillReport =
            result_json(&backfill_impl(&db, 100, CacheBackfillParams::default()).await.unwrap());
        assert_eq!(second.updated, 0);
        assert_eq!(second.skipped, 1);

        let stored = db.get_item(&legacy.key).await.unwrap().unwrap();
        assert_eq!(stored.image_url.as_deref(), Some("https://cdn.example.com/ruler.jpg"));
    }

    #[tokio::test]
    async fn test_backfill_zero_limit_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let params = CacheBackfillParams { batch_limit: Some(0), after: None };
        assert!(backfill_impl(&db, 100, params).await.is_err());
    }

    #[tokio::test]
    async fn test_backfill_continues_from_cursor() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for i in 0..3 {
            let record = CacheRecord::new(
                &format!("https://shop.example.com/item/{i}"),
                format!(r#"{{"image":"https://cdn.example.com/{i}.jpg"}}"#),
            );
            db.put_item(&record).await.unwrap();
        }

        let params = CacheBackfillParams { batch_limit: Some(2), after: None };
        let first: BackfillReport = result_json(&backfill_impl(&db, 100, params).await.unwrap());
        assert_eq!(first.updated, 2);
        assert!(first.next_cursor.is_some());

        let params = CacheBackfillParams { batch_limit: Some(2), after: first.next_cursor };
        let second: BackfillReport = result_json(&backfill_impl(&db, 100, params).await.unwrap());
        assert_eq!(second.updated, 1);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_backfill_unknown_cursor_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let params = CacheBackfillParams { batch_limit: None, after: Some("0".repeat(64)) };
        let err = backfill_impl(&db, 100, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
