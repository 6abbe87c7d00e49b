//! Image backfill over cached items.
//!
//! Copies an image reference found in a record's `raw_metadata` into its
//! `image_url` when that column is still empty. Records are handled one at a
//! time; a record that cannot be read is reported and skipped.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::cache::{CacheDb, CacheRecord};
use crate::metadata::image_reference;

/// Summary of one backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    /// Records whose `image_url` was written by this run.
    pub updated: u64,
    /// Records left untouched, including ones that failed.
    pub skipped: u64,
    /// One line per scanned record.
    pub details: Vec<String>,
    /// Key of the last scanned record when the batch was full. Pass it back
    /// as `after` to continue; `None` means the scan reached the end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

enum Outcome {
    Updated(String),
    Skipped(String),
}

/// Scan up to `batch_limit` records after the `after` cursor and fill missing
/// `image_url` values.
///
/// Re-running after a complete pass updates nothing: filled records are
/// skipped because they now have an image.
///
/// # Errors
///
/// Only a failure to list records (including an unknown cursor) aborts the run.
pub async fn run(db: &CacheDb, batch_limit: usize, after: Option<&str>) -> Result<BackfillReport, Error> {
    let records = db.list_items_after(after, batch_limit).await?;
    let mut report = BackfillReport::default();
    if records.len() == batch_limit {
        report.next_cursor = records.last().map(|r| r.key.clone());
    }

    for record in &records {
        match backfill_one(db, record).await {
            Outcome::Updated(detail) => {
                report.updated += 1;
                report.details.push(detail);
            }
            Outcome::Skipped(detail) => {
                report.skipped += 1;
                report.details.push(detail);
            }
        }
    }

    tracing::info!(
        scanned = records.len(),
        updated = report.updated,
        skipped = report.skipped,
        more = report.next_cursor.is_some(),
        "image backfill finished"
    );

    Ok(report)
}

async fn backfill_one(db: &CacheDb, record: &CacheRecord) -> Outcome {
    if record.image_url.as_deref().is_some_and(|u| !u.is_empty()) {
        return Outcome::Skipped(format!("{}: already has image_url", record.url));
    }

    let image = match image_reference(&record.raw_metadata) {
        Ok(Some(image)) => image,
        Ok(None) => return Outcome::Skipped(format!("{}: no image in raw_metadata", record.url)),
        Err(e) => {
            tracing::warn!(key = %record.key, error = %e, "unreadable raw_metadata, skipping");
            return Outcome::Skipped(format!("{}: unreadable raw_metadata ({e})", record.url));
        }
    };

    match db.fill_image_url(&record.key, &image).await {
        Ok(true) => {
            tracing::debug!(key = %record.key, image = %image, "backfilled image_url");
            Outcome::Updated(format!("{}: image_url set to {image}", record.url))
        }
        Ok(false) => Outcome::Skipped(format!("{}: image_url set concurrently", record.url)),
        Err(e) => {
            tracing::warn!(key = %record.key, error = %e, "failed to write image_url, skipping");
            Outcome::Skipped(format!("{}: write failed ({e})", record.url))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed(db: &CacheDb, url: &str, raw: &str, image_url: Option<&str>) -> CacheRecord {
        let mut record = CacheRecord::new(url, raw.to_string());
        record.name = Some("Item".into());
        record.image_url = image_url.map(str::to_string);
        db.put_item(&record).await.unwrap()
    }

    #[tokio::test]
    async fn test_fills_missing_image_and_nothing_else() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let before = seed(&db, "https://example.com/a", r#"{"image":"https://cdn.example.com/a.jpg"}"#, None).await;

        let report = run(&db, 10, None).await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped, 0);

        let after = db.get_item(&before.key).await.unwrap().unwrap();
        assert_eq!(after.image_url.as_deref(), Some("https://cdn.example.com/a.jpg"));
        assert_eq!(after.raw_metadata, before.raw_metadata);
        assert_eq!(after.name, before.name);
        assert_eq!(after.description, before.description);
        assert_eq!(after.enhanced, before.enhanced);
        assert_eq!(after.hit_count, before.hit_count);
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn test_existing_image_is_noop() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let before = seed(
            &db,
            "https://example.com/a",
            r#"{"image":"https://cdn.example.com/other.jpg"}"#,
            Some("https://cdn.example.com/a.jpg"),
        )
        .await;

        let report = run(&db, 10, None).await.unwrap();
        assert_eq!(report.updated, 0);
        assert_eq!(report.skipped, 1);

        let after = db.get_item(&before.key).await.unwrap().unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        seed(&db, "https://example.com/a", r#"{"image":"https://cdn.example.com/a.jpg"}"#, None).await;
        seed(&db, "https://example.com/b", r#"{"image":"https://cdn.example.com/b.jpg"}"#, None).await;

        assert_eq!(run(&db, 10, None).await.unwrap().updated, 2);

        let second = run(&db, 10, None).await.unwrap();
        assert_eq!(second.updated, 0);
        assert_eq!(second.skipped, 2);
    }

    #[tokio::test]
    async fn test_bad_record_does_not_abort_batch() {
        let db = CacheDb::open_in_memory().await.unwrap();
        seed(&db, "https://example.com/bad", "{not json", None).await;
        seed(&db, "https://example.com/good", r#"{"image":"https://cdn.example.com/g.jpg"}"#, None).await;
        seed(&db, "https://example.com/none", r#"{"title":"no image"}"#, None).await;

        let report = run(&db, 10, None).await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.details.len(), 3);
        assert!(report.details.iter().any(|d| d.contains("unreadable raw_metadata")));
    }

    #[tokio::test]
    async fn test_batch_limit() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for i in 0..4 {
            seed(
                &db,
                &format!("https://example.com/{i}"),
                r#"{"image":"https://cdn.example.com/x.jpg"}"#,
                None,
            )
            .await;
        }

        let report = run(&db, 2, None).await.unwrap();
        assert_eq!(report.updated + report.skipped, 2);
        assert!(report.next_cursor.is_some());
    }

    #[tokio::test]
    async fn test_cursor_reaches_records_past_first_batch() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let rows = [
            ("https://example.com/plain-1", r#"{"title":"no image"}"#, "2024-01-01T00:00:00+00:00"),
            ("https://example.com/plain-2", r#"{"title":"no image"}"#, "2024-01-02T00:00:00+00:00"),
            ("https://example.com/late", r#"{"image":"https://cdn.example.com/late.jpg"}"#, "2024-01-03T00:00:00+00:00"),
        ];
        for (url, raw, created_at) in rows {
            let mut record = CacheRecord::new(url, raw.to_string());
            record.created_at = created_at.to_string();
            db.put_item(&record).await.unwrap();
        }
        let late = CacheRecord::new("https://example.com/late", String::new());

        let first = run(&db, 2, None).await.unwrap();
        assert_eq!(first.updated, 0);
        assert_eq!(first.skipped, 2);
        let cursor = first.next_cursor.expect("full batch returns a cursor");

        let second = run(&db, 2, Some(&cursor)).await.unwrap();
        assert_eq!(second.updated, 1);
        assert_eq!(second.next_cursor, None);

        let stored = db.get_item(&late.key).await.unwrap().unwrap();
        assert_eq!(stored.image_url.as_deref(), Some("https://cdn.example.com/late.jpg"));
    }
}
