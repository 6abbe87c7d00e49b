//! Item record operations.
//!
//! One row per canonical product URL. Writers other than [`CacheDb::put_item`]
//! touch only the columns they name, each in a single UPDATE, so a hit counter
//! bump and an image backfill racing on the same row never undo each other.

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use crate::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, params_from_iter, types::Value};

const COLUMNS: &str = "key, url, raw_metadata, name, description, image_url, price, \
                       enhanced, hit_count, created_at, updated_at";

/// A cached, display-ready item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    /// SHA-256 of the canonical URL.
    pub key: String,
    pub url: String,
    /// Scraped metadata as JSON, kept verbatim for fallbacks and backfill.
    pub raw_metadata: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<String>,
    /// Whether `name`/`description` came out of the text enhancer.
    pub enhanced: bool,
    pub hit_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl CacheRecord {
    /// A fresh record for `canonical_url` with no hits yet.
    pub fn new(canonical_url: &str, raw_metadata: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            key: compute_cache_key(canonical_url),
            url: canonical_url.to_string(),
            raw_metadata,
            name: None,
            description: None,
            image_url: None,
            price: None,
            enhanced: false,
            hit_count: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            url: row.get(1)?,
            raw_metadata: row.get(2)?,
            name: row.get(3)?,
            description: row.get(4)?,
            image_url: row.get(5)?,
            price: row.get(6)?,
            enhanced: row.get::<_, i64>(7)? != 0,
            hit_count: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

/// Field-level update. `None` means "leave the column alone".
///
/// `raw_metadata` is not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<String>,
    pub enhanced: Option<bool>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        *self == ItemPatch::default()
    }

    fn into_assignments(self) -> Vec<(&'static str, Value)> {
        let mut out = Vec::new();
        if let Some(name) = self.name {
            out.push(("name", Value::Text(name)));
        }
        if let Some(description) = self.description {
            out.push(("description", Value::Text(description)));
        }
        if let Some(image_url) = self.image_url {
            out.push(("image_url", Value::Text(image_url)));
        }
        if let Some(price) = self.price {
            out.push(("price", Value::Text(price)));
        }
        if let Some(enhanced) = self.enhanced {
            out.push(("enhanced", Value::Integer(enhanced as i64)));
        }
        out
    }
}

fn select_item(conn: &rusqlite::Connection, key: &str) -> rusqlite::Result<Option<CacheRecord>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM items WHERE key = ?1"),
        params![key],
        CacheRecord::from_row,
    )
    .optional()
}

impl CacheDb {
    /// Insert or replace an item, returning the row as stored.
    ///
    /// On conflict the stored `hit_count` never goes down, an existing
    /// `image_url`/`price` survives a record that lacks one, and `created_at`
    /// keeps its original value.
    pub async fn put_item(&self, record: &CacheRecord) -> Result<CacheRecord, Error> {
        let record = record.clone();
        self.conn
            .call(move |conn| -> Result<CacheRecord, Error> {
                conn.execute(
                    &format!(
                        "INSERT INTO items ({COLUMNS})
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                        ON CONFLICT(key) DO UPDATE SET
                            url = excluded.url,
                            raw_metadata = excluded.raw_metadata,
                            name = excluded.name,
                            description = excluded.description,
                            image_url = COALESCE(excluded.image_url, items.image_url),
                            price = COALESCE(excluded.price, items.price),
                            enhanced = excluded.enhanced,
                            hit_count = MAX(items.hit_count, excluded.hit_count),
                            updated_at = excluded.updated_at"
                    ),
                    params![
                        &record.key,
                        &record.url,
                        &record.raw_metadata,
                        &record.name,
                        &record.description,
                        &record.image_url,
                        &record.price,
                        record.enhanced as i64,
                        record.hit_count,
                        &record.created_at,
                        &record.updated_at,
                    ],
                )?;

                select_item(conn, &record.key)?
                    .ok_or_else(|| Error::CacheMiss(format!("{} vanished after write", record.key)))
            })
            .await
            .map_err(Error::from)
    }

    /// Get an item by key.
    pub async fn get_item(&self, key: &str) -> Result<Option<CacheRecord>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheRecord>, Error> { Ok(select_item(conn, &key)?) })
            .await
            .map_err(Error::from)
    }

    /// Get an item by its canonical URL.
    pub async fn get_item_by_url(&self, canonical_url: &str) -> Result<Option<CacheRecord>, Error> {
        self.get_item(&compute_cache_key(canonical_url)).await
    }

    /// Update only the columns present in `patch`.
    ///
    /// Returns the updated row, or `None` when no row has this key. An empty
    /// patch writes nothing and just reads the row back.
    pub async fn patch_item(&self, key: &str, patch: ItemPatch) -> Result<Option<CacheRecord>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheRecord>, Error> {
                let assignments = patch.into_assignments();
                if assignments.is_empty() {
                    return Ok(select_item(conn, &key)?);
                }

                let set_clause = assignments
                    .iter()
                    .enumerate()
                    .map(|(i, (column, _))| format!("{column} = ?{}", i + 1))
                    .collect::<Vec<_>>()
                    .join(", ");
                let n = assignments.len();
                let sql = format!("UPDATE items SET {set_clause}, updated_at = ?{} WHERE key = ?{}", n + 1, n + 2);

                let mut values: Vec<Value> = assignments.into_iter().map(|(_, v)| v).collect();
                values.push(Value::Text(chrono::Utc::now().to_rfc3339()));
                values.push(Value::Text(key.clone()));

                let changed = conn.execute(&sql, params_from_iter(values))?;
                if changed == 0 {
                    return Ok(None);
                }
                Ok(select_item(conn, &key)?)
            })
            .await
            .map_err(Error::from)
    }

    /// Increment the hit counter and return the row as stored afterwards.
    pub async fn record_hit(&self, key: &str) -> Result<Option<CacheRecord>, Error> {
        let key = key.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<Option<CacheRecord>, Error> {
                let changed = conn.execute(
                    "UPDATE items SET hit_count = hit_count + 1, updated_at = ?1 WHERE key = ?2",
                    params![now, key],
                )?;
                if changed == 0 {
                    return Ok(None);
                }
                Ok(select_item(conn, &key)?)
            })
            .await
            .map_err(Error::from)
    }

    /// Set `image_url` only if it is still empty.
    ///
    /// Returns true when this call wrote the value.
    pub async fn fill_image_url(&self, key: &str, image_url: &str) -> Result<bool, Error> {
        let key = key.to_string();
        let image_url = image_url.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let changed = conn.execute(
                    "UPDATE items SET image_url = ?1, updated_at = ?2
                     WHERE key = ?3 AND (image_url IS NULL OR image_url = '')",
                    params![image_url, now, key],
                )?;
                Ok(changed > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// List up to `limit` items, oldest first.
    pub async fn list_items(&self, limit: usize) -> Result<Vec<CacheRecord>, Error> {
        self.list_items_after(None, limit).await
    }

    /// List up to `limit` items ordered by `(created_at, key)`, starting after
    /// the row whose key is `after`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when `after` names a key that is not in the table.
    pub async fn list_items_after(&self, after: Option<&str>, limit: usize) -> Result<Vec<CacheRecord>, Error> {
        let after = after.map(str::to_string);
        let limit = limit as i64;
        self.conn
            .call(move |conn| -> Result<Vec<CacheRecord>, Error> {
                let (created_at, key) = match after {
                    Some(key) => {
                        let created_at: Option<String> = conn
                            .query_row("SELECT created_at FROM items WHERE key = ?1", params![key], |row| row.get(0))
                            .optional()?;
                        let created_at =
                            created_at.ok_or_else(|| Error::InvalidInput(format!("unknown cursor: {key}")))?;
                        (created_at, key)
                    }
                    None => (String::new(), String::new()),
                };

                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM items
                     WHERE created_at > ?1 OR (created_at = ?1 AND key > ?2)
                     ORDER BY created_at ASC, key ASC LIMIT ?3"
                ))?;
                let rows = stmt.query_map(params![created_at, key, limit], CacheRecord::from_row)?;
                let mut items = Vec::new();
                for row in rows {
                    items.push(row?);
                }
                Ok(items)
            })
            .await
            .map_err(Error::from)
    }
}
