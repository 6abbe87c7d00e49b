//! Resolution pipeline: URL in, cached display-ready record out.
//!
//! ```text
//! CACHE_LOOKUP ── hit ──> record hit ─> (lazy enhance / image fill) ─> RESPOND
//!      │
//!      └─ miss ─> per-key lock ─> re-check ─> SCRAPE ─> IMAGE ∥ ENHANCE ─> PERSIST ─> RESPOND
//! ```
//!
//! Scrape failures end the request. Image and enhancement failures do not:
//! the record is stored with whatever survived and `enhanced = false`.
//! Every response is built from the row as stored.

pub mod inflight;

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::enhance::{ItemEnhancementRequest, TextEnhancer};
use crate::fetch::canonicalize;
use crate::image::ImageLocator;
use crate::scrape::MetadataSource;
use inflight::KeyedLocks;
use itemmeta_core::cache::hash::compute_cache_key;
use itemmeta_core::metadata::image_reference;
use itemmeta_core::{AppConfig, CacheDb, CacheRecord, Error, ItemPatch, RawMetadata};

const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(60);

/// A resolved record and whether it came from the cache.
#[derive(Debug, Clone, Serialize)]
pub struct ResolveOutcome {
    pub record: CacheRecord,
    pub cache_hit: bool,
}

fn enhancement_request(raw: &RawMetadata, url: &str, search_context: Option<&str>) -> ItemEnhancementRequest {
    ItemEnhancementRequest {
        url: Some(url.to_string()),
        title: raw.title.clone(),
        description: raw.description.clone(),
        price: raw.display_price(),
        image: raw.image.clone(),
        user_input: None,
        search_context: search_context.map(str::to_string),
        brand: raw.brand.clone(),
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

/// Orchestrates cache, scraper, image resolver and text enhancer.
pub struct Resolver {
    db: CacheDb,
    scraper: Arc<dyn MetadataSource>,
    images: Arc<dyn ImageLocator>,
    enhancer: TextEnhancer,
    inflight: KeyedLocks,
    timeout: Duration,
}

impl Resolver {
    pub fn new(
        db: CacheDb, scraper: Arc<dyn MetadataSource>, images: Arc<dyn ImageLocator>, enhancer: TextEnhancer,
    ) -> Self {
        Self { db, scraper, images, enhancer, inflight: KeyedLocks::new(), timeout: DEFAULT_RESOLVE_TIMEOUT }
    }

    /// Overall deadline for one resolution.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Apply `resolve_timeout_ms` from the application config.
    pub fn configured(self, config: &AppConfig) -> Self {
        let timeout = config.resolve_timeout();
        self.with_timeout(timeout)
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn enhancer(&self) -> &TextEnhancer {
        &self.enhancer
    }

    /// Resolve `url` to a cached record.
    ///
    /// `search_context` is passed to the enhancer on a miss or a lazy
    /// re-enhancement. A deadline overrun is reported as `FetchTimeout`;
    /// cache writes already started still complete.
    pub async fn resolve(&self, url: &str, search_context: Option<&str>) -> Result<ResolveOutcome, Error> {
        let canonical = canonicalize(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        match tokio::time::timeout(self.timeout, self.resolve_canonical(&canonical, search_context)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(url = %canonical, timeout_ms = self.timeout.as_millis() as u64, "resolution timed out");
                Err(Error::FetchTimeout(format!(
                    "resolving {} took longer than {}ms",
                    canonical,
                    self.timeout.as_millis()
                )))
            }
        }
    }

    async fn resolve_canonical(&self, url: &Url, search_context: Option<&str>) -> Result<ResolveOutcome, Error> {
        let key = compute_cache_key(url.as_str());

        if let Some(record) = self.db.get_item(&key).await? {
            return self.serve_hit(record, search_context).await;
        }

        let _guard = self.inflight.lock(&key).await;

        // Another request may have filled the row while this one waited.
        if let Some(record) = self.db.get_item(&key).await? {
            tracing::debug!(url = %url, "coalesced with in-flight resolution");
            return self.serve_hit(record, search_context).await;
        }

        tracing::debug!(url = %url, in_flight = self.inflight.in_flight(), "cache miss");
        self.resolve_miss(url, search_context).await
    }

    async fn serve_hit(&self, record: CacheRecord, search_context: Option<&str>) -> Result<ResolveOutcome, Error> {
        let key = record.key.clone();
        let mut record = self
            .db
            .record_hit(&key)
            .await?
            .ok_or_else(|| Error::CacheMiss(format!("{key} removed during lookup")))?;

        let mut patch = ItemPatch::default();

        if !record.enhanced {
            match serde_json::from_str::<RawMetadata>(&record.raw_metadata) {
                Ok(raw) => {
                    let req = enhancement_request(&raw, &record.url, search_context);
                    let enhancement = self.enhancer.enhance_scraped(&req).await;
                    if enhancement.enhanced {
                        patch.name = Some(enhancement.name);
                        patch.description = Some(enhancement.description);
                        patch.enhanced = Some(true);
                    }
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "unreadable raw metadata, skipping re-enhancement"),
            }
        }

        let mut image_filled = false;
        if record.image_url.as_deref().is_none_or(|u| u.trim().is_empty())
            && let Ok(Some(image)) = image_reference(&record.raw_metadata)
        {
            image_filled = self.db.fill_image_url(&key, &image).await?;
        }

        if !patch.is_empty() {
            if let Some(updated) = self.db.patch_item(&key, patch).await? {
                record = updated;
            }
        } else if image_filled && let Some(updated) = self.db.get_item(&key).await? {
            record = updated;
        }

        tracing::info!(
            url = %record.url,
            hit_count = record.hit_count,
            enhanced = record.enhanced,
            "cache hit"
        );

        Ok(ResolveOutcome { record, cache_hit: true })
    }

    async fn resolve_miss(&self, url: &Url, search_context: Option<&str>) -> Result<ResolveOutcome, Error> {
        let page = self.scraper.scrape(url).await?;
        let raw = page.metadata;
        let req = enhancement_request(&raw, url.as_str(), search_context);

        let (resolved_image, enhancement) = tokio::join!(
            self.images.locate(&page.final_url, Some(page.html.as_str())),
            self.enhancer.enhance_scraped(&req),
        );

        let image_url = resolved_image.or_else(|| raw.image.clone());

        let mut record = CacheRecord::new(url.as_str(), raw.to_json());
        record.name = non_empty(enhancement.name);
        record.description = non_empty(enhancement.description);
        record.image_url = image_url;
        record.price = raw.display_price();
        record.enhanced = enhancement.enhanced;

        let stored = self.db.put_item(&record).await?;

        tracing::info!(
            url = %stored.url,
            enhanced = stored.enhanced,
            image = stored.image_url.is_some(),
            "resolved and cached"
        );

        Ok(ResolveOutcome { record: stored, cache_hit: false })
    }
}
