//! Product image resolution.
//!
//! Strategies run left to right; the first one that yields a probed image URL
//! wins. Absence is a normal outcome and is never an error.

pub mod strategies;

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use crate::fetch::FetchClient;
pub use strategies::{
    EmbeddedPatternStrategy, ImageContext, ImageStrategy, ProductIdStrategy, decode_unicode_escapes, product_id,
};

/// Lightweight existence check for a candidate image.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    /// True only for a successful response with an `image/*` content type.
    async fn is_image(&self, url: &str) -> bool;
}

/// Source of full page bodies for strategies that scan markup.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn page_body(&self, url: &Url) -> Option<String>;
}

#[async_trait]
impl ImageProbe for FetchClient {
    async fn is_image(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        match self.head(&url).await {
            Ok(head) => {
                head.status.is_success()
                    && head
                        .content_type
                        .as_deref()
                        .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "image probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl PageSource for FetchClient {
    async fn page_body(&self, url: &Url) -> Option<String> {
        match self.fetch(url.as_str()).await {
            Ok(response) => Some(response.text()),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "page fetch for image scan failed");
                None
            }
        }
    }
}

/// What the resolution pipeline needs from an image resolver.
#[async_trait]
pub trait ImageLocator: Send + Sync {
    /// Find a usable image for `page_url`. `html` is the already-fetched body,
    /// when the caller has one.
    async fn locate(&self, page_url: &Url, html: Option<&str>) -> Option<String>;
}

/// Ordered chain of [`ImageStrategy`] steps.
pub struct ImageResolver {
    strategies: Vec<Box<dyn ImageStrategy>>,
    probe: Arc<dyn ImageProbe>,
    pages: Arc<dyn PageSource>,
}

impl ImageResolver {
    /// Resolver with the standard chain: product identifier, then embedded patterns.
    pub fn new(probe: Arc<dyn ImageProbe>, pages: Arc<dyn PageSource>) -> Self {
        Self::with_strategies(probe, pages, vec![Box::new(ProductIdStrategy), Box::new(EmbeddedPatternStrategy)])
    }

    pub fn with_strategies(
        probe: Arc<dyn ImageProbe>, pages: Arc<dyn PageSource>, strategies: Vec<Box<dyn ImageStrategy>>,
    ) -> Self {
        Self { strategies, probe, pages }
    }

    /// Shorthand for a resolver whose probes and page fetches go through `fetcher`.
    pub fn from_fetcher(fetcher: Arc<FetchClient>) -> Self {
        Self::new(fetcher.clone(), fetcher)
    }

    pub async fn resolve(&self, page_url: &Url, html: Option<&str>) -> Option<String> {
        let ctx = ImageContext { page_url, html, probe: self.probe.as_ref(), pages: self.pages.as_ref() };

        for strategy in &self.strategies {
            if let Some(image) = strategy.attempt(&ctx).await {
                tracing::debug!(url = %page_url, strategy = strategy.name(), image = %image, "image resolved");
                return Some(image);
            }
        }

        tracing::debug!(url = %page_url, "no image strategy produced a result");
        None
    }
}

#[async_trait]
impl ImageLocator for ImageResolver {
    async fn locate(&self, page_url: &Url, html: Option<&str>) -> Option<String> {
        self.resolve(page_url, html).await
    }
}
