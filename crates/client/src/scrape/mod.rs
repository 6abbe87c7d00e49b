//! Page scraping: fetch a product page and read its raw metadata.

pub mod jsonld;
pub mod rules;

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use crate::fetch::FetchClient;
use itemmeta_core::{Error, RawMetadata};

pub use rules::extract_metadata;

/// A fetched and parsed page.
#[derive(Debug, Clone)]
pub struct ScrapedPage {
    /// Where the fetch ended up after redirects.
    pub final_url: Url,
    pub metadata: RawMetadata,
    /// Raw document, kept for the image fallbacks that search markup.
    pub html: String,
}

/// Anything that can turn a canonical URL into raw metadata.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn scrape(&self, url: &Url) -> Result<ScrapedPage, Error>;
}

fn is_html(content_type: Option<&str>) -> bool {
    match content_type {
        // Servers that omit the header are given the benefit of the doubt.
        None => true,
        Some(ct) => {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml") || ct.contains("text/plain")
        }
    }
}

/// Scraper over the shared [`FetchClient`].
pub struct MetadataScraper {
    fetcher: Arc<FetchClient>,
}

impl MetadataScraper {
    pub fn new(fetcher: Arc<FetchClient>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl MetadataSource for MetadataScraper {
    async fn scrape(&self, url: &Url) -> Result<ScrapedPage, Error> {
        let response = self.fetcher.fetch(url.as_str()).await?;

        if !is_html(response.content_type.as_deref()) {
            return Err(Error::Parse(format!(
                "unsupported content type {} for {}",
                response.content_type.as_deref().unwrap_or("unknown"),
                response.final_url
            )));
        }

        let html = response.text();
        if html.trim().is_empty() {
            return Err(Error::Parse(format!("empty document at {}", response.final_url)));
        }

        let metadata = extract_metadata(&html, &response.final_url);
        tracing::debug!(
            url = %response.final_url,
            title = metadata.title.is_some(),
            image = metadata.image.is_some(),
            price = metadata.price.is_some(),
            "scraped page metadata"
        );

        Ok(ScrapedPage { final_url: response.final_url, metadata, html })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_html() {
        assert!(is_html(Some("text/html; charset=utf-8")));
        assert!(is_html(Some("Application/XHTML+xml")));
        assert!(is_html(None));
        assert!(!is_html(Some("application/pdf")));
        assert!(!is_html(Some("image/jpeg")));
    }
}
