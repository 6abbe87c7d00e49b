//! Network-facing half of itemmeta.
//!
//! Fetching with SSRF protection, page metadata scraping, product image
//! resolution, text enhancement, and the resolution pipeline that ties them
//! to the cache in `itemmeta-core`.

pub mod enhance;
pub mod fetch;
pub mod image;
pub mod resolve;
pub mod scrape;

pub use enhance::{Enhancement, ItemEnhancementRequest, TextEnhancer, TextRewriter};
pub use fetch::{FetchClient, FetchConfig, FetchResponse};
pub use image::{ImageLocator, ImageResolver};
pub use resolve::{ResolveOutcome, Resolver};
pub use scrape::{MetadataScraper, MetadataSource, ScrapedPage, extract_metadata};
