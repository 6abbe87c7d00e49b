//! Image lookup strategies, evaluated in order by the resolver.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use super::{ImageProbe, PageSource};

/// Everything a strategy may consult.
pub struct ImageContext<'a> {
    pub page_url: &'a Url,
    /// Body already fetched by the scraper, if any.
    pub html: Option<&'a str>,
    pub probe: &'a dyn ImageProbe,
    pub pages: &'a dyn PageSource,
}

/// One step in the image chain. Returns a probed, usable image URL or `None`.
#[async_trait]
pub trait ImageStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, ctx: &ImageContext<'_>) -> Option<String>;
}

static PRODUCT_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"/dp/([A-Z0-9]{10})(?:[/?#]|$)",
        r"/gp/product/([A-Z0-9]{10})(?:[/?#]|$)",
        r"/gp/aw/d/([A-Z0-9]{10})(?:[/?#]|$)",
        r"/product/([A-Z0-9]{10})(?:[/?#]|$)",
        r"/ASIN/([A-Z0-9]{10})(?:[/?#]|$)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// The 10-character product identifier embedded in a marketplace URL path.
pub fn product_id(url: &Url) -> Option<String> {
    let path = url.path();
    PRODUCT_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(path))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Direct image URLs following the marketplace's naming conventions.
pub fn product_id_candidates(id: &str) -> Vec<String> {
    vec![
        format!("https://m.media-amazon.com/images/P/{id}.01._SCLZZZZZZZ_.jpg"),
        format!("https://images-na.ssl-images-amazon.com/images/P/{id}.01.L.jpg"),
        format!("https://images-na.ssl-images-amazon.com/images/P/{id}.01._SX500_.jpg"),
    ]
}

/// Build candidates from the product identifier and probe each in turn.
pub struct ProductIdStrategy;

#[async_trait]
impl ImageStrategy for ProductIdStrategy {
    fn name(&self) -> &'static str {
        "product_id"
    }

    async fn attempt(&self, ctx: &ImageContext<'_>) -> Option<String> {
        let id = product_id(ctx.page_url)?;
        for candidate in product_id_candidates(&id) {
            if ctx.probe.is_image(&candidate).await {
                return Some(candidate);
            }
            tracing::debug!(candidate = %candidate, "image candidate rejected");
        }
        None
    }
}

static EMBEDDED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""large"\s*:\s*"(https?:[^"]+)""#,
        r#""hiRes"\s*:\s*"(https?:[^"]+)""#,
        r#"data-old-hires\s*=\s*"(https?:[^"]+)""#,
        r#"<img[^>]+id\s*=\s*"landingImage"[^>]+src\s*=\s*"(https?:[^"]+)""#,
        r#"<img[^>]+src\s*=\s*"(https?:[^"]+)"[^>]+id\s*=\s*"landingImage""#,
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static UNICODE_ESCAPE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\\u([0-9a-fA-F]{4})").ok());

/// Replace `\uXXXX` sequences with the characters they encode.
///
/// Invalid code points (lone surrogates) are left as written.
pub fn decode_unicode_escapes(raw: &str) -> String {
    let Some(re) = UNICODE_ESCAPE.as_ref() else {
        return raw.to_string();
    };
    re.replace_all(raw, |caps: &regex::Captures<'_>| {
        u32::from_str_radix(&caps[1], 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

/// Every embedded image reference in `html`, in pattern order.
pub fn embedded_candidates(html: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for re in EMBEDDED_PATTERNS.iter() {
        for caps in re.captures_iter(html) {
            let url = decode_unicode_escapes(&caps[1]).replace("\\/", "/");
            if !out.contains(&url) {
                out.push(url);
            }
        }
    }
    out
}

/// Scan the page body for embedded image fields and probe what they name.
pub struct EmbeddedPatternStrategy;

#[async_trait]
impl ImageStrategy for EmbeddedPatternStrategy {
    fn name(&self) -> &'static str {
        "embedded_pattern"
    }

    async fn attempt(&self, ctx: &ImageContext<'_>) -> Option<String> {
        let fetched;
        let html = match ctx.html {
            Some(html) => html,
            None => {
                fetched = ctx.pages.page_body(ctx.page_url).await?;
                fetched.as_str()
            }
        };

        for candidate in embedded_candidates(html) {
            if ctx.probe.is_image(&candidate).await {
                return Some(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_patterns() {
        let cases = [
            ("https://www.amazon.com/SUNLU-Filament/dp/B07PGY2JP1/ref=sr_1_3", Some("B07PGY2JP1")),
            ("https://www.amazon.com/gp/product/B08XYZ1234?th=1", Some("B08XYZ1234")),
            ("https://www.amazon.com/exec/obidos/ASIN/0131103628", Some("0131103628")),
            ("https://www.amazon.com/dp/b07pgy2jp1", None),
            ("https://shop.example.com/item/12345", None),
        ];
        for (url, expected) in cases {
            let url = Url::parse(url).unwrap();
            assert_eq!(product_id(&url).as_deref(), expected, "{url}");
        }
    }

    #[test]
    fn test_candidates_order() {
        let candidates = product_id_candidates("B07PGY2JP1");
        assert_eq!(candidates.len(), 3);
        assert!(candidates[0].starts_with("https://m.media-amazon.com/images/P/B07PGY2JP1"));
        assert!(candidates[1].ends_with(".01.L.jpg"));
    }

    #[test]
    fn test_decode_unicode_escapes() {
        assert_eq!(
            decode_unicode_escapes(r"https://img.example.com/a\u002Db.jpg"),
            "https://img.example.com/a-b.jpg"
        );
        assert_eq!(decode_unicode_escapes(r"\uD800x"), r"\uD800x");
        assert_eq!(decode_unicode_escapes("plain"), "plain");
    }

    #[test]
    fn test_embedded_candidates_in_pattern_order() {
        let html = r#"
            <img id="landingImage" src="https://img.example.com/landing.jpg" alt="">
            <div data-old-hires="https://img.example.com/old.jpg"></div>
            <script>var data = {"hiRes":"https:\/\/img.example.com\/hi-res.jpg","large":"https://img.example.com/large.jpg"};</script>
        "#;
        let candidates = embedded_candidates(html);
        assert_eq!(
            candidates,
            vec![
                "https://img.example.com/large.jpg".to_string(),
                "https://img.example.com/hi-res.jpg".to_string(),
                "https://img.example.com/old.jpg".to_string(),
                "https://img.example.com/landing.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn test_embedded_candidates_none() {
        assert!(embedded_candidates("<html><body><p>No images</p></body></html>").is_empty());
    }
}
