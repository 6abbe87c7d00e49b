//! Per-field extraction rules, tried in priority order.
//!
//! Structured tags (Open Graph, Twitter cards, JSON-LD, microdata) come before
//! anything inferred from visible markup. Each field is an ordered table, so a
//! new source is one more row.

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

use super::jsonld;
use itemmeta_core::RawMetadata;

/// One way of reading a field from a document.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// Attribute of the first matching element with a non-empty value.
    Attr(&'static str, &'static str),
    /// Text content of the first matching element with non-empty text.
    Text(&'static str),
    /// Path inside the JSON-LD nodes, product nodes first.
    JsonLd(&'static [&'static str]),
}

pub const TITLE: &[Rule] = &[
    Rule::Attr("meta[property='og:title']", "content"),
    Rule::Attr("meta[name='twitter:title'], meta[property='twitter:title']", "content"),
    Rule::JsonLd(&["name"]),
    Rule::Text("#productTitle"),
    Rule::Attr("meta[name='title']", "content"),
    Rule::Text("title"),
    Rule::Text("h1"),
];

pub const DESCRIPTION: &[Rule] = &[
    Rule::Attr("meta[property='og:description']", "content"),
    Rule::Attr("meta[name='twitter:description'], meta[property='twitter:description']", "content"),
    Rule::Attr("meta[name='description']", "content"),
    Rule::JsonLd(&["description"]),
    Rule::Attr("meta[itemprop='description']", "content"),
    Rule::Text("#feature-bullets li"),
    Rule::Text("[itemprop='description']"),
];

pub const IMAGE: &[Rule] = &[
    Rule::Attr("meta[property='og:image:secure_url']", "content"),
    Rule::Attr("meta[property='og:image']", "content"),
    Rule::Attr("meta[name='twitter:image'], meta[name='twitter:image:src']", "content"),
    Rule::JsonLd(&["image"]),
    Rule::Attr("link[rel='image_src']", "href"),
    Rule::Attr("#landingImage", "data-old-hires"),
    Rule::Attr("img[itemprop='image']", "src"),
];

pub const CANONICAL_URL: &[Rule] = &[
    Rule::Attr("meta[property='og:url']", "content"),
    Rule::Attr("link[rel='canonical']", "href"),
    Rule::JsonLd(&["url"]),
];

pub const AUTHOR: &[Rule] = &[
    Rule::Attr("meta[name='author']", "content"),
    Rule::Attr("meta[property='article:author']", "content"),
    Rule::JsonLd(&["author"]),
    Rule::Text("[itemprop='author'] [itemprop='name']"),
    Rule::Text("[itemprop='author']"),
    Rule::Text("[rel='author']"),
];

pub const DATE: &[Rule] = &[
    Rule::Attr("meta[property='article:published_time']", "content"),
    Rule::Attr("meta[name='date'], meta[name='pubdate']", "content"),
    Rule::Attr("meta[itemprop='datePublished']", "content"),
    Rule::JsonLd(&["datePublished"]),
    Rule::JsonLd(&["releaseDate"]),
    Rule::Attr("time[datetime]", "datetime"),
];

pub const LOGO: &[Rule] = &[
    Rule::JsonLd(&["publisher", "logo"]),
    Rule::Attr("link[rel='apple-touch-icon']", "href"),
    Rule::Attr("link[rel='icon']", "href"),
    Rule::Attr("link[rel='shortcut icon']", "href"),
];

pub const PUBLISHER: &[Rule] = &[
    Rule::Attr("meta[property='og:site_name']", "content"),
    Rule::Attr("meta[name='application-name']", "content"),
    Rule::JsonLd(&["publisher", "name"]),
];

pub const PRICE: &[Rule] = &[
    Rule::Attr("meta[property='product:price:amount']", "content"),
    Rule::Attr("meta[property='og:price:amount']", "content"),
    Rule::Attr("meta[itemprop='price'], [itemprop='price'][content]", "content"),
    Rule::JsonLd(&["offers", "price"]),
    Rule::JsonLd(&["offers", "lowPrice"]),
    Rule::Text(".a-price .a-offscreen"),
];

pub const CURRENCY: &[Rule] = &[
    Rule::Attr("meta[property='product:price:currency']", "content"),
    Rule::Attr("meta[property='og:price:currency']", "content"),
    Rule::Attr("meta[itemprop='priceCurrency']", "content"),
    Rule::JsonLd(&["offers", "priceCurrency"]),
];

pub const BRAND: &[Rule] = &[
    Rule::Attr("meta[property='product:brand']", "content"),
    Rule::Attr("meta[property='og:brand']", "content"),
    Rule::Attr("meta[itemprop='brand']", "content"),
    Rule::JsonLd(&["brand"]),
    Rule::Text("[itemprop='brand'] [itemprop='name']"),
    Rule::Text("#bylineInfo"),
];

/// Collapse runs of whitespace and trim; empty strings become `None`.
pub fn clean_text(raw: &str) -> Option<String> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!cleaned.is_empty()).then_some(cleaned)
}

fn element_text(el: ElementRef<'_>) -> Option<String> {
    clean_text(&el.text().collect::<String>())
}

impl Rule {
    fn apply(&self, doc: &Html, ld_nodes: &[Value]) -> Option<String> {
        match self {
            Rule::Attr(selector, attr) => {
                let selector = Selector::parse(selector).ok()?;
                doc.select(&selector)
                    .filter_map(|el| el.value().attr(attr))
                    .find_map(clean_text)
            }
            Rule::Text(selector) => {
                let selector = Selector::parse(selector).ok()?;
                doc.select(&selector).find_map(element_text)
            }
            Rule::JsonLd(path) => ld_nodes
                .iter()
                .filter_map(|node| jsonld::lookup(node, path))
                .filter_map(jsonld::value_text)
                .find_map(|text| clean_text(&text)),
        }
    }
}

/// First non-empty value produced by `rules`, in order.
pub fn first_match(doc: &Html, ld_nodes: &[Value], rules: &[Rule]) -> Option<String> {
    rules.iter().find_map(|rule| rule.apply(doc, ld_nodes))
}

fn absolutize(base: &Url, href: Option<String>) -> Option<String> {
    let href = href?;
    let resolved = base.join(&href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Remove a site name glued to either end of a title ("Shop: X", "X | Shop").
fn strip_site_name(title: String, site: Option<&str>) -> String {
    let Some(site) = site.filter(|s| !s.is_empty()) else {
        return title;
    };

    for sep in [" | ", " - ", " – ", " : ", ": "] {
        if let Some(rest) = title.strip_prefix(&format!("{site}{sep}")) {
            return rest.trim().to_string();
        }
        if let Some(rest) = title.strip_suffix(&format!("{sep}{site}")) {
            return rest.trim().to_string();
        }
    }
    title
}

/// "Visit the Acme Store" / "Brand: Acme" -> "Acme".
fn clean_brand(brand: String) -> Option<String> {
    let trimmed = brand
        .trim_start_matches("Visit the ")
        .trim_start_matches("Brand: ")
        .trim_end_matches(" Store")
        .trim();
    clean_text(trimmed)
}

/// Extract raw metadata from an HTML document fetched from `base_url`.
///
/// Never fails: any field may come back empty. Relative image, logo and
/// canonical URLs are resolved against `base_url`; the logo falls back to
/// `/favicon.ico`.
pub fn extract_metadata(html: &str, base_url: &Url) -> RawMetadata {
    let doc = Html::parse_document(html);
    let ld = jsonld::collect_nodes(&doc);
    let get = |rules: &[Rule]| first_match(&doc, &ld, rules);

    let publisher = get(PUBLISHER);
    let title = get(TITLE).map(|t| strip_site_name(t, publisher.as_deref()));
    let logo = absolutize(base_url, get(LOGO)).or_else(|| absolutize(base_url, Some("/favicon.ico".to_string())));

    RawMetadata {
        title,
        description: get(DESCRIPTION),
        image: absolutize(base_url, get(IMAGE)),
        url: absolutize(base_url, get(CANONICAL_URL)).or_else(|| Some(base_url.to_string())),
        author: get(AUTHOR),
        date: get(DATE),
        logo,
        publisher,
        price: get(PRICE).map(|p| p.trim_start_matches(['$', '€', '£']).to_string()),
        currency: get(CURRENCY),
        brand: get(BRAND).and_then(clean_brand),
    }
}
