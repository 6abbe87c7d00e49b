//! Raw page metadata captured by the scraper.
//!
//! The cache stores this as an opaque JSON blob next to the display fields.
//! Older records may hold blobs written by earlier versions, so readers go
//! through [`image_reference`] rather than assuming the current shape.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata extracted from a product page, before any rewriting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RawMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Canonical page URL as declared by the page itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Publish date as written by the page (not normalized).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

impl RawMetadata {
    /// True when nothing at all was extracted.
    pub fn is_empty(&self) -> bool {
        *self == RawMetadata::default()
    }

    /// Serialize for storage in the `raw_metadata` column.
    pub fn to_json(&self) -> String {
        // A struct of optional strings always serializes.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Price with its currency code when both are known, e.g. "19.99 USD".
    pub fn display_price(&self) -> Option<String> {
        match (&self.price, &self.currency) {
            (Some(price), Some(currency)) => Some(format!("{price} {currency}")),
            (Some(price), None) => Some(price.clone()),
            _ => None,
        }
    }
}

/// Find an image URL inside a stored raw metadata blob.
///
/// Accepts `image` as a plain string, as an object with a `url` field, or as
/// an array whose first usable entry wins. Legacy `imageUrl`/`image_url` keys
/// are consulted last. Only absolute http(s) URLs count.
///
/// # Errors
///
/// Returns the JSON error when the blob is not valid JSON.
pub fn image_reference(raw_json: &str) -> Result<Option<String>, serde_json::Error> {
    let value: Value = serde_json::from_str(raw_json)?;

    let found = ["image", "imageUrl", "image_url"]
        .iter()
        .filter_map(|field| value.get(field))
        .find_map(image_from_value);

    Ok(found)
}

fn image_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (s.starts_with("https://") || s.starts_with("http://")).then(|| s.to_string())
        }
        Value::Object(map) => map.get("url").and_then(image_from_value),
        Value::Array(items) => items.iter().find_map(image_from_value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_skips_absent_fields() {
        let raw = RawMetadata { title: Some("Filament".into()), ..Default::default() };
        assert_eq!(raw.to_json(), r#"{"title":"Filament"}"#);
    }

    #[test]
    fn test_is_empty() {
        assert!(RawMetadata::default().is_empty());
        assert!(!RawMetadata { brand: Some("Acme".into()), ..Default::default() }.is_empty());
    }

    #[test]
    fn test_display_price() {
        let raw = RawMetadata { price: Some("19.99".into()), currency: Some("USD".into()), ..Default::default() };
        assert_eq!(raw.display_price().as_deref(), Some("19.99 USD"));
        assert_eq!(RawMetadata::default().display_price(), None);
    }

    #[test]
    fn test_image_reference_string() {
        let found = image_reference(r#"{"title":"x","image":"https://cdn.example.com/a.jpg"}"#).unwrap();
        assert_eq!(found.as_deref(), Some("https://cdn.example.com/a.jpg"));
    }

    #[test]
    fn test_image_reference_nested_shapes() {
        let found = image_reference(r#"{"image":{"url":"https://cdn.example.com/b.jpg"}}"#).unwrap();
        assert_eq!(found.as_deref(), Some("https://cdn.example.com/b.jpg"));

        let found = image_reference(r#"{"image":["", "https://cdn.example.com/c.jpg"]}"#).unwrap();
        assert_eq!(found.as_deref(), Some("https://cdn.example.com/c.jpg"));

        let found = image_reference(r#"{"imageUrl":"https://cdn.example.com/d.jpg"}"#).unwrap();
        assert_eq!(found.as_deref(), Some("https://cdn.example.com/d.jpg"));
    }

    #[test]
    fn test_image_reference_rejects_relative_and_missing() {
        assert_eq!(image_reference(r#"{"image":"/img/a.jpg"}"#).unwrap(), None);
        assert_eq!(image_reference(r#"{"title":"no image"}"#).unwrap(), None);
    }

    #[test]
    fn test_image_reference_invalid_json() {
        assert!(image_reference("{not json").is_err());
    }
}
