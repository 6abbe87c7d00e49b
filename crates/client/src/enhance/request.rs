//! Enhancement inputs and the chat-completions request body.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Raw signal handed to the enhancer. Every field is optional; callers
/// pass what they have.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ItemEnhancementRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Free text typed by the user (manual entry).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input: Option<String>,

    /// What the item is for, e.g. "classroom science kit".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_context: Option<String>,

    /// Brand hint from scraped metadata. Never echoed into output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

impl ItemEnhancementRequest {
    /// True when there is nothing for the rewriter to work from.
    pub fn has_text(&self) -> bool {
        [&self.title, &self.description, &self.user_input]
            .iter()
            .any(|field| field.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

/// Which kind of rewrite is being asked for; selects the instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteMode {
    /// Fresh scrape of a product page.
    Scraped,
    /// User typed the item in by hand.
    Manual,
    /// Re-polish an existing name/description.
    Improve,
}

const SYSTEM_PROMPT: &str = "You write short, neutral catalog entries for items that teachers and parents \
pick for students. Reply with a JSON object {\"name\": string, \"description\": string}. \
The name is a generic product name of at most 80 characters. Never include brand or \
manufacturer names, seller names, or marketing superlatives. Keep concrete specifications \
such as sizes, materials and quantities. The description is one or two plain sentences \
that state the specifications and add one clause on typical use.";

impl RewriteMode {
    fn instruction(self) -> &'static str {
        match self {
            RewriteMode::Scraped => "Rewrite this scraped product listing.",
            RewriteMode::Manual => "Turn this hand-typed item note into a catalog entry.",
            RewriteMode::Improve => "Improve this existing catalog entry without changing what the item is.",
        }
    }
}

/// Chat-completions request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl ChatRequest {
    pub fn build(model: &str, mode: RewriteMode, req: &ItemEnhancementRequest) -> Self {
        let mut user = String::from(mode.instruction());
        let fields = [
            ("Title", &req.title),
            ("Description", &req.description),
            ("Price", &req.price),
            ("User input", &req.user_input),
            ("Context", &req.search_context),
            ("URL", &req.url),
        ];
        for (label, value) in fields {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                user.push_str(&format!("\n{label}: {value}"));
            }
        }

        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT.to_string() },
                ChatMessage { role: "user", content: user },
            ],
            temperature: 0.3,
            response_format: ResponseFormat { kind: "json_object" },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_text() {
        assert!(!ItemEnhancementRequest::default().has_text());
        let req = ItemEnhancementRequest { title: Some("  ".into()), price: Some("5".into()), ..Default::default() };
        assert!(!req.has_text());
        let req = ItemEnhancementRequest { user_input: Some("glue sticks".into()), ..Default::default() };
        assert!(req.has_text());
    }

    #[test]
    fn test_build_skips_empty_fields_and_brand() {
        let req = ItemEnhancementRequest {
            title: Some("SUNLU PLA Filament".into()),
            description: Some("".into()),
            brand: Some("SUNLU".into()),
            ..Default::default()
        };
        let body = ChatRequest::build("gpt-4o-mini", RewriteMode::Scraped, &req);

        assert_eq!(body.messages.len(), 2);
        let user = &body.messages[1].content;
        assert!(user.contains("Title: SUNLU PLA Filament"));
        assert!(!user.contains("Description:"));
        assert!(!user.contains("Brand"));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["model"], "gpt-4o-mini");
    }
}
