//! Chat-completions response types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::EnhanceError;

/// Raw response from the chat-completions endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// The `{name, description}` object the model is asked to produce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RewrittenText {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl ChatResponse {
    /// Parse the first choice's content as a [`RewrittenText`].
    pub fn rewritten(&self) -> Result<RewrittenText, EnhanceError> {
        let content = self
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| EnhanceError::Parse("response has no content".to_string()))?;

        serde_json::from_str(strip_code_fence(content)).map_err(|e| EnhanceError::Parse(e.to_string()))
    }
}

/// Models occasionally wrap JSON in a markdown fence despite the response format.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Final enhancer output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Enhancement {
    pub name: String,
    pub description: String,
    /// False when the fallback text was used.
    pub enhanced: bool,
}
