//! Text rewriting service errors.

use std::sync::Arc;

use itemmeta_core::Error;

/// Errors from the chat-completions rewriter.
#[derive(Debug, thiserror::Error)]
pub enum EnhanceError {
    /// No API key configured.
    #[error("missing API key: ITEMMETA_ENHANCER_API_KEY not set")]
    MissingApiKey,

    /// Authentication failed (invalid API key).
    #[error("authentication failed: invalid API key")]
    AuthError,

    /// Rate limited by the upstream service.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Reply was not the expected JSON object.
    #[error("parse error: {0}")]
    Parse(String),

    /// Reply had nothing left after the output guard.
    #[error("empty rewrite")]
    EmptyResult,
}

impl From<reqwest::Error> for EnhanceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { EnhanceError::Timeout } else { EnhanceError::Network(Arc::new(err)) }
    }
}

impl From<EnhanceError> for Error {
    fn from(err: EnhanceError) -> Self {
        Error::EnhancementUnavailable(err.to_string())
    }
}
