//! Unified error types for itemmeta.
//!
//! Every variant renders with a stable upper-case code prefix so callers can
//! tell failure classes apart without matching on the message text.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the itemmeta pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid or unsupported URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Network failure reaching the source URL or an upstream service.
    #[error("FETCH_ERROR: {0}")]
    Fetch(String),

    /// Fetch timeout, including expiry of the overall resolution deadline.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Non-success HTTP status from the source URL.
    #[error("HTTP_ERROR: {0}")]
    HttpStatus(String),

    /// SSRF blocked - private/internal address not allowed.
    #[error("SSRF_BLOCKED: {0}")]
    SsrfBlocked(String),

    /// Robots.txt disallowed access.
    #[error("ROBOTS_DISALLOWED: {0}")]
    RobotsDisallowed(String),

    /// Source document could not be used.
    #[error("PARSE_ERROR: {0}")]
    Parse(String),

    /// Text rewriting service failed or returned an unusable reply.
    #[error("ENHANCEMENT_UNAVAILABLE: {0}")]
    EnhancementUnavailable(String),

    /// Admission denied by the rate limiter.
    #[error("RATE_LIMITED: {0}")]
    RateLimited(String),

    /// No cache record found for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("PERSISTENCE_ERROR: {0}")]
    Persistence(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("PERSISTENCE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Operation disabled in the current environment.
    #[error("FORBIDDEN: {0}")]
    Forbidden(String),
}

impl Error {
    /// Whether a caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Fetch(_) | Error::FetchTimeout(_) | Error::HttpStatus(_) | Error::RateLimited(_)
        )
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Persistence(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Persistence(tokio_rusqlite::Error::Close(c)),
            _ => Error::Persistence(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Persistence(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Persistence(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::Fetch(msg) => (-32008, msg.clone()),
            Error::FetchTimeout(msg) => (-32006, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::HttpStatus(msg) => (-32008, msg.clone()),
            Error::SsrfBlocked(msg) => (-32004, msg.clone()),
            Error::RobotsDisallowed(msg) => (-32005, msg.clone()),
            Error::Parse(msg) => (-32000, msg.clone()),
            Error::EnhancementUnavailable(msg) => (-32009, msg.clone()),
            Error::RateLimited(msg) => (-32010, msg.clone()),
            Error::CacheMiss(msg) => (-32001, msg.clone()),
            Error::Forbidden(msg) => (-32011, msg.clone()),
            Error::Persistence(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
