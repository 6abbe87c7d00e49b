//! MCP tool implementations.
//!
//! This module contains all tools exposed by the itemmeta server.

pub mod backfill;
pub mod cache;
pub mod enhance;
pub mod rate_limit;
pub mod resolve;

pub use backfill::CacheBackfillParams;
pub use cache::CacheGetParams;
pub use enhance::{EnhanceManualParams, ImproveItemParams};
pub use rate_limit::RateLimitResetParams;
pub use resolve::ResolveUrlParams;

/// Rate-limit identity used when a caller does not name itself.
pub const DEFAULT_CLIENT_ID: &str = "local";

pub(crate) fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

/// Blank ids fall back to [`DEFAULT_CLIENT_ID`].
pub(crate) fn client_id(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.is_empty() { DEFAULT_CLIENT_ID } else { trimmed }
}
