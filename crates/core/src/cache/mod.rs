//! SQLite-backed store for resolved item records.
//!
//! - One row per canonical URL, keyed by its SHA-256 hash
//! - Automatic schema migrations
//! - WAL mode for concurrent readers
//! - Field-scoped updates for enhancement, hit counting and image backfill

pub mod connection;
pub mod hash;
pub mod items;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use items::{CacheRecord, ItemPatch};
