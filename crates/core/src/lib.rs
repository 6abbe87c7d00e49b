//! Core types and shared functionality for itemmeta.
//!
//! This crate provides:
//! - Item cache with SQLite backend
//! - Raw page metadata model
//! - Image backfill over stored records
//! - Per-client rate limiting
//! - Unified error types
//! - Configuration structures

pub mod backfill;
pub mod cache;
pub mod config;
pub mod error;
pub mod metadata;
pub mod ratelimit;

pub use backfill::BackfillReport;
pub use cache::{CacheDb, CacheRecord, ItemPatch};
pub use config::AppConfig;
pub use error::Error;
pub use metadata::RawMetadata;
pub use ratelimit::{Admission, CounterStore, InMemoryCounterStore, RateLimiter};
