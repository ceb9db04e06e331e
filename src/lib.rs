//! # Book Acquire
//!
//! Finds books in public catalogs and returns only those with a download URL
//! that was verified to work.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Queries and book records as they move through the pipeline
//! - [`search`]: Multi-strategy pagination with loop detection
//! - [`sources`]: Catalog plugins behind the [`CatalogSource`] trait
//! - [`resolve`]: Per-catalog filename conventions for each format
//! - [`verify`]: Network probes of candidate URLs
//! - [`auth`]: Optional catalog login for gated formats
//! - [`pipeline`]: The caller-facing [`Acquirer`] and result ranking
//! - [`utils`]: HTTP client, retry and request pacing
//! - [`config`]: Configuration management

pub mod auth;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod resolve;
pub mod search;
pub mod sources;
pub mod utils;
pub mod verify;

// Re-export commonly used types
pub use models::{BookRecord, RawQuery};
pub use pipeline::{AcquireError, Acquirer};
pub use sources::{CatalogRegistry, CatalogSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
