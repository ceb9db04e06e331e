//! Core data models for book queries and catalog results.

mod book;
mod query;

pub use book::{BookRecord, CandidateRecord, ResolvedArtifact};
pub use query::{Query, QueryError, RawQuery};
