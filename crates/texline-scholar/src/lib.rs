//! Texline Scholar - Semantic Scholar citation lookups
//!
//! Fetches the reference list of an arXiv paper from the Semantic Scholar
//! Graph API. Only the fields the crawler needs are requested.

pub mod api;
pub mod schema;

// Re-exports
pub use api::{CitationSource, ScholarClient, ScholarConfig};
pub use schema::{CitedPaper, ExternalIds};
