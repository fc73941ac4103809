//! Texline arXiv - identifiers, query API client and source bundle processing
//!
//! The two resolvers are the heart of the crawler:
//! [`VersionResolver`] walks every revision of a paper and hands each bundle
//! to the [`ArchiveProcessor`]; [`MetadataResolver`] builds the metadata
//! record and its revision timeline.

pub mod archive;
pub mod client;
pub mod feed;
pub mod id;
pub mod metadata;
pub mod versions;

// Re-exports
pub use archive::{ArchiveError, ArchiveProcessor, ProcessingStats, REFERENCES_BIB, RetentionSet, tree_size};
pub use client::{ArxivClient, ArxivConfig, Repository};
pub use feed::FeedEntry;
pub use id::{InvalidId, PaperId, generate_id_range};
pub use metadata::{MetadataResolver, PaperMetadata};
pub use versions::{RevisionError, VersionResolver, VersionStats, VersionSummary};
