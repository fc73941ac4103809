//! Texline Crawl - per-paper pipeline and task runner
//!
//! Composes the arXiv resolvers and the Semantic Scholar client into the
//! per-paper task, and runs that task over a list of identifiers either
//! sequentially or on a worker pool.

pub mod config;
pub mod output;
pub mod references;
pub mod runner;
pub mod summary;
pub mod task;

// Re-exports
pub use config::Config;
pub use runner::run;
pub use summary::Summary;
pub use task::{Crawler, PaperDiskStats, PaperResult};
