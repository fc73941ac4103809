//! Texline Core - Common infrastructure for the arXiv source crawler
//!
//! This crate provides the pieces every pipeline stage shares: a blocking
//! HTTP facade, the error taxonomy, bounded retries, logging, progress
//! reporting, shutdown handling and the append-only statistics logs.

pub mod error;
pub mod logging;
pub mod monitor;
pub mod progress;
pub mod retry;
pub mod shutdown;
pub mod stats_log;
pub mod stream;
pub mod work_queue;

// Re-exports for convenience
pub use error::FetchError;
pub use logging::{IndicatifLogger, init_logging};
pub use monitor::RamSampler;
pub use progress::{ProgressContext, fmt_num};
pub use retry::RetryPolicy;
pub use shutdown::{install_signal_handlers, is_shutdown_requested, shutdown_flag};
pub use stats_log::{DISK_STATS_FILE, RAM_STATS_FILE, StatsLog, unix_timestamp};
pub use stream::{HttpClient, HttpConfig, SHARED_RUNTIME, StreamError};
pub use work_queue::WorkQueue;
