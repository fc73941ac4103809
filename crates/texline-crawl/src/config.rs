//! Crawl runtime configuration

use std::path::PathBuf;
use std::time::Duration;

use texline_arxiv::RetentionSet;
use texline_core::RetryPolicy;

/// Runtime configuration for one crawl
#[derive(Debug, Clone)]
pub struct Config {
    /// Per-paper directories are created here
    pub output_dir: PathBuf,
    /// Where `disk_stats.jsonl` and `ram_stats.jsonl` are appended
    pub stats_dir: PathBuf,
    /// 0 or 1 runs papers sequentially in input order
    pub workers: usize,
    /// Attempts and delay for every arXiv lookup and revision
    pub retry: RetryPolicy,
    /// Sleep after each processed revision
    pub version_delay: Duration,
    /// Sleep between per-revision metadata probes
    pub probe_delay: Duration,
    /// Sleep after each resolved reference
    pub reference_delay: Duration,
    /// Sleep after each finished paper, per worker
    pub paper_delay: Duration,
    pub ram_sample_interval: Duration,
    pub retention: RetentionSet,
    /// Also store the raw arXiv BibTeX as `<paper>/references.bib`
    pub fetch_bibtex: bool,
    pub crawl_references: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./data"),
            stats_dir: PathBuf::from("."),
            workers: 1,
            retry: RetryPolicy::default(),
            version_delay: Duration::from_secs(3),
            probe_delay: Duration::from_millis(500),
            reference_delay: Duration::from_secs(3),
            paper_delay: Duration::from_secs(3),
            ram_sample_interval: Duration::from_millis(500),
            retention: RetentionSet::default(),
            fetch_bibtex: false,
            crawl_references: true,
        }
    }
}

impl Config {
    /// No pacing and no retry delay. For tests and local mirrors.
    pub fn without_delays(mut self) -> Self {
        self.retry.delay = Duration::ZERO;
        self.version_delay = Duration::ZERO;
        self.probe_delay = Duration::ZERO;
        self.reference_delay = Duration::ZERO;
        self.paper_delay = Duration::ZERO;
        self
    }
}
