//! Per-paper task: versions, metadata, bibliography, references, stats
//!
//! [`Crawler::process_paper`] never fails and never panics outward: every
//! error, including a panic inside the pipeline, becomes a failed
//! [`PaperResult`] so one paper cannot abort a batch.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use serde::Serialize;
use texline_arxiv::{
    ArchiveProcessor, MetadataResolver, PaperId, Repository, VersionResolver, VersionStats,
    tree_size,
};
use texline_core::{
    DISK_STATS_FILE, FetchError, RamSampler, StatsLog, is_shutdown_requested, unix_timestamp,
};
use texline_scholar::CitationSource;

use crate::config::Config;
use crate::output::{save_json, save_text};
use crate::references::crawl_references;

pub const METADATA_JSON: &str = "metadata.json";
/// Raw arXiv BibTeX, next to `metadata.json`
pub const BIBTEX_FILE: &str = "references.bib";

/// Outcome of one paper
#[derive(Debug, Clone, Serialize)]
pub struct PaperResult {
    pub paper_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub disk: Option<PaperDiskStats>,
}

impl PaperResult {
    fn failed(paper_id: &str, error: String) -> Self {
        Self {
            paper_id: paper_id.to_string(),
            success: false,
            error: Some(error),
            disk: None,
        }
    }
}

/// Paper-level `disk` line in `disk_stats.jsonl`
#[derive(Debug, Clone, Default, Serialize)]
pub struct PaperDiskStats {
    pub total_versions: u32,
    pub processed_versions: usize,
    pub failed_versions: Vec<u32>,
    pub total_tar_size_bytes: u64,
    pub total_processed_size_bytes: u64,
    pub paper_directory_size_bytes: u64,
    pub references: Option<usize>,
    pub version_details: Vec<VersionStats>,
}

#[derive(Serialize)]
struct DiskEvent<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    paper_id: &'a str,
    timestamp: f64,
    #[serde(flatten)]
    stats: &'a PaperDiskStats,
}

/// Everything a worker needs to process papers. Shared by reference
/// across the pool.
pub struct Crawler<'a> {
    repo: &'a dyn Repository,
    citations: &'a dyn CitationSource,
    stats: StatsLog,
    processor: ArchiveProcessor,
    config: &'a Config,
}

impl<'a> Crawler<'a> {
    pub fn new(
        repo: &'a dyn Repository,
        citations: &'a dyn CitationSource,
        config: &'a Config,
    ) -> Result<Self> {
        let stats = StatsLog::new(&config.stats_dir).with_context(|| {
            format!("Cannot create stats directory {}", config.stats_dir.display())
        })?;
        std::fs::create_dir_all(&config.output_dir).with_context(|| {
            format!("Cannot create output directory {}", config.output_dir.display())
        })?;
        Ok(Self {
            repo,
            citations,
            stats,
            processor: ArchiveProcessor::new(config.retention.clone()),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    /// Run the whole pipeline for `raw_id`, catching errors and panics.
    pub fn process_paper(&self, raw_id: &str, pb: &ProgressBar) -> PaperResult {
        log::info!("Processing paper {raw_id}");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_paper(raw_id, pb)));

        match outcome {
            Ok(Ok(disk)) => {
                log::info!(
                    "Completed {raw_id}: {}/{} version(s), {} bytes on disk",
                    disk.processed_versions,
                    disk.total_versions,
                    disk.paper_directory_size_bytes
                );
                PaperResult {
                    paper_id: raw_id.to_string(),
                    success: true,
                    error: None,
                    disk: Some(disk),
                }
            }
            Ok(Err(e)) => {
                log::error!("{raw_id}: {e:#}");
                PaperResult::failed(raw_id, format!("{e:#}"))
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                log::error!("{raw_id}: task panicked: {msg}");
                PaperResult::failed(raw_id, format!("panic: {msg}"))
            }
        }
    }

    fn run_paper(&self, raw_id: &str, pb: &ProgressBar) -> Result<PaperDiskStats> {
        let paper_id = PaperId::parse(raw_id)?;
        let folder_key = paper_id.folder_key();
        let paper_dir = self.config.output_dir.join(&folder_key);
        std::fs::create_dir_all(&paper_dir)
            .with_context(|| format!("Cannot create {}", paper_dir.display()))?;

        // Flushes one RAM record however this function exits
        let sampler = RamSampler::start(&self.stats, &folder_key, self.config.ram_sample_interval);

        let versions = VersionResolver::new(
            self.repo,
            &self.processor,
            &self.stats,
            self.config.retry,
            self.config.version_delay,
        )
        .resolve_and_process(&paper_id, &paper_dir, pb)
        .context("downloading versions")?;

        let metadata = MetadataResolver::new(self.repo, self.config.retry, self.config.probe_delay);

        pb.set_message("metadata");
        match metadata.resolve(&paper_id, true) {
            Some(meta) => save_json(&meta, &paper_dir.join(METADATA_JSON))?,
            None => log::warn!("{paper_id}: no metadata.json written"),
        }

        if self.config.fetch_bibtex {
            pb.set_message("bibtex");
            if let Err(e) = self.save_bibtex(&paper_id, &paper_dir) {
                log::warn!("{paper_id}: BibTeX skipped: {e:#}");
            }
        }

        let mut references = None;
        if self.config.crawl_references && !is_shutdown_requested() {
            pb.set_message("references");
            match crawl_references(
                self.citations,
                &metadata,
                &paper_id,
                &paper_dir,
                self.config.reference_delay,
            ) {
                Ok(n) => references = Some(n),
                Err(e) => log::error!("{paper_id}: references skipped: {e:#}"),
            }
        }

        sampler.finish();

        let disk = PaperDiskStats {
            total_versions: versions.total_versions,
            processed_versions: versions.version_stats.len(),
            total_tar_size_bytes: versions.total_tar_size_bytes(),
            total_processed_size_bytes: versions.total_final_size_bytes(),
            paper_directory_size_bytes: tree_size(&paper_dir),
            references,
            failed_versions: versions.failed_versions,
            version_details: versions.version_stats,
        };
        self.stats.append_or_warn(
            DISK_STATS_FILE,
            &DiskEvent {
                kind: "disk",
                paper_id: &folder_key,
                timestamp: unix_timestamp(),
                stats: &disk,
            },
        );

        if !self.config.paper_delay.is_zero() && !is_shutdown_requested() {
            std::thread::sleep(self.config.paper_delay);
        }
        Ok(disk)
    }

    fn save_bibtex(&self, paper_id: &PaperId, paper_dir: &Path) -> Result<()> {
        let text = self.config.retry.run(
            &format!("bibtex {paper_id}"),
            || self.repo.fetch_bibtex(paper_id.as_str()),
            FetchError::is_retryable,
        )?;
        save_text(&text, &paper_dir.join(BIBTEX_FILE))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
