//! Version Resolver: enumerate every revision of a paper and process its bundle
//!
//! Revisions are handled strictly in ascending order. A revision that cannot
//! be found, downloaded or extracted is logged and skipped; only a failed
//! lookup of the base identifier fails the whole paper.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use indicatif::ProgressBar;
use serde::Serialize;
use texline_core::progress::end_download;
use texline_core::{
    DISK_STATS_FILE, FetchError, RetryPolicy, StatsLog, is_shutdown_requested, unix_timestamp,
};

use crate::archive::{ArchiveError, ArchiveProcessor, ProcessingStats};
use crate::client::Repository;
use crate::feed::FeedEntry;
use crate::id::PaperId;

/// Stats for one successfully processed revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionStats {
    pub version: u32,
    pub version_id: String,
    #[serde(flatten)]
    pub stats: ProcessingStats,
}

/// Outcome of [`VersionResolver::resolve_and_process`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionSummary {
    pub total_versions: u32,
    pub version_stats: Vec<VersionStats>,
    /// Revisions that were skipped after exhausting their attempts
    pub failed_versions: Vec<u32>,
}

impl VersionSummary {
    pub fn total_tar_size_bytes(&self) -> u64 {
        self.version_stats.iter().map(|v| v.stats.tar_size_bytes).sum()
    }

    pub fn total_final_size_bytes(&self) -> u64 {
        self.version_stats.iter().map(|v| v.stats.final_size_bytes).sum()
    }
}

/// One `archive` line in `disk_stats.jsonl`
#[derive(Serialize)]
struct ArchiveEvent<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    paper_id: &'a str,
    timestamp: f64,
    #[serde(flatten)]
    version: &'a VersionStats,
    reduction_percent: f64,
}

/// Failure of a single revision attempt
#[derive(Debug)]
pub enum RevisionError {
    Fetch(FetchError),
    Archive(ArchiveError),
}

impl fmt::Display for RevisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(e) => write!(f, "{e}"),
            Self::Archive(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RevisionError {}

impl From<FetchError> for RevisionError {
    fn from(e: FetchError) -> Self {
        Self::Fetch(e)
    }
}

impl RevisionError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_retryable(),
            Self::Archive(e) => e.is_retryable(),
        }
    }
}

pub struct VersionResolver<'a> {
    repo: &'a dyn Repository,
    processor: &'a ArchiveProcessor,
    stats: &'a StatsLog,
    retry: RetryPolicy,
    /// Sleep after each processed revision
    pacing: Duration,
}

impl<'a> VersionResolver<'a> {
    pub fn new(
        repo: &'a dyn Repository,
        processor: &'a ArchiveProcessor,
        stats: &'a StatsLog,
        retry: RetryPolicy,
        pacing: Duration,
    ) -> Self {
        Self {
            repo,
            processor,
            stats,
            retry,
            pacing,
        }
    }

    /// Download and extract every revision of `paper_id` under `paper_dir`.
    ///
    /// Fails only when the base identifier cannot be resolved. NotFound is
    /// returned without retrying.
    pub fn resolve_and_process(
        &self,
        paper_id: &PaperId,
        paper_dir: &Path,
        pb: &ProgressBar,
    ) -> Result<VersionSummary, FetchError> {
        pb.set_message("resolving versions");
        let latest = self.retry.run(
            &format!("search {paper_id}"),
            || self.repo.search(paper_id.as_str()),
            FetchError::is_retryable,
        )?;

        let max_version = latest.max_version();
        log::info!("{paper_id}: {max_version} version(s)");

        let mut summary = VersionSummary {
            total_versions: max_version,
            ..Default::default()
        };

        for version in 1..=max_version {
            if is_shutdown_requested() {
                log::warn!("{paper_id}: shutdown requested, skipping v{version}..v{max_version}");
                summary.failed_versions.extend(version..=max_version);
                break;
            }

            let versioned_id = paper_id.versioned(version);
            let outcome = self.retry.run(
                &versioned_id,
                || self.process_revision(paper_id, version, max_version, paper_dir, pb),
                RevisionError::is_retryable,
            );

            let processed = match outcome {
                Ok(stats) => {
                    let record = VersionStats {
                        version,
                        version_id: versioned_id,
                        stats,
                    };
                    self.stats.append_or_warn(
                        DISK_STATS_FILE,
                        &ArchiveEvent {
                            kind: "archive",
                            paper_id: &paper_id.folder_key(),
                            timestamp: unix_timestamp(),
                            version: &record,
                            reduction_percent: stats.reduction_percent(),
                        },
                    );
                    summary.version_stats.push(record);
                    true
                }
                Err(RevisionError::Fetch(e)) if e.is_not_found() => {
                    log::error!("{versioned_id}: version not found, skipping");
                    summary.failed_versions.push(version);
                    false
                }
                Err(e) => {
                    log::error!("{versioned_id}: skipped: {e}");
                    summary.failed_versions.push(version);
                    matches!(e, RevisionError::Archive(_))
                }
            };

            if processed && !self.pacing.is_zero() {
                std::thread::sleep(self.pacing);
            }
        }

        Ok(summary)
    }

    /// One attempt at a revision: look it up, download, extract.
    fn process_revision(
        &self,
        paper_id: &PaperId,
        version: u32,
        max_version: u32,
        paper_dir: &Path,
        pb: &ProgressBar,
    ) -> Result<ProcessingStats, RevisionError> {
        let versioned_id = paper_id.versioned(version);
        let stage = |what: &str| pb.set_message(format!("v{version}/{max_version} {what}"));

        stage("searching");
        let entry: FeedEntry = self.repo.search(&versioned_id)?;

        fs::create_dir_all(paper_dir).map_err(FetchError::Io)?;
        let tar_path = paper_dir.join(paper_id.bundle_file_name(version));

        stage("downloading");
        let downloaded = self.repo.download_source(&entry, &versioned_id, &tar_path, pb);
        end_download(pb);
        let bytes = downloaded?;
        log::debug!("{versioned_id}: downloaded {bytes} bytes");

        stage("extracting");
        let output_dir = paper_dir.join("tex").join(paper_id.version_folder(version));
        self.processor
            .process(&tar_path, &output_dir)
            .map_err(RevisionError::Archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_error_retryability() {
        let not_found = RevisionError::Fetch(FetchError::NotFound("x".into()));
        assert!(!not_found.is_retryable());
        let malformed = RevisionError::Fetch(FetchError::Malformed("x".into()));
        assert!(malformed.is_retryable());
        let invalid = RevisionError::Archive(ArchiveError::Invalid("x".into()));
        assert!(!invalid.is_retryable());
    }

    #[test]
    fn summary_totals() {
        let mk = |version, tar, fin| VersionStats {
            version,
            version_id: format!("2411.00222v{version}"),
            stats: ProcessingStats {
                tar_size_bytes: tar,
                final_size_bytes: fin,
                ..Default::default()
            },
        };
        let summary = VersionSummary {
            total_versions: 3,
            version_stats: vec![mk(1, 100, 10), mk(3, 50, 5)],
            failed_versions: vec![2],
        };
        assert_eq!(summary.total_tar_size_bytes(), 150);
        assert_eq!(summary.total_final_size_bytes(), 15);
    }

    #[test]
    fn version_stats_serialize_flat() {
        let v = VersionStats {
            version: 1,
            version_id: "2411.00222v1".into(),
            stats: ProcessingStats {
                tar_size_bytes: 10,
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["version_id"], "2411.00222v1");
        assert_eq!(json["tar_size_bytes"], 10);
        assert!(json.get("stats").is_none());
    }
}
