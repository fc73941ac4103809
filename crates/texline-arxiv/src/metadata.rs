//! Metadata Resolver: title, authors, venue and the revision timeline

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use texline_core::{FetchError, RetryPolicy, is_shutdown_requested};

use crate::client::Repository;
use crate::feed::FeedEntry;
use crate::id::PaperId;

/// Contents of `metadata.json` and of each `references.json` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub title: String,
    pub authors: Vec<String>,
    pub publication_venue: Option<String>,
    /// `None` only when revision 1 could not be probed
    pub submission_date: Option<NaiveDate>,
    pub revised_dates: Vec<NaiveDate>,
}

pub struct MetadataResolver<'a> {
    repo: &'a dyn Repository,
    retry: RetryPolicy,
    /// Sleep between per-revision probes
    probe_delay: Duration,
}

impl<'a> MetadataResolver<'a> {
    pub fn new(repo: &'a dyn Repository, retry: RetryPolicy, probe_delay: Duration) -> Self {
        Self {
            repo,
            retry,
            probe_delay,
        }
    }

    /// Resolve metadata for `paper_id`, or `None` if the paper cannot be found.
    ///
    /// With `fetch_all_versions` every revision is probed for its date;
    /// without it the dates come from the single latest-version record.
    pub fn resolve(&self, paper_id: &PaperId, fetch_all_versions: bool) -> Option<PaperMetadata> {
        let latest = match self.retry.run(
            &format!("metadata {paper_id}"),
            || self.repo.search(paper_id.as_str()),
            FetchError::is_retryable,
        ) {
            Ok(entry) => entry,
            Err(e) if e.is_not_found() => {
                log::warn!("{paper_id}: no metadata: {e}");
                return None;
            }
            Err(e) => {
                log::error!("{paper_id}: metadata lookup failed: {e}");
                return None;
            }
        };

        let (submission_date, revised_dates) = if fetch_all_versions {
            self.probe_timeline(paper_id, latest.max_version())
        } else {
            cheap_timeline(&latest)
        };

        Some(PaperMetadata {
            title: latest.title,
            authors: latest.authors,
            publication_venue: latest.journal_ref,
            submission_date,
            revised_dates,
        })
    }

    /// Probe revisions `1..=max_version` in order. A probe that keeps failing
    /// is skipped.
    fn probe_timeline(&self, paper_id: &PaperId, max_version: u32) -> (Option<NaiveDate>, Vec<NaiveDate>) {
        log::debug!("{paper_id}: probing {max_version} version date(s)");
        let mut updated_dates = Vec::with_capacity(max_version as usize);

        for version in 1..=max_version {
            if is_shutdown_requested() {
                break;
            }
            let versioned_id = paper_id.versioned(version);
            match self.retry.run(
                &format!("metadata {versioned_id}"),
                || self.repo.search(&versioned_id),
                FetchError::is_retryable,
            ) {
                Ok(entry) => updated_dates.push((version, entry.updated.date_naive())),
                Err(e) => log::warn!("{versioned_id}: date probe skipped: {e}"),
            }
            if version < max_version && !self.probe_delay.is_zero() {
                std::thread::sleep(self.probe_delay);
            }
        }

        build_timeline(&updated_dates)
    }
}

/// Revision 1's date is the submission date; later dates that differ from it
/// are revisions, sorted and unique.
fn build_timeline(updated_dates: &[(u32, NaiveDate)]) -> (Option<NaiveDate>, Vec<NaiveDate>) {
    let submission = updated_dates
        .iter()
        .find(|(version, _)| *version == 1)
        .map(|(_, date)| *date);

    let mut revised: Vec<NaiveDate> = updated_dates
        .iter()
        .filter(|(version, date)| *version > 1 && Some(*date) != submission)
        .map(|(_, date)| *date)
        .collect();
    revised.sort_unstable();
    revised.dedup();
    (submission, revised)
}

fn cheap_timeline(entry: &FeedEntry) -> (Option<NaiveDate>, Vec<NaiveDate>) {
    let submitted = entry.published.date_naive();
    let updated = entry.updated.date_naive();
    let revised = if updated != submitted { vec![updated] } else { Vec::new() };
    (Some(submitted), revised)
}
