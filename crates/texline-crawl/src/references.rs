//! Citation-reference crawl: S2 reference list → `references.json`

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use texline_arxiv::{MetadataResolver, PaperId, PaperMetadata};
use texline_core::is_shutdown_requested;
use texline_scholar::{CitationSource, CitedPaper};

use crate::output::save_json;

pub const REFERENCES_JSON: &str = "references.json";

/// arXiv ids among `references`, version-stripped, without `paper_id` itself
/// and without duplicates. First occurrence wins.
pub fn select_references(paper_id: &PaperId, references: &[CitedPaper]) -> Vec<PaperId> {
    let mut seen = HashSet::new();
    references
        .iter()
        .filter_map(|r| {
            let raw = r.arxiv_id()?;
            match PaperId::parse(raw) {
                Ok(id) => Some(id),
                Err(e) => {
                    log::debug!("{paper_id}: ignoring reference: {e}");
                    None
                }
            }
        })
        .filter(|id| id != paper_id)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Resolve the references of `paper_id` with the cheap metadata path and
/// write `<paper_dir>/references.json`. Returns the number of entries.
///
/// A failed reference lookup is skipped; a failed S2 call writes nothing.
pub fn crawl_references(
    citations: &dyn CitationSource,
    metadata: &MetadataResolver<'_>,
    paper_id: &PaperId,
    paper_dir: &Path,
    delay: Duration,
) -> Result<usize> {
    let raw = citations
        .fetch_references(paper_id.as_str())
        .with_context(|| format!("S2 references for {paper_id}"))?;
    let selected = select_references(paper_id, &raw);
    log::info!(
        "{paper_id}: {} reference(s), {} on arXiv",
        raw.len(),
        selected.len()
    );

    let mut crawled: BTreeMap<String, PaperMetadata> = BTreeMap::new();
    for reference in &selected {
        if is_shutdown_requested() {
            log::warn!("{paper_id}: shutdown requested, stopping reference crawl");
            break;
        }
        match metadata.resolve(reference, false) {
            Some(meta) => {
                crawled.insert(reference.folder_key(), meta);
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
            None => log::warn!("{paper_id}: reference {reference} skipped"),
        }
    }

    save_json(&crawled, &paper_dir.join(REFERENCES_JSON))?;
    Ok(crawled.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use texline_scholar::ExternalIds;

    fn cited(arxiv: Option<&str>) -> CitedPaper {
        CitedPaper {
            paper_id: None,
            title: Some("t".into()),
            external_ids: Some(ExternalIds {
                arxiv: arxiv.map(String::from),
                doi: None,
            }),
        }
    }

    #[test]
    fn selects_strips_and_dedups() {
        let me = PaperId::parse("2411.00222").unwrap();
        let refs = vec![
            cited(Some("1706.03762v5")),
            cited(None),
            cited(Some("2411.00222")),
            cited(Some("2411.00222v2")),
            cited(Some("1706.03762")),
            cited(Some("hep-th/9901001")),
            cited(Some("not an id")),
            CitedPaper::default(),
        ];
        let selected: Vec<String> = select_references(&me, &refs)
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(selected, vec!["1706.03762", "hep-th/9901001"]);
    }

    #[test]
    fn empty_reference_list() {
        let me = PaperId::parse("2411.00222").unwrap();
        assert!(select_references(&me, &[]).is_empty());
    }
}
