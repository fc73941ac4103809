//! Source bundle extraction, retention filtering and bibliography naming
//!
//! A bundle is extracted into `<output_dir>.tmp`, filtered there, and only
//! then moved over `output_dir`. Whatever the outcome, the bundle and the
//! temp tree are gone when [`ArchiveProcessor::process`] returns.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

/// File name every normalized bibliography ends up with
pub const REFERENCES_BIB: &str = "references.bib";

/// Lowercase file extensions kept after extraction (allow-list)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionSet(BTreeSet<String>);

impl RetentionSet {
    /// Accepts `tex`, `.tex` or `.TEX` alike.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        )
    }

    pub fn retains(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.0.contains(&ext.to_ascii_lowercase()))
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for RetentionSet {
    fn default() -> Self {
        Self::new(["tex", "bib", "json"])
    }
}

/// Byte accounting for one processed bundle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingStats {
    /// Size of the compressed bundle as downloaded
    pub tar_size_bytes: u64,
    /// Extracted tree before filtering
    pub size_before: u64,
    /// Extracted tree after filtering
    pub size_after: u64,
    pub deleted_bytes: u64,
    /// Final tree after the move and bibliography rename
    pub final_size_bytes: u64,
}

impl ProcessingStats {
    /// Bundle size vs. what stays on disk, in percent (negative if it grew)
    pub fn reduction_percent(&self) -> f64 {
        if self.tar_size_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.final_size_bytes as f64 / self.tar_size_bytes as f64) * 100.0
    }
}

#[derive(Debug)]
pub enum ArchiveError {
    /// Not a gzip-compressed tar, or an empty one
    Invalid(String),
    /// The archive opened but could not be unpacked
    Extract(io::Error),
    /// Filesystem failure around the extracted tree
    Io(io::Error),
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(msg) => write!(f, "not a valid source archive: {msg}"),
            Self::Extract(e) => write!(f, "extraction failed: {e}"),
            Self::Io(e) => write!(f, "IO: {e}"),
        }
    }
}

impl std::error::Error for ArchiveError {}

impl From<io::Error> for ArchiveError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl ArchiveError {
    /// A bad archive stays bad; only local filesystem hiccups are worth a
    /// fresh download.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Invalid(_) | Self::Extract(_) => false,
            Self::Io(e) => e.kind() != io::ErrorKind::StorageFull,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveProcessor {
    retention: RetentionSet,
}

impl ArchiveProcessor {
    pub fn new(retention: RetentionSet) -> Self {
        Self { retention }
    }

    /// Extract `tar_path` into `output_dir`, replacing anything already there.
    pub fn process(&self, tar_path: &Path, output_dir: &Path) -> Result<ProcessingStats, ArchiveError> {
        let tmp_dir = temp_sibling(output_dir);
        let result = self.process_inner(tar_path, output_dir, &tmp_dir);

        remove_dir_quietly(&tmp_dir);
        if tar_path.exists() {
            if let Err(e) = fs::remove_file(tar_path) {
                log::warn!("Could not remove {}: {e}", tar_path.display());
            }
        }

        match &result {
            Ok(stats) => log::debug!(
                "{}: {} -> {} bytes ({} filtered)",
                output_dir.display(),
                stats.tar_size_bytes,
                stats.final_size_bytes,
                stats.deleted_bytes
            ),
            Err(e) => log::warn!("{}: {e}", tar_path.display()),
        }
        result
    }

    fn process_inner(
        &self,
        tar_path: &Path,
        output_dir: &Path,
        tmp_dir: &Path,
    ) -> Result<ProcessingStats, ArchiveError> {
        let tar_size_bytes = fs::metadata(tar_path)?.len();
        verify_archive(tar_path)?;

        remove_dir_quietly(tmp_dir);
        fs::create_dir_all(tmp_dir)?;
        open_archive(tar_path)?
            .unpack(tmp_dir)
            .map_err(ArchiveError::Extract)?;

        let size_before = tree_size(tmp_dir);
        self.filter_tree(tmp_dir);
        let size_after = tree_size(tmp_dir);

        if output_dir.exists() {
            fs::remove_dir_all(output_dir)?;
        }
        if let Some(parent) = output_dir.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(tmp_dir, output_dir)?;

        normalize_bibliography(output_dir)?;

        Ok(ProcessingStats {
            tar_size_bytes,
            size_before,
            size_after,
            deleted_bytes: size_before.saturating_sub(size_after),
            final_size_bytes: tree_size(output_dir),
        })
    }

    /// Delete every file outside the retention set, and every symlink.
    /// Failures are skipped.
    fn filter_tree(&self, dir: &Path) {
        for entry in walk_entries(dir) {
            let path = entry.path();
            if entry.file_type().is_file() && self.retention.retains(path) {
                continue;
            }
            if entry.path_is_symlink() {
                log::debug!("Dropping symlink {}", path.display());
            }
            if let Err(e) = fs::remove_file(path) {
                log::warn!("Could not remove {}: {e}", path.display());
            }
        }
    }
}

fn open_archive(tar_path: &Path) -> io::Result<tar::Archive<GzDecoder<BufReader<File>>>> {
    let file = File::open(tar_path)?;
    Ok(tar::Archive::new(GzDecoder::new(BufReader::new(file))))
}

/// Gzip stream must decode and carry at least one readable tar header.
fn verify_archive(tar_path: &Path) -> Result<(), ArchiveError> {
    let mut archive = open_archive(tar_path)?;
    let mut entries = archive
        .entries()
        .map_err(|e| ArchiveError::Invalid(e.to_string()))?;
    let verdict = match entries.next() {
        Some(Ok(_)) => Ok(()),
        Some(Err(e)) => Err(ArchiveError::Invalid(e.to_string())),
        None => Err(ArchiveError::Invalid("archive is empty".to_string())),
    };
    verdict
}

/// Rename the first `.bib` (any case, sorted path order) to
/// `<dir>/references.bib`. Other `.bib` files are left alone.
fn normalize_bibliography(dir: &Path) -> io::Result<()> {
    let target = dir.join(REFERENCES_BIB);
    let Some(first) = walk_entries(dir)
        .into_iter()
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
        .find(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("bib")))
    else {
        return Ok(());
    };
    if first == target {
        return Ok(());
    }
    if target.exists() {
        fs::remove_file(&target)?;
    }
    log::debug!("Renaming {} to {REFERENCES_BIB}", first.display());
    fs::rename(&first, &target)
}

/// `<output_dir>.tmp`, next to the final directory
fn temp_sibling(output_dir: &Path) -> PathBuf {
    let mut name = output_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    output_dir.with_file_name(name)
}

fn remove_dir_quietly(dir: &Path) {
    if dir.exists() {
        if let Err(e) = fs::remove_dir_all(dir) {
            log::warn!("Could not remove {}: {e}", dir.display());
        }
    }
}

/// Everything under `dir` except directories, in sorted path order.
/// Symlinks are listed but never followed.
fn walk_entries(dir: &Path) -> Vec<DirEntry> {
    WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::debug!("Skipping {}: {e}", dir.display());
                None
            }
        })
        .filter(|entry| !entry.file_type().is_dir())
        .collect()
}

/// Total byte size of the regular files under `dir` (0 if missing)
pub fn tree_size(dir: &Path) -> u64 {
    walk_entries(dir)
        .iter()
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
