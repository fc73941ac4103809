//! arXiv identifiers and their on-disk folder keys
//!
//! Two shapes are accepted:
//! - modern: `YYMM.NNNN` / `YYMM.NNNNN` (e.g. `2411.00222`)
//! - legacy: `category/NNNNNNN`, optionally with a subject class
//!   (e.g. `math/0610595`, `math.AG/0601001`, `hep-th/9901001`)

use std::fmt;

/// A base (unversioned) arXiv identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaperId(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidId(pub String);

impl fmt::Display for InvalidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not an arXiv identifier: {:?}", self.0)
    }
}

impl std::error::Error for InvalidId {}

impl PaperId {
    /// Parse an identifier, dropping surrounding whitespace and any `vN` suffix.
    pub fn parse(raw: &str) -> Result<Self, InvalidId> {
        let trimmed = raw.trim();
        let (base, _) = split_version(trimmed);
        if is_modern(base) || is_legacy(base) {
            Ok(Self(base.to_string()))
        } else {
            Err(InvalidId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_legacy(&self) -> bool {
        self.0.contains('/')
    }

    /// Filesystem-safe key: `2411.00222` → `2411-00222`, `math/0610595` → `math-0610595`.
    ///
    /// Modern keys are all digits before the hyphen while legacy keys start
    /// with a letter, so the two shapes never collide.
    pub fn folder_key(&self) -> String {
        match self.0.split_once('/') {
            Some((category, number)) => format!("{category}-{number}"),
            None => self.0.replacen('.', "-", 1),
        }
    }

    /// `<id>v<N>`, the identifier of one revision
    pub fn versioned(&self, version: u32) -> String {
        format!("{}v{version}", self.0)
    }

    /// Directory name of one extracted revision: `<FolderKey>v<N>`
    pub fn version_folder(&self, version: u32) -> String {
        format!("{}v{version}", self.folder_key())
    }

    /// File name for a downloaded bundle. Legacy ids keep their category
    /// but lose the slash so the file stays inside the paper directory.
    pub fn bundle_file_name(&self, version: u32) -> String {
        format!("{}.tar.gz", self.versioned(version).replace('/', "-"))
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PaperId {
    type Err = InvalidId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Split a trailing `v<digits>` suffix: `2411.00222v3` → (`2411.00222`, Some(3)).
pub fn split_version(s: &str) -> (&str, Option<u32>) {
    if let Some(pos) = s.rfind('v') {
        let digits = &s[pos + 1..];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(v) = digits.parse() {
                return (&s[..pos], Some(v));
            }
        }
    }
    (s, None)
}

/// Revision number carried by an identifier or entry URL
/// (`http://arxiv.org/abs/2411.00222v2` → 2), if any.
pub fn parse_version_suffix(s: &str) -> Option<u32> {
    split_version(s.trim()).1
}

fn is_modern(s: &str) -> bool {
    let Some((yymm, number)) = s.split_once('.') else {
        return false;
    };
    yymm.len() == 4
        && yymm.bytes().all(|b| b.is_ascii_digit())
        && (4..=5).contains(&number.len())
        && number.bytes().all(|b| b.is_ascii_digit())
}

fn is_legacy(s: &str) -> bool {
    let Some((category, number)) = s.split_once('/') else {
        return false;
    };
    let (archive, subject) = match category.split_once('.') {
        Some((a, sub)) => (a, Some(sub)),
        None => (category, None),
    };
    let archive_ok = archive
        .bytes()
        .next()
        .is_some_and(|b| b.is_ascii_lowercase())
        && archive
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b == b'-');
    let subject_ok = subject.map_or(true, |sub| {
        !sub.is_empty() && sub.bytes().all(|b| b.is_ascii_alphabetic() || b == b'-')
    });
    archive_ok && subject_ok && number.len() == 7 && number.bytes().all(|b| b.is_ascii_digit())
}

/// Enumerate `<prefix>.<NNNNN>` for every number in `start..=end`.
pub fn generate_id_range(prefix: &str, start: u32, end: u32) -> Vec<String> {
    (start..=end).map(|i| format!("{prefix}.{i:05}")).collect()
}
