//! JSON and text writers for per-paper output files
//!
//! Files are written next to their destination as `<name>.tmp` and renamed
//! into place, so a crash never leaves a half-written `metadata.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

/// Write `value` as pretty JSON (4-space indent) to `path`.
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    buf.push(b'\n');
    write_atomic(path, &buf)
}

/// Write `text` verbatim to `path`.
pub fn save_text(text: &str, path: &Path) -> Result<()> {
    write_atomic(path, text.as_bytes())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| {
        format!("failed to rename {} → {}", tmp.display(), path.display())
    })?;
    log::debug!("Saved {}", path.display());
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn json_is_pretty_and_newline_terminated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metadata.json");
        let mut map = BTreeMap::new();
        map.insert("title", "Ünïcode stays");

        save_json(&map, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\n    \"title\": \"Ünïcode stays\"\n}\n");
        assert!(!dir.path().join("nested/metadata.json.tmp").exists());
    }

    #[test]
    fn text_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("references.bib");
        save_text("old", &path).unwrap();
        save_text("@misc{new}", &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "@misc{new}");
    }
}
