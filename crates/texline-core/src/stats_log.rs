//! Append-only JSON-lines statistics log shared by all workers

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;

/// Disk-size events: one per processed archive, one per finished paper
pub const DISK_STATS_FILE: &str = "disk_stats.jsonl";
/// RAM-sampling events: one per paper
pub const RAM_STATS_FILE: &str = "ram_stats.jsonl";

/// Handle to the directory holding the process-wide `.jsonl` logs.
///
/// Every record is serialized first and then written with a single
/// `write_all` on a file opened in append mode, so concurrent workers never
/// interleave partial lines and no lock is needed.
#[derive(Debug, Clone)]
pub struct StatsLog {
    dir: PathBuf,
}

impl StatsLog {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Append one record as a single line.
    pub fn append<T: Serialize>(&self, file: &str, record: &T) -> io::Result<()> {
        let mut line = serde_json::to_vec(record).map_err(io::Error::other)?;
        line.push(b'\n');
        let mut fh = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(file))?;
        fh.write_all(&line)
    }

    /// Append, logging instead of failing. Telemetry never aborts a paper.
    pub fn append_or_warn<T: Serialize>(&self, file: &str, record: &T) {
        if let Err(e) = self.append(file, record) {
            log::warn!("Failed to append to {}: {e}", self.path(file).display());
        }
    }
}

/// Seconds since the Unix epoch, as recorded in every stats event.
pub fn unix_timestamp() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let log = StatsLog::new(dir.path()).unwrap();

        log.append(DISK_STATS_FILE, &serde_json::json!({"paper_id": "2411-00222", "n": 1}))
            .unwrap();
        log.append(DISK_STATS_FILE, &serde_json::json!({"paper_id": "2411-00223", "n": 2}))
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join(DISK_STATS_FILE)).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["paper_id"], "2411-00222");
        assert_eq!(lines[1]["n"], 2);
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("stats").join("nested");
        let log = StatsLog::new(&nested).unwrap();
        log.append(RAM_STATS_FILE, &serde_json::json!({})).unwrap();
        assert!(nested.join(RAM_STATS_FILE).exists());
    }

    #[test]
    fn concurrent_appends_stay_line_delimited() {
        let dir = tempfile::tempdir().unwrap();
        let log = StatsLog::new(dir.path()).unwrap();
        std::thread::scope(|s| {
            for worker in 0..4 {
                let log = &log;
                s.spawn(move || {
                    for i in 0..50 {
                        log.append(
                            DISK_STATS_FILE,
                            &serde_json::json!({"worker": worker, "i": i, "pad": "x".repeat(200)}),
                        )
                        .unwrap();
                    }
                });
            }
        });
        let content = std::fs::read_to_string(dir.path().join(DISK_STATS_FILE)).unwrap();
        let parsed: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(parsed.len(), 200);
    }

    #[test]
    fn timestamp_is_recent() {
        let ts = unix_timestamp();
        assert!(ts > 1_600_000_000.0);
    }
}
