//! Background RAM sampling scoped to one paper.
//!
//! [`RamSampler::start`] spawns a thread that samples the current process
//! memory at a fixed interval. Dropping or [`finish`](RamSampler::finish)ing
//! the sampler stops the thread and appends exactly one record to
//! `ram_stats.jsonl`, on every exit path of the enclosing task.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;

use crate::stats_log::{RAM_STATS_FILE, StatsLog, unix_timestamp};

/// One memory observation of the current process
#[derive(Debug, Clone, Serialize)]
pub struct RamSample {
    pub timestamp: f64,
    pub pid: u32,
    pub ppid: Option<u32>,
    pub process_name: Option<String>,
    pub rss_bytes: u64,
    pub proc_mem_percent: f64,
    pub system_mem_percent: f64,
}

#[derive(Serialize)]
struct RamRecord<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    paper_id: &'a str,
    sample_interval: f64,
    sample_count: usize,
    samples: &'a [RamSample],
    timestamp: f64,
}

/// Running sampler. Flushes its samples once, when finished or dropped.
pub struct RamSampler {
    paper_id: String,
    interval: Duration,
    log: StatsLog,
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<Vec<RamSample>>>,
}

impl RamSampler {
    pub fn start(log: &StatsLog, paper_id: &str, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread = std::thread::Builder::new()
            .name(format!("ram-{paper_id}"))
            .spawn(move || {
                let mut samples = Vec::new();
                loop {
                    samples.push(collect_sample());
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        // Stop requested or sampler dropped
                        _ => break,
                    }
                }
                samples
            });

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("RAM sampler for {paper_id} not started: {e}");
                None
            }
        };

        Self {
            paper_id: paper_id.to_string(),
            interval,
            log: log.clone(),
            stop: Some(stop_tx),
            thread,
        }
    }

    /// Stop sampling and append the record. Returns the sample count.
    pub fn finish(mut self) -> usize {
        self.stop_and_flush()
    }

    fn stop_and_flush(&mut self) -> usize {
        let Some(stop) = self.stop.take() else {
            return 0;
        };
        let _ = stop.send(());
        let samples = match self.thread.take().map(JoinHandle::join) {
            Some(Ok(samples)) => samples,
            Some(Err(_)) => {
                log::warn!("RAM sampler thread for {} panicked", self.paper_id);
                Vec::new()
            }
            None => Vec::new(),
        };

        let record = RamRecord {
            kind: "ram",
            paper_id: &self.paper_id,
            sample_interval: self.interval.as_secs_f64(),
            sample_count: samples.len(),
            samples: &samples,
            timestamp: unix_timestamp(),
        };
        self.log.append_or_warn(RAM_STATS_FILE, &record);
        samples.len()
    }
}

impl Drop for RamSampler {
    fn drop(&mut self) {
        self.stop_and_flush();
    }
}

fn collect_sample() -> RamSample {
    let status = read_proc("/proc/self/status");
    let meminfo = read_proc("/proc/meminfo");

    let rss_bytes = status
        .as_deref()
        .and_then(|s| proc_field_kb(s, "VmRSS"))
        .map_or(0, |kb| kb * 1024);
    let total_kb = meminfo.as_deref().and_then(|s| proc_field_kb(s, "MemTotal"));
    let available_kb = meminfo
        .as_deref()
        .and_then(|s| proc_field_kb(s, "MemAvailable"));

    let proc_mem_percent = match total_kb {
        Some(total) if total > 0 => rss_bytes as f64 / (total * 1024) as f64 * 100.0,
        _ => 0.0,
    };
    let system_mem_percent = match (total_kb, available_kb) {
        (Some(total), Some(avail)) if total > 0 => {
            total.saturating_sub(avail) as f64 / total as f64 * 100.0
        }
        _ => 0.0,
    };

    RamSample {
        timestamp: unix_timestamp(),
        pid: std::process::id(),
        ppid: status
            .as_deref()
            .and_then(|s| proc_field(s, "PPid"))
            .and_then(|v| v.parse().ok()),
        process_name: status
            .as_deref()
            .and_then(|s| proc_field(s, "Name"))
            .map(str::to_string),
        rss_bytes,
        proc_mem_percent,
        system_mem_percent,
    }
}

/// `/proc` is Linux-only; elsewhere every field degrades to its zero value.
fn read_proc(path: &str) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

/// Value of a `Key:\tvalue` line in a `/proc` file
fn proc_field<'a>(content: &'a str, key: &str) -> Option<&'a str> {
    content.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        (k == key).then(|| v.trim())
    })
}

/// Numeric value of a `Key:   1234 kB` line
fn proc_field_kb(content: &str, key: &str) -> Option<u64> {
    proc_field(content, key)?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Name:\ttexline\nUmask:\t0022\nState:\tR (running)\nPid:\t4242\nPPid:\t1\nVmRSS:\t   20480 kB\n";
    const MEMINFO: &str = "MemTotal:       16384000 kB\nMemFree:         1000000 kB\nMemAvailable:    8192000 kB\n";

    #[test]
    fn parses_status_fields() {
        assert_eq!(proc_field(STATUS, "Name"), Some("texline"));
        assert_eq!(proc_field(STATUS, "PPid"), Some("1"));
        assert_eq!(proc_field_kb(STATUS, "VmRSS"), Some(20480));
        assert_eq!(proc_field(STATUS, "Missing"), None);
    }

    #[test]
    fn parses_meminfo_fields() {
        assert_eq!(proc_field_kb(MEMINFO, "MemTotal"), Some(16_384_000));
        assert_eq!(proc_field_kb(MEMINFO, "MemAvailable"), Some(8_192_000));
    }

    #[test]
    fn key_prefix_does_not_match() {
        // "Pid" must not match the "PPid" line
        assert_eq!(proc_field(STATUS, "Pid"), Some("4242"));
    }

    #[test]
    fn finish_appends_exactly_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let log = StatsLog::new(dir.path()).unwrap();

        let sampler = RamSampler::start(&log, "2411-00222", Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(30));
        let count = sampler.finish();
        assert!(count >= 1);

        let content = std::fs::read_to_string(dir.path().join(RAM_STATS_FILE)).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["type"], "ram");
        assert_eq!(lines[0]["paper_id"], "2411-00222");
        assert_eq!(lines[0]["sample_count"], count);
    }

    #[test]
    fn drop_flushes_on_early_exit() {
        let dir = tempfile::tempdir().unwrap();
        let log = StatsLog::new(dir.path()).unwrap();

        let run = || -> Result<(), &'static str> {
            let _sampler = RamSampler::start(&log, "math-0610595", Duration::from_millis(5));
            Err("versions failed")
        };
        assert!(run().is_err());

        let content = std::fs::read_to_string(dir.path().join(RAM_STATS_FILE)).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("math-0610595"));
    }
}
