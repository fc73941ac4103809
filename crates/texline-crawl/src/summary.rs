//! End-of-run summary: comfy-table in TTY mode, log lines otherwise

use std::time::Duration;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use texline_core::fmt_num;

use crate::task::PaperResult;

#[derive(Debug, Default)]
pub struct Summary {
    /// Identifiers requested
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Never started because of a shutdown request
    pub not_started: usize,
    pub versions_processed: usize,
    pub versions_failed: usize,
    pub references: usize,
    pub tar_bytes: u64,
    pub final_bytes: u64,
    pub elapsed: Duration,
    pub results: Vec<PaperResult>,
}

impl Summary {
    pub fn from_results(results: Vec<PaperResult>, total: usize, elapsed: Duration) -> Self {
        let mut summary = Self {
            total,
            not_started: total.saturating_sub(results.len()),
            elapsed,
            ..Default::default()
        };
        for r in &results {
            if r.success {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            if let Some(disk) = &r.disk {
                summary.versions_processed += disk.processed_versions;
                summary.versions_failed += disk.failed_versions.len();
                summary.references += disk.references.unwrap_or(0);
                summary.tar_bytes += disk.total_tar_size_bytes;
                summary.final_bytes += disk.total_processed_size_bytes;
            }
        }
        summary.results = results;
        summary
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.paper_id.as_str())
    }

    fn reduction_percent(&self) -> f64 {
        if self.tar_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.final_bytes as f64 / self.tar_bytes as f64) * 100.0
    }

    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Crawl")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
            ]);

        table.add_row(vec![
            Cell::new("Papers"),
            Cell::new(format!(
                "{}/{} ({} failed, {} not started)",
                self.succeeded, self.total, self.failed, self.not_started
            )),
        ]);
        table.add_row(vec![
            Cell::new("Versions"),
            Cell::new(format!(
                "{} ({} skipped)",
                fmt_num(self.versions_processed),
                self.versions_failed
            )),
        ]);
        table.add_row(vec![
            Cell::new("References"),
            Cell::new(fmt_num(self.references)),
        ]);
        table.add_row(vec![
            Cell::new("Downloaded"),
            Cell::new(fmt_bytes(self.tar_bytes)),
        ]);
        table.add_row(vec![
            Cell::new("Kept").fg(Color::Green),
            Cell::new(format!(
                "{} ({:.1}% smaller)",
                fmt_bytes(self.final_bytes),
                self.reduction_percent()
            ))
            .fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Time"),
            Cell::new(format!("{:.1}s", self.elapsed.as_secs_f64())),
        ]);

        format!("\n{table}")
    }

    /// Print the table (TTY mode).
    pub fn print(&self) {
        eprintln!("{}", self.format_table());
    }

    /// Log minimal summary (non-TTY mode).
    pub fn log(&self) {
        log::info!(
            "Crawl complete: {}/{} papers ({} failed), {} versions, {} references [{:.1}s]",
            self.succeeded,
            self.total,
            self.failed,
            fmt_num(self.versions_processed),
            fmt_num(self.references),
            self.elapsed.as_secs_f64()
        );
        log::info!(
            "Bytes: {} downloaded, {} kept",
            fmt_bytes(self.tar_bytes),
            fmt_bytes(self.final_bytes)
        );
        let failed: Vec<&str> = self.failed_ids().collect();
        if !failed.is_empty() {
            log::warn!("Failed papers: {}", failed.join(", "));
        }
    }
}

fn fmt_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
