//! Progress lines for the crawl.
//!
//! TTY mode: an overall papers counter plus one spinner line per in-flight
//! paper, switched to a byte bar while its bundle downloads.
//! Non-TTY mode: every bar is hidden and the log carries progress.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const ID_WIDTH: usize = 18;

fn paper_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:<18.dim} {wide_msg:.dim}")
        .expect("invalid template")
}

fn download_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} {prefix:<18.dim} {bar:30.green/dim} {binary_bytes:>9}/{binary_total_bytes:9} {wide_msg:.dim}",
    )
    .expect("invalid template")
    .progress_chars("--")
}

fn overall_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:.cyan.bold} {pos}/{len} papers [{elapsed_precise}] {wide_msg}")
        .expect("invalid template")
}

/// Switch a paper line to a byte bar for a download of `total` bytes.
pub fn start_download(pb: &ProgressBar, total: u64) {
    pb.set_position(0);
    pb.set_length(total);
    pb.set_style(download_style());
}

/// Back to the spinner once the bundle is on disk.
pub fn end_download(pb: &ProgressBar) {
    pb.set_style(paper_style());
}

pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Detects whether stderr is a terminal.
    pub fn new() -> Self {
        let is_tty = std::io::stderr().is_terminal();
        let multi = if is_tty {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        Self { multi, is_tty }
    }

    /// Counter of finished papers, pinned above the paper lines.
    pub fn overall_bar(&self, total: usize) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(total as u64));
        pb.set_style(overall_style());
        pb.set_prefix("crawl");
        pb
    }

    /// Spinner line for one paper; callers report stages with `set_message`.
    pub fn paper_bar(&self, paper_id: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(paper_style());
        pb.set_prefix(truncate_id(paper_id));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// For routing log records around the bars.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_id(id: &str) -> String {
    id.chars().take(ID_WIDTH).collect()
}

/// `1234567` -> `1,234,567`
pub fn fmt_num(n: usize) -> String {
    let digits = n.to_string();
    let head = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - head) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
