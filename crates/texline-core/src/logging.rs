//! Logging utilities with indicatif integration and an optional log file

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use indicatif::MultiProgress;
use log::Log;

/// ANSI color code and padded label for a log level.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

/// Append-only log file shared by all workers.
struct LogFile(Mutex<File>);

impl LogFile {
    fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self(Mutex::new(file)))
    }

    fn write_record(&self, record: &log::Record) {
        let (_, label, _) = level_style(record.level(), false);
        let line = format!(
            "{} - {} - {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            label.trim_end(),
            record.args()
        );
        // A poisoned lock only means another thread panicked mid-write
        let mut file = self.0.lock().unwrap_or_else(|e| e.into_inner());
        let _ = file.write_all(line.as_bytes());
    }

    fn flush(&self) {
        let mut file = self.0.lock().unwrap_or_else(|e| e.into_inner());
        let _ = file.flush();
    }
}

/// Logger that prints through indicatif MultiProgress to avoid mixing with progress bars.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: Option<MultiProgress>,
    file: Option<LogFile>,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: Option<MultiProgress>) -> Self {
        Self {
            inner,
            multi,
            file: None,
        }
    }

    /// The file keeps the full info-level history even when the console is quiet
    fn file_enabled(&self, metadata: &log::Metadata) -> bool {
        self.file.is_some()
            && (metadata.level() <= log::Level::Info || self.inner.enabled(metadata))
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata) || self.file_enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if let Some(file) = &self.file {
            if self.file_enabled(record.metadata()) {
                file.write_record(record);
            }
        }
        if !self.inner.enabled(record.metadata()) {
            return;
        }
        match &self.multi {
            Some(multi) => {
                // TTY: colored
                let (pre, label, post) = level_style(record.level(), true);
                let line = format!("[{pre}{label}{post}] {}", record.args());
                multi.suspend(|| eprintln!("{line}"));
            }
            None => {
                // Non-TTY: no ANSI colors
                let (_, label, _) = level_style(record.level(), false);
                eprintln!("[{label}] {}", record.args());
            }
        }
    }

    fn flush(&self) {
        self.inner.flush();
        if let Some(file) = &self.file {
            file.flush();
        }
    }
}

/// Initialize logging with optional TTY mode (indicatif integration)
///
/// `log_file`, when given, receives every record with a timestamp in
/// addition to the console.
pub fn init_logging(
    quiet: bool,
    debug: bool,
    multi: Option<&MultiProgress>,
    log_file: Option<&Path>,
) -> io::Result<()> {
    let default_level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    let inner = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level),
    )
    .build();
    let mut max_level = inner.filter();

    let mut logger = IndicatifLogger::new(inner, multi.cloned());
    if let Some(path) = log_file {
        logger.file = Some(LogFile::open(path)?);
        if max_level < log::LevelFilter::Info {
            max_level = log::LevelFilter::Info;
        }
    }

    log::set_boxed_logger(Box::new(logger)).map_err(io::Error::other)?;
    log::set_max_level(max_level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_labels_have_no_ansi() {
        let (pre, label, post) = level_style(log::Level::Warn, false);
        assert_eq!(pre, "");
        assert_eq!(label, "WARN ");
        assert_eq!(post, "");
    }

    #[test]
    fn colored_labels_reset() {
        let (pre, label, post) = level_style(log::Level::Error, true);
        assert_eq!(pre, "\x1b[31m");
        assert_eq!(label, "ERROR");
        assert_eq!(post, "\x1b[0m");
    }

    #[test]
    fn log_file_appends_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.log");
        let file = LogFile::open(&path).unwrap();
        file.write_record(
            &log::Record::builder()
                .args(format_args!("hello"))
                .level(log::Level::Info)
                .build(),
        );
        file.flush();
        drop(file);

        let reopened = LogFile::open(&path).unwrap();
        reopened.write_record(
            &log::Record::builder()
                .args(format_args!("again"))
                .level(log::Level::Warn)
                .build(),
        );
        reopened.flush();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - INFO - hello"));
        assert!(lines[1].ends_with(" - WARN - again"));
    }

    fn metadata(level: log::Level) -> log::Metadata<'static> {
        log::Metadata::builder().level(level).target("texline").build()
    }

    #[test]
    fn file_keeps_info_when_console_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let quiet = || env_logger::Builder::new().parse_filters("warn").build();

        let console_only = IndicatifLogger::new(quiet(), None);
        assert!(console_only.enabled(&metadata(log::Level::Warn)));
        assert!(!console_only.enabled(&metadata(log::Level::Info)));

        let mut with_file = IndicatifLogger::new(quiet(), None);
        with_file.file = Some(LogFile::open(&dir.path().join("log.log")).unwrap());
        assert!(with_file.file_enabled(&metadata(log::Level::Info)));
        assert!(with_file.enabled(&metadata(log::Level::Info)));
        assert!(!with_file.enabled(&metadata(log::Level::Debug)));

        with_file.log(
            &log::Record::builder()
                .args(format_args!("kept in file"))
                .level(log::Level::Info)
                .target("texline")
                .build(),
        );
        with_file.flush();
        let content = std::fs::read_to_string(dir.path().join("log.log")).unwrap();
        assert!(content.trim_end().ends_with(" - INFO - kept in file"));
    }
}
