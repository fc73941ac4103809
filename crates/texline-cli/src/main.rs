//! texline - arXiv LaTeX source crawler
//!
//! Downloads every revision of a range of arXiv papers, keeps the LaTeX
//! sources, and records metadata and citation references next to them.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "texline")]
#[command(about = "Crawl arXiv LaTeX sources, metadata and references")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./texline.toml or ~/.config/texline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Read timeout in seconds for stall detection
    #[arg(long, global = true)]
    read_timeout: Option<u64>,

    /// Maximum attempts for transient failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl a range or list of arXiv papers
    Crawl(cmd::crawl::CrawlArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let progress = texline_core::ProgressContext::new();

    let mut config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };
    if let Some(secs) = cli.read_timeout {
        config.http.read_timeout = secs;
    }
    if let Some(n) = cli.max_retries {
        config.crawl.max_retries = n;
    }

    match cli.command {
        Command::Crawl(args) => {
            // Logging:
            //   TTY:     quiet (warn) unless --debug, progress lines show activity
            //   non-TTY: info unless --quiet, logs are the only progress indicator
            let is_tty = progress.is_tty();
            let multi = if is_tty { Some(progress.multi()) } else { None };
            let quiet = cli.quiet || (is_tty && !cli.debug);
            texline_core::init_logging(quiet, cli.debug, multi, config.log_file())?;
            texline_core::install_signal_handlers()?;
            cmd::crawl::run(args, &config, &progress)
        }
        Command::Config => {
            texline_core::init_logging(cli.quiet, cli.debug, None, None)?;
            cmd::show_config::run(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}
