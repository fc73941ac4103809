//! Crawl subcommand - versions, metadata and references for a set of papers

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use texline_arxiv::{ArxivClient, generate_id_range};
use texline_core::{ProgressContext, is_shutdown_requested};
use texline_crawl::Crawler;
use texline_scholar::ScholarClient;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Explicit identifiers (comma-separated), instead of a generated range
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["prefix", "start", "end"])]
    pub ids: Option<Vec<String>>,

    /// Year-month prefix of the generated range (YYMM)
    #[arg(long, default_value = "2411")]
    pub prefix: String,

    /// First sequence number of the generated range
    #[arg(long, default_value_t = 222)]
    pub start: u32,

    /// Last sequence number of the generated range (inclusive)
    #[arg(long, default_value_t = 5223)]
    pub end: u32,

    /// Number of parallel workers (1 = sequential, input order)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Base output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for disk_stats.jsonl and ram_stats.jsonl
    #[arg(long)]
    pub stats_dir: Option<PathBuf>,

    /// Also store the raw arXiv BibTeX of each paper
    #[arg(long)]
    pub bibtex: bool,

    /// Skip the Semantic Scholar reference crawl
    #[arg(long)]
    pub no_references: bool,
}

impl CrawlArgs {
    fn paper_ids(&self) -> Result<Vec<String>> {
        if let Some(ids) = &self.ids {
            let ids: Vec<String> = ids
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            anyhow::ensure!(!ids.is_empty(), "--ids is empty");
            return Ok(ids);
        }
        anyhow::ensure!(
            self.prefix.len() == 4 && self.prefix.bytes().all(|b| b.is_ascii_digit()),
            "--prefix must be four digits (YYMM), got {:?}",
            self.prefix
        );
        anyhow::ensure!(
            self.start <= self.end,
            "--start {} is after --end {}",
            self.start,
            self.end
        );
        Ok(generate_id_range(&self.prefix, self.start, self.end))
    }
}

pub fn run(args: CrawlArgs, config: &Config, progress: &ProgressContext) -> Result<ExitCode> {
    let ids = args.paper_ids()?;

    let mut crawl_config = config.crawl_config();
    if let Some(workers) = args.workers {
        crawl_config.workers = workers;
    }
    if let Some(output) = &args.output {
        crawl_config.output_dir = output.clone();
    }
    if let Some(stats_dir) = &args.stats_dir {
        crawl_config.stats_dir = stats_dir.clone();
    }
    crawl_config.fetch_bibtex |= args.bibtex;
    crawl_config.crawl_references &= !args.no_references;

    let scholar_config = config.scholar_config();
    if crawl_config.crawl_references && scholar_config.api_key.is_none() {
        log::warn!("No Semantic Scholar API key set, reference lookups may be rate limited");
    }

    let arxiv = ArxivClient::new(config.arxiv_config()).context("Cannot create arXiv client")?;
    let scholar = ScholarClient::new(scholar_config).context("Cannot create S2 client")?;
    let crawler = Crawler::new(&arxiv, &scholar, &crawl_config)?;

    let summary = texline_crawl::run(&crawler, &ids, progress)?;

    if progress.is_tty() {
        summary.print();
    } else {
        summary.log();
    }

    if is_shutdown_requested() {
        log::warn!("Shutdown requested, exiting");
        return Ok(ExitCode::from(130));
    }
    if summary.failed > 0 {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: CrawlArgs,
    }

    fn parse(argv: &[&str]) -> CrawlArgs {
        let mut full = vec!["texline"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).unwrap().args
    }

    #[test]
    fn default_range() {
        let ids = parse(&[]).paper_ids().unwrap();
        assert_eq!(ids.len(), 5223 - 222 + 1);
        assert_eq!(ids.first().unwrap(), "2411.00222");
        assert_eq!(ids.last().unwrap(), "2411.05223");
    }

    #[test]
    fn custom_range() {
        let ids = parse(&["--prefix", "2301", "--start", "1", "--end", "3"])
            .paper_ids()
            .unwrap();
        assert_eq!(ids, vec!["2301.00001", "2301.00002", "2301.00003"]);
    }

    #[test]
    fn explicit_ids() {
        let ids = parse(&["--ids", "2411.00222, hep-th/9901001v2,"])
            .paper_ids()
            .unwrap();
        assert_eq!(ids, vec!["2411.00222", "hep-th/9901001v2"]);
    }

    #[test]
    fn ids_conflict_with_range() {
        let argv = ["texline", "--ids", "2411.00222", "--start", "5"];
        assert!(TestCli::try_parse_from(argv).is_err());
    }

    #[test]
    fn rejects_bad_ranges() {
        assert!(parse(&["--prefix", "24"]).paper_ids().is_err());
        assert!(parse(&["--start", "9", "--end", "3"]).paper_ids().is_err());
    }
}
