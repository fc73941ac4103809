//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use texline_arxiv::{ArxivConfig, RetentionSet};
use texline_core::{HttpConfig, RetryPolicy};
use texline_scholar::ScholarConfig;

/// Contents of `texline.toml`; every key is optional
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub arxiv: ArxivSection,
    pub s2: S2Config,
    pub http: HttpSection,
    pub crawl: CrawlSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// `disk_stats.jsonl` and `ram_stats.jsonl` go here
    pub stats_dir: PathBuf,
    /// Empty string disables the log file
    pub log_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data"),
            stats_dir: PathBuf::from("."),
            log_file: PathBuf::from("log.log"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArxivSection {
    pub api_url: String,
    pub source_url: String,
    pub bibtex_url: String,
    /// Minimum seconds between query API calls
    pub request_interval: f64,
}

impl Default for ArxivSection {
    fn default() -> Self {
        let defaults = ArxivConfig::default();
        Self {
            api_url: defaults.api_url,
            source_url: defaults.source_url,
            bibtex_url: defaults.bibtex_url,
            request_interval: defaults.request_interval.as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct S2Config {
    pub api_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    /// Seconds to sleep before every request
    pub request_delay: f64,
    /// Seconds to wait after a rate-limited request
    pub rate_limit_wait: f64,
}

impl Default for S2Config {
    fn default() -> Self {
        let defaults = ScholarConfig::default();
        Self {
            api_url: defaults.api_url,
            api_key: std::env::var("SEMANTIC_SCHOLAR_API_KEY").ok(),
            request_delay: defaults.request_delay.as_secs_f64(),
            rate_limit_wait: defaults.retry.delay.as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Seconds without data before a download counts as stalled
    pub read_timeout: u64,
    pub connect_timeout: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            read_timeout: 30,
            connect_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlSection {
    pub workers: usize,
    /// Attempts per arXiv lookup or revision, including the first
    pub max_retries: u32,
    pub retry_delay: f64,
    pub version_delay: f64,
    pub probe_delay: f64,
    pub reference_delay: f64,
    pub paper_delay: f64,
    pub ram_sample_interval: f64,
    /// Extensions kept after extraction
    pub retain: Vec<String>,
    pub fetch_bibtex: bool,
    pub crawl_references: bool,
}

impl Default for CrawlSection {
    fn default() -> Self {
        let defaults = texline_crawl::Config::default();
        Self {
            workers: defaults.workers,
            max_retries: defaults.retry.max_attempts,
            retry_delay: defaults.retry.delay.as_secs_f64(),
            version_delay: defaults.version_delay.as_secs_f64(),
            probe_delay: defaults.probe_delay.as_secs_f64(),
            reference_delay: defaults.reference_delay.as_secs_f64(),
            paper_delay: defaults.paper_delay.as_secs_f64(),
            ram_sample_interval: defaults.ram_sample_interval.as_secs_f64(),
            retain: defaults.retention.extensions().map(String::from).collect(),
            fetch_bibtex: defaults.fetch_bibtex,
            crawl_references: defaults.crawl_references,
        }
    }
}

/// `api_key = "${VAR}"` reads the key from the environment
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

/// Negative or non-finite values count as zero
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl Config {
    /// `./texline.toml`, else `config.toml` in the platform config dir
    /// (`~/.config/texline/` on Linux), else defaults.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("texline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "texline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn log_file(&self) -> Option<&Path> {
        let path = self.output.log_file.as_path();
        (!path.as_os_str().is_empty()).then_some(path)
    }

    fn http_config(&self) -> HttpConfig {
        HttpConfig {
            read_timeout: Duration::from_secs(self.http.read_timeout),
            connect_timeout: Duration::from_secs(self.http.connect_timeout),
            ..HttpConfig::default()
        }
    }

    pub fn arxiv_config(&self) -> ArxivConfig {
        ArxivConfig {
            api_url: self.arxiv.api_url.clone(),
            source_url: self.arxiv.source_url.clone(),
            bibtex_url: self.arxiv.bibtex_url.clone(),
            request_interval: secs(self.arxiv.request_interval),
            http: self.http_config(),
        }
    }

    pub fn scholar_config(&self) -> ScholarConfig {
        let defaults = ScholarConfig::default();
        ScholarConfig {
            api_url: self.s2.api_url.clone(),
            api_key: self.s2.api_key.clone(),
            request_delay: secs(self.s2.request_delay),
            retry: RetryPolicy::new(defaults.retry.max_attempts, secs(self.s2.rate_limit_wait)),
            http: self.http_config(),
        }
    }

    pub fn crawl_config(&self) -> texline_crawl::Config {
        let c = &self.crawl;
        texline_crawl::Config {
            output_dir: self.output.dir.clone(),
            stats_dir: self.output.stats_dir.clone(),
            workers: c.workers,
            retry: RetryPolicy::new(c.max_retries.max(1), secs(c.retry_delay)),
            version_delay: secs(c.version_delay),
            probe_delay: secs(c.probe_delay),
            reference_delay: secs(c.reference_delay),
            paper_delay: secs(c.paper_delay),
            ram_sample_interval: secs(c.ram_sample_interval),
            retention: RetentionSet::new(&c.retain),
            fetch_bibtex: c.fetch_bibtex,
            crawl_references: c.crawl_references,
        }
    }
}
