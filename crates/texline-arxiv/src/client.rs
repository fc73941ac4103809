//! arXiv HTTP client: query API, source bundles, BibTeX

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use texline_core::{FetchError, HttpClient, HttpConfig, StreamError};

use crate::feed::{FeedEntry, parse_search_response};

/// Everything the resolvers need from the preprint repository.
///
/// The production implementation is [`ArxivClient`]; tests swap in an
/// in-memory repository.
pub trait Repository: Send + Sync {
    /// Look up one base or versioned identifier.
    fn search(&self, id: &str) -> Result<FeedEntry, FetchError>;

    /// Download the source bundle of `versioned_id` to `dest`.
    fn download_source(
        &self,
        entry: &FeedEntry,
        versioned_id: &str,
        dest: &Path,
        pb: &ProgressBar,
    ) -> Result<u64, FetchError>;

    /// Raw BibTeX text for a base identifier.
    fn fetch_bibtex(&self, id: &str) -> Result<String, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ArxivConfig {
    pub api_url: String,
    pub source_url: String,
    pub bibtex_url: String,
    /// Minimum spacing between query API calls
    pub request_interval: Duration,
    pub http: HttpConfig,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            api_url: "http://export.arxiv.org/api/query".to_string(),
            source_url: "https://arxiv.org/src".to_string(),
            bibtex_url: "https://arxiv.org/bibtex".to_string(),
            request_interval: Duration::from_secs(3),
            http: HttpConfig::default(),
        }
    }
}

/// Blocking arXiv client, shared by all workers.
pub struct ArxivClient {
    http: HttpClient,
    config: ArxivConfig,
    last_query: Mutex<Option<Instant>>,
}

impl ArxivClient {
    pub fn new(config: ArxivConfig) -> Result<Self, FetchError> {
        let http = HttpClient::new(&config.http)?;
        Ok(Self {
            http,
            config,
            last_query: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ArxivConfig {
        &self.config
    }

    /// Block until `request_interval` has passed since the previous query.
    fn pace(&self) {
        let interval = self.config.request_interval;
        if interval.is_zero() {
            return;
        }
        let mut last = self.last_query.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }

    fn source_url(&self, entry: &FeedEntry, versioned_id: &str) -> String {
        entry
            .source_url()
            .unwrap_or_else(|| format!("{}/{versioned_id}", self.config.source_url))
    }
}

/// 400/404 mean the upstream has nothing under this id
fn classify(e: StreamError, id: &str) -> FetchError {
    match e.status() {
        Some(400 | 404) => FetchError::NotFound(id.to_string()),
        _ => FetchError::Stream(e),
    }
}

impl Repository for ArxivClient {
    fn search(&self, id: &str) -> Result<FeedEntry, FetchError> {
        self.pace();
        let url = format!("{}?id_list={id}&max_results=1", self.config.api_url);
        log::debug!("Searching {id}");
        let body = self.http.get_text(&url, &[]).map_err(|e| classify(e, id))?;
        parse_search_response(&body, id)
    }

    fn download_source(
        &self,
        entry: &FeedEntry,
        versioned_id: &str,
        dest: &Path,
        pb: &ProgressBar,
    ) -> Result<u64, FetchError> {
        let url = self.source_url(entry, versioned_id);
        log::debug!("Downloading {versioned_id} from {url}");
        self.http
            .download_to(&url, dest, pb)
            .map_err(|e| classify(e, versioned_id))
    }

    fn fetch_bibtex(&self, id: &str) -> Result<String, FetchError> {
        let url = format!("{}/{id}", self.config.bibtex_url);
        self.http.get_text(&url, &[]).map_err(|e| classify(e, id))
    }
}
