//! Semantic Scholar Graph API client

use std::time::Duration;

use texline_core::{FetchError, HttpClient, HttpConfig, RetryPolicy};

use crate::schema::{CitedPaper, ReferencesResponse};

const REFERENCE_FIELDS: &str = "references,references.externalIds,references.title";

/// Source of citation-graph references for a paper
pub trait CitationSource: Send + Sync {
    /// References of `arxiv_id`. An unknown paper has no references.
    fn fetch_references(&self, arxiv_id: &str) -> Result<Vec<CitedPaper>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ScholarConfig {
    pub api_url: String,
    /// Sent as `x-api-key` when set
    pub api_key: Option<String>,
    /// Sleep before every request
    pub request_delay: Duration,
    /// Attempts and wait used when rate limited or the server errors
    pub retry: RetryPolicy,
    pub http: HttpConfig,
}

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.semanticscholar.org/graph/v1".to_string(),
            api_key: None,
            request_delay: Duration::from_millis(1500),
            retry: RetryPolicy::new(2, Duration::from_secs(15)),
            http: HttpConfig::default(),
        }
    }
}

pub struct ScholarClient {
    http: HttpClient,
    config: ScholarConfig,
}

impl ScholarClient {
    pub fn new(config: ScholarConfig) -> Result<Self, FetchError> {
        let http = HttpClient::new(&config.http)?;
        Ok(Self { http, config })
    }

    fn references_url(&self, arxiv_id: &str) -> String {
        format!(
            "{}/paper/arXiv:{arxiv_id}?fields={REFERENCE_FIELDS}",
            self.config.api_url.trim_end_matches('/')
        )
    }

    fn get_once(&self, url: &str) -> Result<Option<String>, FetchError> {
        if !self.config.request_delay.is_zero() {
            std::thread::sleep(self.config.request_delay);
        }
        let headers: Vec<(&str, &str)> = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(|key| ("x-api-key", key))
            .into_iter()
            .collect();
        match self.http.get_text(url, &headers) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.status() == Some(404) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl CitationSource for ScholarClient {
    fn fetch_references(&self, arxiv_id: &str) -> Result<Vec<CitedPaper>, FetchError> {
        let url = self.references_url(arxiv_id);
        log::debug!(
            "S2 references for {arxiv_id} ({})",
            if self.config.api_key.is_some() { "with API key" } else { "anonymous" }
        );

        let body = self.config.retry.run(
            &format!("S2 references {arxiv_id}"),
            || self.get_once(&url),
            FetchError::is_retryable,
        )?;
        let Some(body) = body else {
            log::debug!("S2 has no record of {arxiv_id}");
            return Ok(Vec::new());
        };
        parse_references(&body)
    }
}

/// Non-null references from a Graph API body
pub fn parse_references(body: &str) -> Result<Vec<CitedPaper>, FetchError> {
    let resp: ReferencesResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Malformed(format!("S2 references: {e}")))?;
    Ok(resp.references.into_iter().flatten().collect())
}
