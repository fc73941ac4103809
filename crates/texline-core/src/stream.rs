//! HTTP requests and streaming downloads with read timeout.
//!
//! Every call runs on one shared tokio runtime and blocks the calling worker
//! thread. A download stalls out when no chunk arrives within the read timeout.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use indicatif::ProgressBar;

use crate::progress::start_download;

/// Failure of one HTTP exchange
#[derive(Debug)]
pub enum StreamError {
    /// `status` is `None` when the server never answered
    Http {
        status: Option<u16>,
        message: String,
    },
    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for StreamError {}

impl StreamError {
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.without_url_message(),
        }
    }

    /// HTTP status code, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            Self::Io(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => match status {
                // Rate limited or server side trouble
                Some(429) | Some(500..=599) => true,
                // Any other answer from the server is final
                Some(_) => false,
                // Connection refused, reset, DNS, ...
                None => true,
            },
            Self::Io(e) => {
                e.kind() != std::io::ErrorKind::StorageFull
            }
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Render a reqwest error without the request URL (keeps API keys out of logs).
trait WithoutUrl {
    fn without_url_message(&self) -> String;
}

impl WithoutUrl for reqwest::Error {
    fn without_url_message(&self) -> String {
        let mut msg = self.to_string();
        if let Some(url) = self.url() {
            msg = msg.replace(url.as_str(), "<url>");
        }
        msg
    }
}

/// Network settings shared by every client
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// No data for this long = stall
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            user_agent: concat!("texline/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Runtime behind every blocking call in this module
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Blocking HTTP client facade.
///
/// Cheap to clone: the inner reqwest client is reference counted and keeps
/// one connection pool for all workers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    read_timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| StreamError::from_reqwest(&e))?;
        Ok(Self {
            client,
            read_timeout: config.read_timeout,
        })
    }

    /// GET `url` and return the body as text. Non-2xx answers are errors.
    pub fn get_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, StreamError> {
        SHARED_RUNTIME.handle().block_on(async {
            let mut req = self.client.get(url);
            for (name, value) in headers {
                req = req.header(*name, *value);
            }
            let send = async {
                req.send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| StreamError::from_reqwest(&e))?
                    .text()
                    .await
                    .map_err(|e| StreamError::from_reqwest(&e))
            };
            match tokio::time::timeout(self.read_timeout, send).await {
                Ok(result) => result,
                Err(_) => Err(StreamError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no response within {:?}", self.read_timeout),
                ))),
            }
        })
    }

    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// Writes to `dest` directly; on failure the partial file is removed so a
    /// retry starts clean. Each chunk must arrive within the read timeout.
    pub fn download_to(&self, url: &str, dest: &Path, pb: &ProgressBar) -> Result<u64, StreamError> {
        let result = self.download_inner(url, dest, pb);
        if result.is_err() && dest.exists() {
            if let Err(e) = fs::remove_file(dest) {
                log::warn!("Could not remove partial download {}: {e}", dest.display());
            }
        }
        result
    }

    fn download_inner(&self, url: &str, dest: &Path, pb: &ProgressBar) -> Result<u64, StreamError> {
        SHARED_RUNTIME.handle().block_on(async {
            let mut response = self
                .client
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| StreamError::from_reqwest(&e))?;

            if let Some(total) = response.content_length() {
                start_download(pb, total);
            }

            let mut writer = BufWriter::new(File::create(dest)?);
            let mut written = 0u64;
            loop {
                let chunk = match tokio::time::timeout(self.read_timeout, response.chunk()).await {
                    Ok(chunk) => chunk.map_err(|e| StreamError::from_reqwest(&e))?,
                    Err(_) => {
                        return Err(StreamError::Io(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("read timeout ({:?} with no data)", self.read_timeout),
                        )));
                    }
                };
                let Some(bytes) = chunk else { break };
                writer.write_all(&bytes)?;
                written += bytes.len() as u64;
                pb.inc(bytes.len() as u64);
            }
            writer.flush()?;
            Ok(written)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> StreamError {
        StreamError::Http {
            status: Some(code),
            message: format!("status {code}"),
        }
    }

    #[test]
    fn retry_classification() {
        // arXiv throttling and outages
        for code in [429, 500, 502, 503] {
            assert!(status(code).is_retryable(), "{code}");
        }
        // Unknown ids and bad requests are final
        for code in [400, 403, 404, 410] {
            assert!(!status(code).is_retryable(), "{code}");
        }
        let reset = StreamError::Http {
            status: None,
            message: "connection reset".into(),
        };
        assert!(reset.is_retryable());
        let stalled = StreamError::Io(io::Error::new(io::ErrorKind::TimedOut, "stalled"));
        assert!(stalled.is_retryable());
        let full = StreamError::Io(io::Error::new(io::ErrorKind::StorageFull, "no space"));
        assert!(!full.is_retryable());
    }

    #[test]
    fn status_and_display() {
        assert_eq!(status(503).status(), Some(503));
        assert_eq!(status(503).to_string(), "HTTP 503: status 503");
        let offline = StreamError::Http {
            status: None,
            message: "dns".into(),
        };
        assert_eq!(offline.status(), None);
        assert_eq!(offline.to_string(), "HTTP error: dns");
        assert!(StreamError::Io(io::Error::other("x")).to_string().starts_with("IO error"));
    }

    #[test]
    fn partial_download_is_removed_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("2411.00222v1.tar.gz");
        let client = HttpClient::new(&HttpConfig {
            connect_timeout: Duration::from_millis(200),
            read_timeout: Duration::from_millis(200),
            ..HttpConfig::default()
        })
        .unwrap();
        // Nothing listens on the discard port
        let err = client
            .download_to("http://127.0.0.1:9/src", &dest, &ProgressBar::hidden())
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(!dest.exists());
    }

    #[test]
    fn default_http_config() {
        let config = HttpConfig::default();
        assert_eq!(config.read_timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("texline/"));
    }
}
