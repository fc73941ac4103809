//! Common error type for upstream lookups and downloads

use crate::stream::StreamError;

/// Error from one request against an upstream service (search, download,
/// citation lookup).
///
/// `NotFound` is terminal and short-circuits retries. Everything else is
/// classified by [`FetchError::is_retryable`].
#[derive(Debug)]
pub enum FetchError {
    /// The upstream has no record for this identifier
    NotFound(String),
    /// Network or HTTP failure
    Stream(StreamError),
    /// The upstream answered, but the body could not be understood
    Malformed(String),
    /// Local I/O while persisting a response
    Io(std::io::Error),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "not found: {id}"),
            Self::Stream(e) => write!(f, "{e}"),
            Self::Malformed(msg) => write!(f, "malformed response: {msg}"),
            Self::Io(e) => write!(f, "IO: {e}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<StreamError> for FetchError {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound(_) => false,
            Self::Stream(e) => e.is_retryable(),
            // Truncated feeds and half-written JSON show up here
            Self::Malformed(_) => true,
            Self::Io(e) => e.kind() != std::io::ErrorKind::StorageFull,
        }
    }
}
