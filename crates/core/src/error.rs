//! Unified error types for noticefeed.
//!
//! Every variant renders with a stable upper-case code so log sinks can
//! group failures without parsing free text.

/// Unified error type shared by the fetch, extract, detect and publish stages.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., a malformed selector).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The request exceeded the configured timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Connection-level failure (DNS, TLS, reset).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// The server answered with a status that is neither success nor "not modified".
    #[error("HTTP_STATUS: {status} (retryable: {retryable})")]
    HttpStatus { status: u16, retryable: bool },

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Every permitted attempt failed; carries the last underlying error.
    #[error("FETCH_EXHAUSTED: gave up after {attempts} attempt(s): {last}")]
    FetchExhausted { attempts: u32, last: Box<Error> },

    /// The fetched markup no longer matches what the extractor expects.
    #[error("EXTRACT_FAILED: {0}")]
    Extraction(String),

    /// A record violates the feed's required-field constraints.
    #[error("SERIALIZATION_ERROR: {0}")]
    Serialization(String),

    /// Reading or atomically replacing a cache/feed file failed.
    #[error("CACHE_PERSISTENCE: {0}")]
    CachePersistence(String),
}

impl Error {
    /// Whether the retry policy may attempt the operation again.
    ///
    /// Timeouts and connection failures are always transient. HTTP statuses
    /// carry the classification decided by the fetcher's status policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::FetchTimeout(_) | Error::Network(_) => true,
            Error::HttpStatus { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Short machine-readable code, matching the Display prefix.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::FetchTimeout(_) => "FETCH_TIMEOUT",
            Error::Network(_) => "NETWORK_ERROR",
            Error::HttpStatus { .. } => "HTTP_STATUS",
            Error::FetchTooLarge(_) => "FETCH_TOO_LARGE",
            Error::FetchExhausted { .. } => "FETCH_EXHAUSTED",
            Error::Extraction(_) => "EXTRACT_FAILED",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::CachePersistence(_) => "CACHE_PERSISTENCE",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::CachePersistence(err.to_string())
    }
}
