//! HTTP fetch with conditional requests.
//!
//! ### Source URLs
//! Configured URLs are trimmed, given `https` when no scheme is present and
//! stripped of fragments; query strings and percent-encoded paths are kept.
//!
//! ### Conditional requests
//! - A stored `Last-Modified` value is sent back as `If-Modified-Since`.
//! - `304 Not Modified` yields a result without a body. It is neither a
//!   failure nor content.
//!
//! ### Status partition
//! - 2xx: content
//! - 304: not modified
//! - anything else: [`Error::HttpStatus`], classified by the retry policy
//!
//! ### Limits
//! - Request timeout (retryable `FETCH_TIMEOUT`)
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable, not retryable)

pub mod retry;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url, header};
use std::time::{Duration, Instant};

pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use url::{UrlError, canonicalize, resolve_link};

use noticefeed_core::Error;

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 30s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("noticefeed/", env!("CARGO_PKG_VERSION")).to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(30_000),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn from_app(config: &noticefeed_core::AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// Outcome of a single successful request.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The URL requested
    pub url: Url,
    pub status: u16,
    /// Response body; `None` when the server answered "not modified".
    pub body: Option<Bytes>,
    /// `Last-Modified` of this response, to send on the next request.
    pub conditional_token: Option<String>,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResult {
    pub fn is_not_modified(&self) -> bool {
        self.body.is_none()
    }
}

/// Source of page bodies.
///
/// Implementations must treat every call as an idempotent GET so the retry
/// policy can repeat it.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, conditional_token: Option<&str>) -> Result<FetchResult, Error>;
}

/// reqwest-backed [`Fetcher`].
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn too_large(&self, len: usize) -> Error {
        Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() { Error::FetchTimeout(e.to_string()) } else { Error::Network(e.to_string()) }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, sent_token: Option<&str>) -> Result<FetchResult, Error> {
        let start = Instant::now();

        let mut request = self
            .http
            .get(url.clone())
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8");
        if let Some(token) = sent_token {
            request = request.header(header::IF_MODIFIED_SINCE, token);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();

        let conditional_token = response
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if status == StatusCode::NOT_MODIFIED {
            let fetch_ms = start.elapsed().as_millis() as u64;
            tracing::debug!(url = %url, fetch_ms, "not modified");
            return Ok(FetchResult {
                url: url.clone(),
                status: status.as_u16(),
                body: None,
                conditional_token: conditional_token.or_else(|| sent_token.map(str::to_string)),
                fetch_ms,
            });
        }

        if !status.is_success() {
            return Err(Error::HttpStatus { status: status.as_u16(), retryable: status.is_server_error() });
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let bytes = response.bytes().await.map_err(transport_error)?;

        if bytes.len() > self.config.max_bytes {
            return Err(self.too_large(bytes.len()));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(url = %url, status = status.as_u16(), fetch_ms, bytes = bytes.len(), "fetched");

        Ok(FetchResult { url: url.clone(), status: status.as_u16(), body: Some(bytes), conditional_token, fetch_ms })
    }
}
