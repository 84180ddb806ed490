//! Fetch adapter
//!
//! The crawl only sees the [`Fetcher`] capability: `fetch(url)` returns the
//! response bytes and headers or a [`FetchError`]. [`HttpFetcher`] is the
//! reqwest-backed implementation; tests substitute their own.
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | Timeout / connection error | Retry with exponential backoff |
//! | HTTP 429 | Retry, domain delay doubled |
//! | HTTP 5xx | Retry with exponential backoff |
//! | Body read failure | Retry with exponential backoff |
//! | Other HTTP 4xx | Immediate failure |
//! | Robots.txt denial | Immediate failure |

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::document::DocumentFormat;
use crate::state::DomainThrottle;
use crate::url::extract_domain;
use async_trait::async_trait;
use reqwest::{header, redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a fetch did not produce content
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("disallowed by robots.txt")]
    RobotsDenied,
}

impl FetchError {
    /// Returns true if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) | Self::Body(_) => true,
            Self::Status(code) => *code == 429 || (500..600).contains(code),
            Self::Request(_) | Self::RobotsDenied => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// A successful response
#[derive(Debug, Clone)]
pub struct FetchedContent {
    /// URL after redirects
    pub final_url: Url,

    pub content_type: Option<String>,

    pub content_disposition: Option<String>,

    /// Response body; left empty when the response is a report document
    pub body: Vec<u8>,
}

impl FetchedContent {
    /// Format of the response when it is itself a report document
    ///
    /// Checked in order: `Content-Type`, the `Content-Disposition` filename,
    /// then the final URL's extension.
    pub fn document_format(&self) -> Option<DocumentFormat> {
        self.content_type
            .as_deref()
            .and_then(DocumentFormat::from_content_type)
            .or_else(|| {
                self.content_disposition
                    .as_deref()
                    .and_then(super::classifier::disposition_filename)
                    .and_then(|name| DocumentFormat::from_path(&name))
            })
            .or_else(|| DocumentFormat::from_path(self.final_url.path()))
    }
}

/// Capability to retrieve one URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedContent, FetchError>;
}

/// Formats the user agent string: `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `timeout` - Per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(user_agent))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed [`Fetcher`]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a fetcher from the crawler and user agent configuration
    pub fn from_config(
        crawler: &CrawlerConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(
            user_agent,
            Duration::from_secs(crawler.request_timeout_secs),
        )?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedContent, FetchError> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let header_value = |name: header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let mut content = FetchedContent {
            final_url: response.url().clone(),
            content_type: header_value(header::CONTENT_TYPE),
            content_disposition: header_value(header::CONTENT_DISPOSITION),
            body: Vec::new(),
        };

        // Documents are recorded, never parsed; skip downloading them.
        if content.document_format().is_none() {
            content.body = response.bytes().await?.to_vec();
        }

        Ok(content)
    }
}

/// Retry settings for one crawl
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    /// Backoff before retry number `attempt + 1`: `base * 2^attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

/// Fetches a URL, retrying transient failures with exponential backoff
///
/// Every attempt waits for the domain's politeness slot first.
///
/// # Returns
///
/// * `Ok(FetchedContent)` - An attempt succeeded
/// * `Err(FetchError)` - A permanent failure, or the last transient one
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    throttle: &DomainThrottle,
    url: &Url,
    retry: &RetryPolicy,
) -> Result<FetchedContent, FetchError> {
    let domain = extract_domain(url).unwrap_or_default();
    let mut attempt = 0;

    loop {
        throttle.acquire(&domain).await;

        match fetcher.fetch(url).await {
            Ok(content) => return Ok(content),
            Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                if e == FetchError::Status(429) {
                    throttle.mark_rate_limited(&domain);
                }

                let delay = retry.delay_for(attempt);
                tracing::debug!(
                    "Attempt {} for {} failed ({}), retrying in {:?}",
                    attempt + 1,
                    url,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
