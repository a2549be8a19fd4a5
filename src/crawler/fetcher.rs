//! HTTP fetcher implementation
//!
//! This module handles the single page fetch of a crawl job, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests to fetch page content, throttled per host
//! - Redirect handling (followed by the client, max 10 hops)
//! - Error classification

use crate::config::{Config, UserAgentConfig};
use crate::crawler::throttle::HostThrottle;
use crate::url::extract_host;
use crate::CrawlError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Maximum redirect hops followed for one request
pub const MAX_REDIRECTS: usize = 10;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value (empty if absent)
    pub content_type: String,
    /// Page body content
    pub body: String,
}

/// Fetches the page of a crawl job
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url`, failing on network errors, timeouts and non-2xx statuses
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, CrawlError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use seo_crawler::config::UserAgentConfig;
/// use seo_crawler::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "SeoCrawler".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/bot".to_string(),
///     contact_email: "bot@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a reqwest failure to a crawl error for `url`
pub(crate) fn classify_error(url: &Url, error: reqwest::Error) -> CrawlError {
    if error.is_timeout() {
        CrawlError::Timeout {
            url: url.to_string(),
        }
    } else {
        CrawlError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}

/// Page fetcher backed by reqwest and the per-host throttle
pub struct HttpFetcher {
    client: Client,
    throttle: HostThrottle,
}

impl HttpFetcher {
    pub fn new(client: Client, throttle: HostThrottle) -> Self {
        Self { client, throttle }
    }

    /// Builds the fetcher from the crawler and user agent configuration
    pub fn from_config(config: &Config) -> Result<Self, CrawlError> {
        let client = build_http_client(&config.user_agent, config.crawler.page_timeout())?;
        Ok(Self::new(client, HostThrottle::from_config(&config.crawler)))
    }

    pub fn throttle(&self) -> &HostThrottle {
        &self.throttle
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, CrawlError> {
        let host = extract_host(url).ok_or_else(|| CrawlError::MissingHost {
            url: url.to_string(),
        })?;
        let _permit = self.throttle.acquire(&host).await?;

        tracing::debug!("Fetching {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() {
            return Err(CrawlError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response.text().await.map_err(|e| classify_error(url, e))?;

        tracing::debug!(
            "Fetched {} ({} bytes, status {}, final url {})",
            url,
            body.len(),
            status.as_u16(),
            final_url
        );

        Ok(FetchedPage {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body,
        })
    }
}
