//! Fetch service used by the crawl loop and the politeness gate
//!
//! The crawler only sees the [`FetchService`] trait; [`HttpFetcher`] is the
//! reqwest-backed implementation used by the binary. Every call carries an
//! explicit timeout so no fetch can block the loop indefinitely.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during fetching
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Content too large: {0} bytes")]
    ContentTooLarge(usize),
}

impl FetchError {
    /// Classify a reqwest error so timeouts and connection failures are
    /// reported as such instead of a generic HTTP error.
    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else if err.is_connect() {
            FetchError::Connection(err.to_string())
        } else {
            FetchError::Http(err)
        }
    }
}

/// Response of a full fetch
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The fetched URL (may differ from request due to redirects)
    pub final_url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: String,
}

impl FetchResponse {
    /// Get a header value (case-insensitive name)
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    /// Lowercased Content-Type, empty when absent
    pub fn content_type(&self) -> String {
        self.header("content-type").unwrap_or_default().to_lowercase()
    }

    pub fn is_html(&self) -> bool {
        self.content_type().contains("text/html")
    }
}

/// Look up a header by case-insensitive name
pub fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Network collaborator consumed by the crawler
#[async_trait]
pub trait FetchService: Send + Sync {
    /// Full GET of `url`
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchResponse, FetchError>;

    /// Header-only request, used to probe the content type cheaply
    async fn head(&self, url: &Url, timeout: Duration) -> Result<Vec<(String, String)>, FetchError>;
}

/// Configuration for the HTTP fetcher
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string
    pub user_agent: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Maximum response size (bytes)
    pub max_content_size: usize,
    /// Maximum redirects to follow
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: crate::config::DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(5),
            max_content_size: 10 * 1024 * 1024, // 10 MB
            max_redirects: 10,
        }
    }
}

/// reqwest-backed [`FetchService`]
pub struct HttpFetcher {
    http_client: reqwest::Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn collect_headers(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
        headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect()
    }
}

#[async_trait]
impl FetchService for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchResponse, FetchError> {
        let response = self
            .http_client
            .get(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))?;

        let status_code = response.status().as_u16();
        let final_url = response.url().clone();
        let headers = Self::collect_headers(response.headers());

        if let Some(len) = response.content_length() {
            if len as usize > self.config.max_content_size {
                return Err(FetchError::ContentTooLarge(len as usize));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))?;

        if body.len() > self.config.max_content_size {
            return Err(FetchError::ContentTooLarge(body.len()));
        }

        Ok(FetchResponse {
            final_url,
            status_code,
            headers,
            body,
        })
    }

    async fn head(&self, url: &Url, timeout: Duration) -> Result<Vec<(String, String)>, FetchError> {
        let response = self
            .http_client
            .head(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))?;

        Ok(Self::collect_headers(response.headers()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with(headers: Vec<(&str, &str)>) -> FetchResponse {
        FetchResponse {
            final_url: Url::parse("https://example.com/page").unwrap(),
            status_code: 200,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: String::new(),
        }
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = response_with(vec![("Content-Type", "text/HTML; charset=utf-8")]);
        assert_eq!(response.header("content-type"), Some("text/HTML; charset=utf-8"));
        assert_eq!(response.content_type(), "text/html; charset=utf-8");
        assert!(response.is_html());
    }

    #[test]
    fn test_missing_content_type_is_not_html() {
        let response = response_with(vec![]);
        assert_eq!(response.content_type(), "");
        assert!(!response.is_html());
    }

    #[test]
    fn test_http_fetcher_builds_with_defaults() {
        assert!(HttpFetcher::new(FetchConfig::default()).is_ok());
    }
}
