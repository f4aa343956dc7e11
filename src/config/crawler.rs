//! Crawl loop, politeness, and near-duplicate configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::DEFAULT_USER_AGENT;

/// File extensions that are never fetched because they are not HTML
const DEFAULT_SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".zip", ".mp4", ".mp3", ".avi", ".exe", ".doc",
    ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".rar", ".tar", ".gz", ".ico", ".svg", ".webp",
];

/// Crawl loop and politeness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// User agent sent with requests and matched against robots.txt groups
    pub user_agent: String,
    /// Minimum seconds between two dispatches to the same domain
    pub min_delay_secs: f64,
    /// Sleep when nothing in the frontier is eligible (milliseconds)
    pub idle_backoff_ms: u64,
    /// robots.txt fetch timeout (seconds)
    pub robots_timeout_secs: u64,
    /// HEAD content-type probe timeout (seconds)
    pub head_timeout_secs: u64,
    /// Full page fetch timeout (seconds)
    pub fetch_timeout_secs: u64,
    /// Probe content type with a HEAD request before the GET
    pub probe_content_type: bool,
    /// Path suffixes skipped before any network call
    pub skip_extensions: Vec<String>,
    /// Stop after this many stored pages (0 = run until cancelled)
    pub max_pages: u64,
}

impl CrawlerConfig {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn robots_timeout(&self) -> Duration {
        Duration::from_secs(self.robots_timeout_secs)
    }

    pub fn head_timeout(&self) -> Duration {
        Duration::from_secs(self.head_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            min_delay_secs: 1.0,
            idle_backoff_ms: 500,
            robots_timeout_secs: 2,
            head_timeout_secs: 2,
            fetch_timeout_secs: 10,
            probe_content_type: true,
            skip_extensions: DEFAULT_SKIP_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            max_pages: 0,
        }
    }
}

/// Near-duplicate filtering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Jaccard similarity above which a page is rejected (strictly greater)
    pub similarity_threshold: f64,
    /// Number of leading characters kept as the document snippet
    pub snippet_chars: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            snippet_chars: 500,
        }
    }
}
