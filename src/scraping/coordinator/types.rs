//! Coordinator types: settings, cycle outcomes, and statistics

use std::time::Duration;

use crate::config::Config;
use crate::scraping::NormalizedUrl;
use crate::types::DocumentId;

/// Runtime settings for the crawl loop
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// User agent matched against robots.txt groups
    pub user_agent: String,
    /// Sleep between polls when nothing is ready
    pub idle_backoff: Duration,
    pub robots_timeout: Duration,
    pub head_timeout: Duration,
    pub fetch_timeout: Duration,
    /// Send a HEAD request to check the content type before the GET
    pub probe_content_type: bool,
    /// Lowercase path suffixes skipped without any network call
    pub skip_extensions: Vec<String>,
    /// Stop after this many stored pages (0 = unlimited)
    pub max_pages: u64,
}

impl CrawlSettings {
    /// Build settings from the loaded configuration.
    ///
    /// The CLI and tests both go through this so they crawl with the same
    /// timeouts and filters.
    pub fn from_config(config: &Config) -> Self {
        let crawler = &config.crawler;
        Self {
            user_agent: crawler.user_agent.clone(),
            idle_backoff: crawler.idle_backoff(),
            robots_timeout: crawler.robots_timeout(),
            head_timeout: crawler.head_timeout(),
            fetch_timeout: crawler.fetch_timeout(),
            probe_content_type: crawler.probe_content_type,
            skip_extensions: crawler
                .skip_extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            max_pages: crawler.max_pages,
        }
    }
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What one dispatch cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Nothing was ready to dispatch
    Idle,
    /// Known binary extension, skipped before any request
    SkippedExtension { url: NormalizedUrl },
    /// Not an HTML page (from the HEAD probe or the GET response)
    NonHtml {
        url: NormalizedUrl,
        content_type: String,
    },
    /// Network error, timeout, or non-200 status. Not retried.
    FetchFailed { url: NormalizedUrl, reason: String },
    /// Page accepted into the corpus
    Stored {
        url: NormalizedUrl,
        document_id: DocumentId,
        links_enqueued: usize,
    },
    /// Page rejected as a near-duplicate; its links were still followed
    Duplicate {
        url: NormalizedUrl,
        duplicate_of: DocumentId,
        links_enqueued: usize,
    },
    /// The accepted page could not be written to the corpus
    StoreFailed { url: NormalizedUrl, reason: String },
}

impl CycleOutcome {
    pub fn is_idle(&self) -> bool {
        matches!(self, CycleOutcome::Idle)
    }

    /// URL this cycle dispatched, if any
    pub fn url(&self) -> Option<&NormalizedUrl> {
        match self {
            CycleOutcome::Idle => None,
            CycleOutcome::SkippedExtension { url }
            | CycleOutcome::NonHtml { url, .. }
            | CycleOutcome::FetchFailed { url, .. }
            | CycleOutcome::Stored { url, .. }
            | CycleOutcome::Duplicate { url, .. }
            | CycleOutcome::StoreFailed { url, .. } => Some(url),
        }
    }
}

/// Counters accumulated by the crawl loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStats {
    /// URLs taken from the frontier
    pub urls_dispatched: u64,
    pub pages_stored: u64,
    pub duplicates_rejected: u64,
    pub non_html_skipped: u64,
    pub extension_skipped: u64,
    pub fetch_failures: u64,
    pub store_failures: u64,
    /// New URLs added to the frontier from discovered links
    pub links_enqueued: u64,
    pub idle_cycles: u64,
    /// Current pending queue size
    pub queue_size: usize,
    /// Current crawled set size
    pub crawled_count: usize,
    /// Current corpus size
    pub corpus_size: usize,
}

impl CrawlStats {
    pub(super) fn record(&mut self, outcome: &CycleOutcome) {
        if outcome.url().is_some() {
            self.urls_dispatched += 1;
        }

        match outcome {
            CycleOutcome::Idle => self.idle_cycles += 1,
            CycleOutcome::SkippedExtension { .. } => self.extension_skipped += 1,
            CycleOutcome::NonHtml { .. } => self.non_html_skipped += 1,
            CycleOutcome::FetchFailed { .. } => self.fetch_failures += 1,
            CycleOutcome::StoreFailed { .. } => self.store_failures += 1,
            CycleOutcome::Stored { links_enqueued, .. } => {
                self.pages_stored += 1;
                self.links_enqueued += *links_enqueued as u64;
            }
            CycleOutcome::Duplicate { links_enqueued, .. } => {
                self.duplicates_rejected += 1;
                self.links_enqueued += *links_enqueued as u64;
            }
        }
    }
}
