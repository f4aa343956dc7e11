//! Crawl coordinator driving the fetch loop
//!
//! Each cycle takes one URL from the frontier, filters it cheaply, fetches it,
//! offers the page text to the corpus through the near-duplicate filter, and
//! enqueues the robots-allowed links it found. When nothing is ready the loop
//! sleeps for the idle backoff and polls again.

mod types;
mod url_filter;

pub use types::*;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{
    dedup::NearDuplicateFilter,
    extractor::PageParser,
    fetcher::{header_value, FetchService},
    frontier::FrontierStore,
    politeness::PolitenessGate,
    NormalizedUrl,
};
use crate::corpus::{CorpusStore, InsertOutcome};
use crate::util::unix_now;

/// Text, title and raw links pulled out of one page
struct ParsedPage {
    text: String,
    title: String,
    links: Vec<String>,
}

/// Crawl loop over a shared frontier and corpus
pub struct CrawlCoordinator {
    settings: CrawlSettings,
    frontier: Arc<FrontierStore>,
    corpus: Arc<CorpusStore>,
    fetcher: Arc<dyn FetchService>,
    parser: Arc<dyn PageParser>,
    politeness: PolitenessGate,
    dedup: NearDuplicateFilter,
    stats: Mutex<CrawlStats>,
    /// Running flag (lock-free)
    running: AtomicBool,
    /// Set by `stop`; never cleared, so a stop issued before `run` still holds
    stop_requested: AtomicBool,
}

impl CrawlCoordinator {
    pub fn new(
        settings: CrawlSettings,
        frontier: Arc<FrontierStore>,
        corpus: Arc<CorpusStore>,
        fetcher: Arc<dyn FetchService>,
        parser: Arc<dyn PageParser>,
        dedup: NearDuplicateFilter,
    ) -> Self {
        let politeness = PolitenessGate::new(Arc::clone(&fetcher), settings.robots_timeout);

        Self {
            settings,
            frontier,
            corpus,
            fetcher,
            parser,
            politeness,
            dedup,
            stats: Mutex::new(CrawlStats::default()),
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
        }
    }

    /// Run one dispatch cycle and record its outcome
    pub async fn step(&self) -> CycleOutcome {
        let outcome = match self.frontier.take_next(unix_now()) {
            Ok(Some(url)) => self.process_url(url).await,
            Ok(None) => CycleOutcome::Idle,
            Err(e) => {
                error!("Failed to take next URL from frontier: {}", e);
                CycleOutcome::Idle
            }
        };

        self.stats.lock().record(&outcome);
        outcome
    }

    /// Fetch, filter and store a URL the frontier has already marked crawled
    async fn process_url(&self, url: NormalizedUrl) -> CycleOutcome {
        let Some(target) = url.to_url().filter(url_filter::is_crawlable_scheme) else {
            return CycleOutcome::FetchFailed {
                reason: format!("not a crawlable URL: {}", url),
                url,
            };
        };

        if url_filter::has_skipped_extension(&target, &self.settings.skip_extensions) {
            debug!("Skipping non-HTML file: {}", url);
            return CycleOutcome::SkippedExtension { url };
        }

        if self.settings.probe_content_type {
            match self.fetcher.head(&target, self.settings.head_timeout).await {
                Ok(headers) => {
                    let content_type = header_value(&headers, "content-type")
                        .unwrap_or_default()
                        .to_lowercase();
                    if !content_type.is_empty() && !content_type.contains("text/html") {
                        debug!("Skipping non-HTML content: {} ({})", url, content_type);
                        return CycleOutcome::NonHtml { url, content_type };
                    }
                }
                Err(e) => {
                    // Some servers reject HEAD; the GET decides
                    debug!("HEAD request failed for {}: {}", url, e);
                }
            }
        }

        info!("Crawling: {}", url);
        let response = match self.fetcher.fetch(&target, self.settings.fetch_timeout).await {
            Ok(response) => response,
            Err(e) => {
                error!("Error crawling {}: {}", url, e);
                return CycleOutcome::FetchFailed {
                    url,
                    reason: e.to_string(),
                };
            }
        };

        if response.status_code != 200 {
            warn!("HTTP {} for {}", response.status_code, url);
            return CycleOutcome::FetchFailed {
                url,
                reason: format!("HTTP {}", response.status_code),
            };
        }

        if !response.is_html() {
            let content_type = response.content_type();
            debug!("Skipping non-HTML response: {} ({})", url, content_type);
            return CycleOutcome::NonHtml { url, content_type };
        }

        // HTML parsing is CPU-bound; keep it off the async workers
        let parser = Arc::clone(&self.parser);
        let body = response.body;
        let parsed = tokio::task::spawn_blocking(move || ParsedPage {
            text: parser.extract_text(&body),
            title: parser.extract_title(&body),
            links: parser.extract_links(&body),
        })
        .await;

        let ParsedPage { text, title, links } = match parsed {
            Ok(page) => page,
            Err(e) => {
                error!("Extraction task failed for {}: {}", url, e);
                return CycleOutcome::FetchFailed {
                    url,
                    reason: format!("extraction task failed: {}", e),
                };
            }
        };

        // The duplicate scan and the record fsync block too
        let corpus = Arc::clone(&self.corpus);
        let dedup = self.dedup.clone();
        let page_url = url.to_string();
        let inserted = match tokio::task::spawn_blocking(move || {
            corpus.insert_unless_duplicate(&dedup, &page_url, &title, &text)
        })
        .await
        {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("corpus task failed: {}", e)),
        };

        // Links are followed whether or not the page itself was kept
        let links_enqueued = self.enqueue_links(&links, &response.final_url).await;

        match inserted {
            Ok(InsertOutcome::Stored(document)) => {
                info!(
                    "Saved document {} for {} ({} new links)",
                    document.id, url, links_enqueued
                );
                CycleOutcome::Stored {
                    url,
                    document_id: document.id,
                    links_enqueued,
                }
            }
            Ok(InsertOutcome::Duplicate(found)) => {
                info!(
                    "Skipping near-duplicate {} (similarity {:.2} with {})",
                    url, found.similarity, found.url
                );
                CycleOutcome::Duplicate {
                    url,
                    duplicate_of: found.document_id,
                    links_enqueued,
                }
            }
            Err(reason) => {
                error!("Failed to store {}: {}", url, reason);
                CycleOutcome::StoreFailed { url, reason }
            }
        }
    }

    async fn enqueue_links(&self, raw_links: &[String], base: &url::Url) -> usize {
        let allowed = url_filter::filter_discovered_links(
            raw_links,
            base,
            &self.politeness,
            &self.settings.user_agent,
        )
        .await;

        if allowed.is_empty() {
            return 0;
        }

        match self.frontier.enqueue(allowed) {
            Ok(added) => added,
            Err(e) => {
                error!("Failed to enqueue discovered links: {}", e);
                0
            }
        }
    }

    /// Run the crawl loop until [`stop`](Self::stop) is called or the page
    /// limit is reached. Returns the final statistics.
    pub async fn run(&self) -> CrawlStats {
        if self.stop_requested.load(Ordering::Relaxed) {
            info!("Stop requested before start, not crawling");
            return self.stats();
        }
        self.running.store(true, Ordering::Relaxed);

        let pending = self.frontier.pending_count();
        info!("Starting crawler with {} URLs in queue", pending);
        if pending == 0 {
            warn!("No URLs in queue, waiting for seeds");
        }

        while !self.stop_requested.load(Ordering::Relaxed) {
            let outcome = self.step().await;

            if self.settings.max_pages > 0
                && self.stats.lock().pages_stored >= self.settings.max_pages
            {
                info!("Reached page limit of {}", self.settings.max_pages);
                break;
            }

            if outcome.is_idle() {
                tokio::time::sleep(self.settings.idle_backoff).await;
            }
        }

        self.running.store(false, Ordering::Relaxed);
        let stats = self.stats();
        info!(
            "Crawler stopped: {} stored, {} duplicates, {} failures, {} pending",
            stats.pages_stored, stats.duplicates_rejected, stats.fetch_failures, stats.queue_size
        );
        stats
    }

    /// Ask the loop to exit after the current cycle. Sticky: a later `run`
    /// returns immediately.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::Relaxed);
    }

    /// Check if running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Current counters plus live frontier and corpus sizes
    pub fn stats(&self) -> CrawlStats {
        let mut stats = self.stats.lock().clone();
        stats.queue_size = self.frontier.pending_count();
        stats.crawled_count = self.frontier.crawled_count();
        stats.corpus_size = self.corpus.len();
        stats
    }

    pub fn frontier(&self) -> &Arc<FrontierStore> {
        &self.frontier
    }

    pub fn corpus(&self) -> &Arc<CorpusStore> {
        &self.corpus
    }
}
