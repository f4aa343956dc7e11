//! Crawl frontier subsystem
//!
//! Decides which URL to fetch next under politeness constraints, records what
//! has been fetched, filters near-duplicate content, and feeds discovered
//! links back into the frontier.
//!
//! Key components:
//! - `normalize_url`: canonical form used for every frontier membership test
//! - `PolitenessGate`: robots.txt cache and per-domain delay check
//! - `FrontierStore`: persistent pending queue, crawled set and domain timings
//! - `NearDuplicateFilter`: Jaccard token-set similarity against the corpus
//! - `FetchService` / `PageParser`: network and HTML collaborators
//! - `CrawlCoordinator`: the crawl loop tying everything together

pub mod coordinator;
pub mod dedup;
pub mod extractor;
pub mod fetcher;
pub mod frontier;
pub mod politeness;

pub use coordinator::{CrawlCoordinator, CrawlSettings, CrawlStats, CycleOutcome};
pub use dedup::NearDuplicateFilter;
pub use extractor::{HtmlPageParser, PageParser};
pub use fetcher::{FetchError, FetchResponse, FetchService, HttpFetcher};
pub use frontier::{FrontierError, FrontierStore};
pub use politeness::{PolitenessGate, RobotsPolicy, RobotsRules};

use std::fmt;
use url::Url;

/// An absolute http(s) URL with its fragment removed
///
/// Only produced by [`normalize_url`] (or loaded back from frontier files that
/// were written from normalized values), so two values compare equal exactly
/// when they name the same frontier entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    /// Wrap a string read back from the frontier's own files
    pub(crate) fn from_persisted(url: String) -> Self {
        Self(url)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Politeness domain of this URL (see [`domain_of`])
    pub fn domain(&self) -> String {
        Url::parse(&self.0)
            .map(|u| domain_of(&u))
            .unwrap_or_default()
    }

    pub fn to_url(&self) -> Option<Url> {
        Url::parse(&self.0).ok()
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a URL for frontier membership
///
/// - Resolves `raw` against `base` when it is relative
/// - Strips the fragment
/// - Rejects anything that is not http or https
///
/// The query string is left untouched: distinct queries are distinct URLs.
pub fn normalize_url(raw: &str, base: Option<&Url>) -> Option<NormalizedUrl> {
    let raw = raw.trim();
    let parsed = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    let mut normalized = parsed;
    normalized.set_fragment(None);
    Some(NormalizedUrl(normalized.into()))
}

/// Normalize a user-supplied seed. Bare hosts such as `example.com/docs`
/// get an `https://` scheme.
pub fn normalize_seed(raw: &str) -> Option<NormalizedUrl> {
    let raw = raw.trim();
    if raw.contains("://") {
        normalize_url(raw, None)
    } else {
        normalize_url(&format!("https://{}", raw), None)
    }
}

/// Politeness domain of a URL: scheme, host and (non-default) port
pub fn domain_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}
