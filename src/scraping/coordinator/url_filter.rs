//! URL filtering at dispatch time and for discovered links

use std::collections::HashSet;
use url::Url;

use crate::scraping::{normalize_url, politeness::PolitenessGate, NormalizedUrl};

/// True when the URL path ends in one of `extensions` (case-insensitive).
/// `extensions` are expected lowercase.
pub(super) fn has_skipped_extension(url: &Url, extensions: &[String]) -> bool {
    let path = url.path().to_lowercase();
    extensions.iter().any(|ext| path.ends_with(ext.as_str()))
}

pub(super) fn is_crawlable_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Normalize raw hrefs against `base` and keep the ones robots.txt allows.
///
/// Each normalized URL appears once, in first-seen order. Duplicates against
/// the frontier are left to `FrontierStore::enqueue`.
pub(super) async fn filter_discovered_links(
    raw_links: &[String],
    base: &Url,
    politeness: &PolitenessGate,
    user_agent: &str,
) -> Vec<NormalizedUrl> {
    let mut seen = HashSet::new();
    let mut allowed = Vec::new();

    for raw in raw_links {
        let Some(normalized) = normalize_url(raw, Some(base)) else {
            continue;
        };
        if !seen.insert(normalized.clone()) {
            continue;
        }
        let Some(target) = normalized.to_url() else {
            continue;
        };

        if politeness.can_fetch(&target, user_agent).await {
            allowed.push(normalized);
        }
    }

    allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        [".pdf", ".jpg", ".zip"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_skipped_extension_matches_path_only() {
        let pdf = Url::parse("https://example.com/docs/Manual.PDF").unwrap();
        let html = Url::parse("https://example.com/docs/manual.html").unwrap();
        let query = Url::parse("https://example.com/view?file=a.pdf").unwrap();

        assert!(has_skipped_extension(&pdf, &exts()));
        assert!(!has_skipped_extension(&html, &exts()));
        assert!(!has_skipped_extension(&query, &exts()));
    }

    #[test]
    fn test_crawlable_scheme() {
        assert!(is_crawlable_scheme(&Url::parse("http://a.com/").unwrap()));
        assert!(is_crawlable_scheme(&Url::parse("https://a.com/").unwrap()));
        assert!(!is_crawlable_scheme(&Url::parse("ftp://a.com/").unwrap()));
    }
}
