mod crawl;
mod seed;
mod stats;

pub use crawl::run_crawl;
pub use seed::seed_urls;
pub use stats::show_stats;

use anyhow::{Context, Result};
use crawlfront::{config::Config, scraping::FrontierStore, CorpusStore};

/// Open both persisted stores. Failure here is fatal for every command.
pub(crate) fn open_stores(config: &Config) -> Result<(FrontierStore, CorpusStore)> {
    let frontier = FrontierStore::open(
        config.storage.frontier_dir(),
        config.crawler.min_delay_secs,
    )
    .context("Failed to open frontier store")?;

    let corpus = CorpusStore::open(config.storage.corpus_dir(), config.dedup.snippet_chars)
        .context("Failed to open corpus store")?;

    Ok((frontier, corpus))
}
