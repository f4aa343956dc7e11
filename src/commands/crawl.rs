use anyhow::{Context, Result};
use crawlfront::{
    config::Config,
    scraping::{
        fetcher::FetchConfig, CrawlCoordinator, CrawlSettings, HtmlPageParser, HttpFetcher,
        NearDuplicateFilter,
    },
};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use super::open_stores;

pub async fn run_crawl(config: Config, max_pages: Option<u64>) -> Result<()> {
    info!("Starting web crawler...");
    info!("Data directory: {}", config.storage.data_dir.display());

    let (frontier, corpus) = open_stores(&config)?;

    let mut settings = CrawlSettings::from_config(&config);
    if let Some(max_pages) = max_pages {
        settings.max_pages = max_pages;
    }

    let fetcher = HttpFetcher::new(FetchConfig {
        user_agent: config.crawler.user_agent.clone(),
        ..FetchConfig::default()
    })
    .context("Failed to build HTTP client")?;

    let coordinator = Arc::new(CrawlCoordinator::new(
        settings,
        Arc::new(frontier),
        Arc::new(corpus),
        Arc::new(fetcher),
        Arc::new(HtmlPageParser::new()),
        NearDuplicateFilter::new(config.dedup.similarity_threshold),
    ));

    let shutdown = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, finishing current page");
                    coordinator.stop();
                }
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        })
    };

    let stats = coordinator.run().await;
    shutdown.abort();

    println!("\nCrawl Summary");
    println!("=============");
    println!("URLs dispatched:     {}", stats.urls_dispatched);
    println!("Pages stored:        {}", stats.pages_stored);
    println!("Duplicates rejected: {}", stats.duplicates_rejected);
    println!("Non-HTML skipped:    {}", stats.non_html_skipped + stats.extension_skipped);
    println!("Fetch failures:      {}", stats.fetch_failures);
    println!("Links enqueued:      {}", stats.links_enqueued);
    println!("Pending URLs:        {}", stats.queue_size);
    println!("Corpus documents:    {}", stats.corpus_size);

    Ok(())
}
