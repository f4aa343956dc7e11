use anyhow::Result;
use crawlfront::{config::Config, scraping::normalize_seed};
use tracing::{info, warn};

use super::open_stores;

pub async fn seed_urls(config: Config, url_strings: Vec<String>) -> Result<()> {
    let mut seeds = Vec::with_capacity(url_strings.len());
    for raw in &url_strings {
        match normalize_seed(raw) {
            Some(url) => seeds.push(url),
            None => warn!("Ignoring invalid seed URL: {}", raw),
        }
    }

    if seeds.is_empty() {
        anyhow::bail!("No valid URLs provided");
    }

    let (frontier, _corpus) = open_stores(&config)?;
    let added = frontier.enqueue(seeds)?;

    info!(
        "Seeded {} new URLs ({} now pending)",
        added,
        frontier.pending_count()
    );
    println!("Added {} of {} URLs to the queue", added, url_strings.len());

    Ok(())
}
