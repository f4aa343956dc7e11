use anyhow::Result;
use crawlfront::config::Config;

use super::open_stores;

pub async fn show_stats(config: Config) -> Result<()> {
    let (frontier, corpus) = open_stores(&config)?;

    println!("\nCrawl Frontier Statistics");
    println!("=========================");
    println!("Data directory:   {}", config.storage.data_dir.display());
    println!("Pending URLs:     {}", frontier.pending_count());
    println!("Crawled URLs:     {}", frontier.crawled_count());
    println!("Known domains:    {}", frontier.domain_count());
    println!("Corpus documents: {}", corpus.len());
    println!("Next document id: {}", corpus.next_id());

    let pending = frontier.pending_urls();
    if !pending.is_empty() {
        println!("\nNext in queue:");
        for url in pending.iter().take(5) {
            println!("  {}", url);
        }
        if pending.len() > 5 {
            println!("  ... and {} more", pending.len() - 5);
        }
    }

    Ok(())
}
