//! crawlfront: polite, resumable web crawl frontier
//!
//! Seeds a persistent frontier, crawls it under robots.txt and per-domain
//! delay rules, and writes non-duplicate pages to the corpus directory.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crawlfront::config::{Config, LogFormat, LoggingConfig};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use commands::*;

#[derive(Parser)]
#[command(name = "crawlfront")]
#[command(about = "Polite, resumable web crawler with near-duplicate filtering")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "crawlfront.toml")]
    config: PathBuf,

    /// Data directory (overrides storage.data_dir)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the pending queue until interrupted
    Crawl {
        /// Stop after this many stored pages (overrides crawler.max_pages)
        #[arg(short, long)]
        max_pages: Option<u64>,
    },

    /// Add seed URLs to the pending queue
    Seed {
        /// URLs to enqueue (bare hosts get https://)
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Show frontier and corpus statistics
    Stats,
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(config: &LoggingConfig, verbose: u8) -> Result<()> {
    let level = config.level.raised_by(verbose);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .context("Invalid log filter")?;

    let builder = fmt().with_env_filter(filter).with_target(false);
    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    config.validate()?;

    init_logging(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Crawl { max_pages } => run_crawl(config, max_pages).await,
        Commands::Seed { urls } => seed_urls(config, urls).await,
        Commands::Stats => show_stats(config).await,
    }
}
