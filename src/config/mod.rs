//! Configuration for crawlfront

mod crawler;
mod logging;
mod storage;

pub use crawler::{CrawlerConfig, DedupConfig};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use storage::StorageConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default user agent for page fetches and robots.txt matching
pub const DEFAULT_USER_AGENT: &str = "crawlfront/0.1";

/// Top-level configuration, loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Persistent state locations
    #[serde(default)]
    pub storage: StorageConfig,
    /// Crawl loop and politeness settings
    #[serde(default)]
    pub crawler: CrawlerConfig,
    /// Near-duplicate filter settings
    #[serde(default)]
    pub dedup: DedupConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate all configuration fields.
    ///
    /// Collects every problem and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        let crawler = &self.crawler;
        if crawler.user_agent.trim().is_empty() {
            errors.push("user_agent must not be empty".to_string());
        }
        if !crawler.min_delay_secs.is_finite() || crawler.min_delay_secs < 0.0 {
            errors.push("min_delay_secs must be a non-negative number".to_string());
        }
        if crawler.idle_backoff_ms == 0 {
            errors.push("idle_backoff_ms must be positive".to_string());
        }
        if crawler.robots_timeout_secs == 0 {
            errors.push("robots_timeout_secs must be positive".to_string());
        }
        if crawler.head_timeout_secs == 0 {
            errors.push("head_timeout_secs must be positive".to_string());
        }
        if crawler.fetch_timeout_secs == 0 {
            errors.push("fetch_timeout_secs must be positive".to_string());
        }
        for ext in &crawler.skip_extensions {
            if !ext.starts_with('.') {
                errors.push(format!("skip extension '{}' must start with '.'", ext));
            }
        }

        if !(0.0..=1.0).contains(&self.dedup.similarity_threshold) {
            errors.push("similarity_threshold must be between 0.0 and 1.0".to_string());
        }
        if self.dedup.snippet_chars == 0 {
            errors.push("snippet_chars must be positive".to_string());
        }

        if self.storage.data_dir.as_os_str().is_empty() {
            errors.push("data_dir must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Invalid configuration:\n  - {}",
                errors.join("\n  - ")
            ))
        }
    }
}
