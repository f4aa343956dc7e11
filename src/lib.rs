//! crawlfront: polite, resumable web crawl frontier
//!
//! Decides which URL to fetch next under robots.txt and per-domain delay
//! constraints, persists the pending queue, crawled set and domain timings so
//! a restarted crawl resumes where it stopped, and keeps near-duplicate pages
//! out of the corpus handed to the downstream index builder.

pub mod config;
pub mod corpus;
pub mod scraping;
pub mod types;
pub mod util;

pub use config::Config;
pub use corpus::{CorpusError, CorpusStore, InsertOutcome};
pub use types::*;
