//! Persistent crawl frontier
//!
//! Owns three pieces of state, each mirrored to a flat file:
//! - the pending queue (`to_crawl.txt`), FIFO by insertion order
//! - the crawled set (`crawled.txt`), append-only
//! - per-domain last dispatch times (`domain_timing.txt`, `domain<TAB>secs`)
//!
//! A URL is in at most one of pending/crawled and never pending twice. All
//! mutation goes through [`FrontierStore::take_next`] and
//! [`FrontierStore::enqueue`], which share one lock, write to disk first and
//! only then update memory.
//!
//! `take_next` persists in a fixed order: append to the crawled file, rewrite
//! the pending file, rewrite the timing file. Loading drops pending entries
//! that are already crawled, so an interrupted dispatch always reloads as
//! "crawled" and never as "in both" or "in neither".

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::politeness::is_domain_ready;
use super::NormalizedUrl;
use crate::util::write_atomic;

const PENDING_FILE: &str = "to_crawl.txt";
const CRAWLED_FILE: &str = "crawled.txt";
const DOMAIN_TIMING_FILE: &str = "domain_timing.txt";

/// Rate-limited domains logged per scan
const RATE_LIMIT_LOG_LIMIT: usize = 3;

/// Errors from the frontier's persisted state
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("Frontier store unavailable at {}: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to persist {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A queued URL with its politeness domain precomputed
#[derive(Debug, Clone)]
struct PendingEntry {
    url: NormalizedUrl,
    domain: String,
}

impl PendingEntry {
    fn new(url: NormalizedUrl) -> Self {
        let domain = url.domain();
        Self { url, domain }
    }
}

#[derive(Debug, Default)]
struct FrontierState {
    pending: VecDeque<PendingEntry>,
    pending_set: HashSet<NormalizedUrl>,
    crawled: HashSet<NormalizedUrl>,
    domain_timing: BTreeMap<String, f64>,
}

impl FrontierState {
    fn is_known(&self, url: &NormalizedUrl) -> bool {
        self.pending_set.contains(url) || self.crawled.contains(url)
    }

    /// Index of the first pending URL whose domain is past its delay
    fn first_ready(&self, now: f64, min_delay_secs: f64) -> Option<usize> {
        let mut rate_limited = 0;

        for (idx, entry) in self.pending.iter().enumerate() {
            let last_fetch = self.domain_timing.get(&entry.domain).copied();
            if is_domain_ready(last_fetch, now, min_delay_secs) {
                debug!(
                    "Selected URL from domain {} (last crawled {:.1}s ago)",
                    entry.domain,
                    now - last_fetch.unwrap_or(0.0)
                );
                return Some(idx);
            }

            rate_limited += 1;
            if rate_limited <= RATE_LIMIT_LOG_LIMIT {
                debug!(
                    "Rate limiting {}: only {:.1}s since last crawl",
                    entry.domain,
                    now - last_fetch.unwrap_or(0.0)
                );
            }
        }

        if rate_limited > 0 {
            debug!("All {} URLs rate-limited, waiting...", rate_limited);
        }
        None
    }

    fn pending_lines<'a>(entries: impl Iterator<Item = &'a PendingEntry>) -> String {
        let mut out = String::new();
        for entry in entries {
            out.push_str(entry.url.as_str());
            out.push('\n');
        }
        out
    }

    fn timing_lines(timing: &BTreeMap<String, f64>) -> String {
        let mut out = String::new();
        for (domain, ts) in timing {
            out.push_str(&format!("{}\t{}\n", domain, ts));
        }
        out
    }
}

/// File-backed frontier shared by every crawl worker
pub struct FrontierStore {
    dir: PathBuf,
    min_delay_secs: f64,
    state: Mutex<FrontierState>,
}

impl FrontierStore {
    /// Open (or create) the frontier files in `dir`.
    ///
    /// Fails if the directory or any store file cannot be created or written;
    /// callers treat that as fatal.
    pub fn open(dir: impl AsRef<Path>, min_delay_secs: f64) -> Result<Self, FrontierError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| FrontierError::Unavailable {
            path: dir.clone(),
            source,
        })?;

        for name in [PENDING_FILE, CRAWLED_FILE, DOMAIN_TIMING_FILE] {
            let path = dir.join(name);
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| FrontierError::Unavailable { path, source })?;
        }

        let store = Self {
            dir,
            min_delay_secs,
            state: Mutex::new(FrontierState::default()),
        };
        store.load()?;
        Ok(store)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn read(&self, name: &str) -> Result<String, FrontierError> {
        let path = self.path(name);
        fs::read_to_string(&path).map_err(|source| FrontierError::Unavailable { path, source })
    }

    fn load(&self) -> Result<(), FrontierError> {
        let mut state = FrontierState::default();

        // Crawled set. A last line without '\n' is a torn append and is dropped.
        let crawled_raw = self.read(CRAWLED_FILE)?;
        let torn_tail = !crawled_raw.is_empty() && !crawled_raw.ends_with('\n');
        let mut crawled_lines: Vec<&str> = crawled_raw.lines().collect();
        if torn_tail {
            if let Some(partial) = crawled_lines.pop() {
                warn!("Dropping incomplete crawled entry: {:?}", partial);
            }
        }
        for line in crawled_lines {
            let line = line.trim();
            if !line.is_empty() {
                state
                    .crawled
                    .insert(NormalizedUrl::from_persisted(line.to_string()));
            }
        }
        if torn_tail {
            let mut entries: Vec<&str> = state.crawled.iter().map(|u| u.as_str()).collect();
            entries.sort_unstable();
            let mut contents = entries.join("\n");
            if !contents.is_empty() {
                contents.push('\n');
            }
            self.write_file(CRAWLED_FILE, &contents)?;
        }

        // Pending queue, reconciled against the crawled set
        let pending_raw = self.read(PENDING_FILE)?;
        let mut repaired = false;
        for line in pending_raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let url = NormalizedUrl::from_persisted(line.to_string());
            if state.is_known(&url) {
                repaired = true;
                continue;
            }
            state.pending_set.insert(url.clone());
            state.pending.push_back(PendingEntry::new(url));
        }
        if repaired {
            info!("Repaired pending queue: dropped entries already crawled or duplicated");
            let contents = FrontierState::pending_lines(state.pending.iter());
            self.write_file(PENDING_FILE, &contents)?;
        }

        // Domain timings
        let timing_raw = self.read(DOMAIN_TIMING_FILE)?;
        for line in timing_raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((domain, ts)) = line.split_once('\t') else {
                warn!("Skipping malformed domain timing line: {:?}", line);
                continue;
            };
            let Ok(ts) = ts.trim().parse::<f64>() else {
                warn!("Skipping domain timing with bad timestamp: {:?}", line);
                continue;
            };
            let entry = state.domain_timing.entry(domain.to_string()).or_insert(ts);
            *entry = entry.max(ts);
        }

        info!(
            "Loaded frontier: {} pending, {} crawled, {} domains",
            state.pending.len(),
            state.crawled.len(),
            state.domain_timing.len()
        );

        *self.state.lock() = state;
        Ok(())
    }

    fn write_file(&self, name: &str, contents: &str) -> Result<(), FrontierError> {
        let path = self.path(name);
        write_atomic(&path, contents.as_bytes())
            .map_err(|source| FrontierError::Persist { path, source })
    }

    fn append_crawled(&self, url: &NormalizedUrl) -> Result<(), FrontierError> {
        let path = self.path(CRAWLED_FILE);
        let result = OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut file| {
                file.write_all(format!("{}\n", url).as_bytes())?;
                file.sync_data()
            });
        result.map_err(|source| FrontierError::Persist { path, source })
    }

    /// Take the first pending URL whose domain is ready at `now`.
    ///
    /// The URL moves from pending to crawled and its domain's timing becomes
    /// `now`, as one step. `Ok(None)` means the queue is empty or every queued
    /// domain is still inside its delay window.
    pub fn take_next(&self, now: f64) -> Result<Option<NormalizedUrl>, FrontierError> {
        let mut state = self.state.lock();

        let Some(idx) = state.first_ready(now, self.min_delay_secs) else {
            if state.pending.is_empty() {
                debug!("No URLs available to crawl");
            }
            return Ok(None);
        };

        let entry = state.pending[idx].clone();
        let mut timing = state.domain_timing.clone();
        timing.insert(entry.domain.clone(), now);

        let remaining = state
            .pending
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, e)| e);
        let pending_contents = FrontierState::pending_lines(remaining);
        let timing_contents = FrontierState::timing_lines(&timing);

        self.append_crawled(&entry.url)?;
        self.write_file(PENDING_FILE, &pending_contents)?;
        self.write_file(DOMAIN_TIMING_FILE, &timing_contents)?;

        state.pending.remove(idx);
        state.pending_set.remove(&entry.url);
        state.crawled.insert(entry.url.clone());
        state.domain_timing = timing;

        debug!("Removed URL from queue, {} remaining", state.pending.len());
        Ok(Some(entry.url))
    }

    /// Append URLs not already pending or crawled, in input order, once each.
    ///
    /// Returns how many were added.
    pub fn enqueue<I>(&self, urls: I) -> Result<usize, FrontierError>
    where
        I: IntoIterator<Item = NormalizedUrl>,
    {
        let mut state = self.state.lock();

        let mut batch_seen: HashSet<NormalizedUrl> = HashSet::new();
        let mut added: Vec<PendingEntry> = Vec::new();
        let mut duplicates = 0usize;

        for url in urls {
            if state.is_known(&url) || !batch_seen.insert(url.clone()) {
                duplicates += 1;
                continue;
            }
            added.push(PendingEntry::new(url));
        }

        if added.is_empty() {
            debug!("No new URLs to add ({} were duplicates)", duplicates);
            return Ok(0);
        }

        let contents = FrontierState::pending_lines(state.pending.iter().chain(added.iter()));
        self.write_file(PENDING_FILE, &contents)?;

        let count = added.len();
        for entry in added {
            state.pending_set.insert(entry.url.clone());
            state.pending.push_back(entry);
        }

        info!("Added {} new URLs to queue", count);
        if duplicates > 0 {
            debug!("Skipped {} duplicate URLs", duplicates);
        }
        Ok(count)
    }

    /// Whether `domain` may be dispatched at `now`
    pub fn is_domain_ready(&self, domain: &str, now: f64) -> bool {
        let state = self.state.lock();
        is_domain_ready(
            state.domain_timing.get(domain).copied(),
            now,
            self.min_delay_secs,
        )
    }

    /// Last dispatch time recorded for `domain`
    pub fn last_fetch(&self, domain: &str) -> Option<f64> {
        self.state.lock().domain_timing.get(domain).copied()
    }

    pub fn is_pending(&self, url: &NormalizedUrl) -> bool {
        self.state.lock().pending_set.contains(url)
    }

    pub fn is_crawled(&self, url: &NormalizedUrl) -> bool {
        self.state.lock().crawled.contains(url)
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn crawled_count(&self) -> usize {
        self.state.lock().crawled.len()
    }

    pub fn domain_count(&self) -> usize {
        self.state.lock().domain_timing.len()
    }

    /// Copy of the pending queue in dispatch order
    pub fn pending_urls(&self) -> Vec<NormalizedUrl> {
        self.state
            .lock()
            .pending
            .iter()
            .map(|e| e.url.clone())
            .collect()
    }
}
