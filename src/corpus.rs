//! Persistent corpus of accepted pages
//!
//! One JSON record per document (`page_<id>.json`), ids assigned sequentially
//! from 1 and never reused. The downstream index builder reads these files
//! directly.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::scraping::dedup::{tokenize, DuplicateMatch, NearDuplicateFilter};
use crate::types::{CorpusDocument, CorpusRecord, DocumentId};
use crate::util::{truncate_chars, write_atomic};

const RECORD_PREFIX: &str = "page_";
const RECORD_SUFFIX: &str = ".json";
const WRITE_PROBE: &str = ".write_probe";

/// Errors from the corpus directory
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Corpus store unavailable at {}: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write corpus record {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to serialize corpus record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result of offering a page to the corpus
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Stored(CorpusDocument),
    Duplicate(DuplicateMatch),
}

struct CorpusState {
    documents: Vec<CorpusDocument>,
    /// Word-token set of each document, same order as `documents`
    token_sets: Vec<HashSet<String>>,
    next_id: DocumentId,
}

/// File-backed corpus
pub struct CorpusStore {
    dir: PathBuf,
    snippet_chars: usize,
    state: RwLock<CorpusState>,
}

fn record_id(file_name: &str) -> Option<DocumentId> {
    file_name
        .strip_prefix(RECORD_PREFIX)?
        .strip_suffix(RECORD_SUFFIX)?
        .parse()
        .ok()
}

impl CorpusStore {
    /// Open (or create) the corpus directory and load every record in id order.
    ///
    /// Unreadable or invalid records are skipped with a warning, but their ids
    /// stay reserved.
    pub fn open(dir: impl AsRef<Path>, snippet_chars: usize) -> Result<Self, CorpusError> {
        let dir = dir.as_ref().to_path_buf();
        let unavailable = |source| CorpusError::Unavailable {
            path: dir.clone(),
            source,
        };

        fs::create_dir_all(&dir).map_err(unavailable)?;

        // Fail now rather than on the first accepted page
        let probe = dir.join(WRITE_PROBE);
        write_atomic(&probe, b"").map_err(unavailable)?;
        fs::remove_file(&probe).map_err(unavailable)?;

        let mut ids: Vec<DocumentId> = fs::read_dir(&dir)
            .map_err(unavailable)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().and_then(record_id))
            .collect();
        ids.sort_unstable();

        let next_id = ids.last().map(|id| id + 1).unwrap_or(1);
        let mut documents = Vec::with_capacity(ids.len());
        let mut token_sets = Vec::with_capacity(ids.len());

        for id in ids {
            let path = dir.join(format!("{}{}{}", RECORD_PREFIX, id, RECORD_SUFFIX));
            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Skipping unreadable corpus record {}: {}", path.display(), e);
                    continue;
                }
            };
            let record: CorpusRecord = match serde_json::from_str(&raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping invalid corpus record {}: {}", path.display(), e);
                    continue;
                }
            };

            token_sets.push(tokenize(&record.content));
            documents.push(CorpusDocument {
                id,
                content_snippet: truncate_chars(&record.content, snippet_chars),
                url: record.url,
                title: record.title,
                full_text: record.content,
            });
        }

        info!(
            "Loaded corpus: {} documents, next id {}",
            documents.len(),
            next_id
        );

        Ok(Self {
            dir,
            snippet_chars,
            state: RwLock::new(CorpusState {
                documents,
                token_sets,
                next_id,
            }),
        })
    }

    fn record_path(&self, id: DocumentId) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", RECORD_PREFIX, id, RECORD_SUFFIX))
    }

    fn write_record(
        &self,
        state: &mut CorpusState,
        url: &str,
        title: &str,
        content: &str,
        tokens: HashSet<String>,
    ) -> Result<CorpusDocument, CorpusError> {
        let id = state.next_id;
        let record = CorpusRecord {
            url: url.to_string(),
            title: title.to_string(),
            content: content.to_string(),
        };
        let json = serde_json::to_string_pretty(&record)?;
        let path = self.record_path(id);
        write_atomic(&path, json.as_bytes())
            .map_err(|source| CorpusError::Write { path, source })?;

        let document = CorpusDocument {
            id,
            url: record.url,
            title: record.title,
            content_snippet: truncate_chars(content, self.snippet_chars),
            full_text: record.content,
        };
        state.next_id += 1;
        state.documents.push(document.clone());
        state.token_sets.push(tokens);

        debug!("Saved corpus record {} for {}", id, url);
        Ok(document)
    }

    /// Store a page unconditionally and return the new document
    pub fn append(&self, url: &str, title: &str, content: &str) -> Result<CorpusDocument, CorpusError> {
        let tokens = tokenize(content);
        let mut state = self.state.write();
        self.write_record(&mut state, url, title, content, tokens)
    }

    /// Store a page unless `filter` finds it too close to an existing document.
    ///
    /// The duplicate scan and the write happen under one lock, so two
    /// concurrent near-identical pages cannot both be accepted. The scan and
    /// the fsync both block; async callers run this on the blocking pool.
    pub fn insert_unless_duplicate(
        &self,
        filter: &NearDuplicateFilter,
        url: &str,
        title: &str,
        content: &str,
    ) -> Result<InsertOutcome, CorpusError> {
        let candidate = tokenize(content);
        let mut state = self.state.write();

        let existing = state.documents.iter().zip(&state.token_sets);
        if let Some(found) = filter.find_duplicate_tokens(&candidate, existing) {
            return Ok(InsertOutcome::Duplicate(found));
        }

        self.write_record(&mut state, url, title, content, candidate)
            .map(InsertOutcome::Stored)
    }

    /// Run `f` over the current documents without copying them
    pub fn with_documents<R>(&self, f: impl FnOnce(&[CorpusDocument]) -> R) -> R {
        f(&self.state.read().documents)
    }

    pub fn get(&self, id: DocumentId) -> Option<CorpusDocument> {
        self.state
            .read()
            .documents
            .iter()
            .find(|doc| doc.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id the next stored document will get
    pub fn next_id(&self) -> DocumentId {
        self.state.read().next_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let dir = TempDir::new().unwrap();
        let store = CorpusStore::open(dir.path(), 500).unwrap();

        let first = store.append("https://a.com/", "A", "alpha").unwrap();
        let second = store.append("https://b.com/", "B", "beta").unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.len(), 2);
        assert!(dir.path().join("page_1.json").exists());
        assert!(dir.path().join("page_2.json").exists());
    }

    #[test]
    fn test_record_file_shape() {
        let dir = TempDir::new().unwrap();
        let store = CorpusStore::open(dir.path(), 500).unwrap();
        store.append("https://a.com/x", "Title", "body text").unwrap();

        let raw = fs::read_to_string(dir.path().join("page_1.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["url"], "https://a.com/x");
        assert_eq!(value["title"], "Title");
        assert_eq!(value["content"], "body text");
    }

    #[test]
    fn test_snippet_is_truncated() {
        let dir = TempDir::new().unwrap();
        let store = CorpusStore::open(dir.path(), 5).unwrap();
        let doc = store.append("https://a.com/", "", "abcdefghij").unwrap();

        assert_eq!(doc.content_snippet, "abcde");
        assert_eq!(doc.full_text, "abcdefghij");
    }

    #[test]
    fn test_reopen_continues_ids() {
        let dir = TempDir::new().unwrap();
        {
            let store = CorpusStore::open(dir.path(), 500).unwrap();
            store.append("https://a.com/", "A", "alpha").unwrap();
            store.append("https://b.com/", "B", "beta").unwrap();
        }

        let store = CorpusStore::open(dir.path(), 500).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(2).unwrap().full_text, "beta");

        let next = store.append("https://c.com/", "C", "gamma").unwrap();
        assert_eq!(next.id, 3);
    }

    #[test]
    fn test_invalid_records_are_skipped_but_ids_reserved() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("page_1.json"), r#"{"url": "https://a.com/"}"#).unwrap();
        fs::write(dir.path().join("page_4.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = CorpusStore::open(dir.path(), 500).unwrap();
        assert_eq!(store.len(), 1);

        // Missing content loads as empty text
        let doc = store.get(1).unwrap();
        assert_eq!(doc.full_text, "");
        assert_eq!(doc.title, "");

        assert_eq!(store.next_id(), 5);
    }

    #[test]
    fn test_insert_unless_duplicate() {
        let dir = TempDir::new().unwrap();
        let store = CorpusStore::open(dir.path(), 500).unwrap();
        let filter = NearDuplicateFilter::new(0.8);

        let first = store
            .insert_unless_duplicate(&filter, "https://a.com/", "", "the quick brown fox")
            .unwrap();
        assert!(matches!(first, InsertOutcome::Stored(ref doc) if doc.id == 1));

        let second = store
            .insert_unless_duplicate(&filter, "https://b.com/", "", "The quick, brown fox!")
            .unwrap();
        match second {
            InsertOutcome::Duplicate(found) => {
                assert_eq!(found.document_id, 1);
                assert_eq!(found.url, "https://a.com/");
            }
            other => panic!("expected duplicate, got {:?}", other),
        }

        let third = store
            .insert_unless_duplicate(&filter, "https://c.com/", "", "the quick brown fox jumps")
            .unwrap();
        assert!(matches!(third, InsertOutcome::Stored(ref doc) if doc.id == 2));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_reopened_records_take_part_in_duplicate_check() {
        let dir = TempDir::new().unwrap();
        {
            let store = CorpusStore::open(dir.path(), 500).unwrap();
            store.append("https://a.com/", "A", "handmade wooden toys for sale").unwrap();
        }

        let store = CorpusStore::open(dir.path(), 500).unwrap();
        let filter = NearDuplicateFilter::new(0.8);
        let outcome = store
            .insert_unless_duplicate(&filter, "https://mirror.com/", "A", "Handmade wooden toys, for sale!")
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::Duplicate(ref found) if found.document_id == 1));
        assert_eq!(store.next_id(), 2);
    }

    #[test]
    fn test_concurrent_near_identical_inserts_store_one() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(CorpusStore::open(dir.path(), 500).unwrap());
        let filter = NearDuplicateFilter::new(0.8);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                let filter = filter.clone();
                std::thread::spawn(move || {
                    store
                        .insert_unless_duplicate(&filter, &format!("https://m{}.com/", i), "", "one page many mirrors")
                        .unwrap()
                })
            })
            .collect();

        let stored = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| matches!(o, InsertOutcome::Stored(_)))
            .count();
        assert_eq!(stored, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_open_fails_when_path_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("processed");
        fs::write(&blocker, "file").unwrap();

        let result = CorpusStore::open(&blocker, 500);
        assert!(matches!(result, Err(CorpusError::Unavailable { .. })));
    }
}
