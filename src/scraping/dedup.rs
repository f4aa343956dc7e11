//! Near-duplicate content filtering
//!
//! A candidate page is compared against every accepted document using the
//! Jaccard index of their lowercase word-token sets. The corpus keeps each
//! document's token set, so a check tokenizes only the candidate. It is still
//! a linear scan per candidate, fine for a few thousand documents; past that
//! the natural replacement is a shingling + MinHash bucket index.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::types::{CorpusDocument, DocumentId};

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\w+").expect("static regex is valid"))
}

/// Lowercase word-character tokens of `text`, as a set
pub fn tokenize(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    word_regex()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// |A ∩ B| / |A ∪ B|; two empty sets count as identical (1.0)
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }

    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let intersection = small.iter().filter(|t| large.contains(*t)).count();
    let union = a.len() + b.len() - intersection;

    intersection as f64 / union as f64
}

/// The accepted document a rejected candidate collided with
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMatch {
    pub document_id: DocumentId,
    pub url: String,
    pub similarity: f64,
}

/// Rejects pages whose token set is too close to an accepted document
#[derive(Debug, Clone)]
pub struct NearDuplicateFilter {
    /// Similarity strictly above this is a near-duplicate
    threshold: f64,
}

impl NearDuplicateFilter {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// True when `candidate_text` is not a near-duplicate of anything in `corpus`
    pub fn should_accept(&self, candidate_text: &str, corpus: &[CorpusDocument]) -> bool {
        self.find_duplicate(candidate_text, corpus).is_none()
    }

    /// First corpus document whose similarity to the candidate exceeds the threshold
    pub fn find_duplicate(
        &self,
        candidate_text: &str,
        corpus: &[CorpusDocument],
    ) -> Option<DuplicateMatch> {
        if corpus.is_empty() {
            return None;
        }

        let token_sets: Vec<HashSet<String>> =
            corpus.iter().map(|doc| tokenize(&doc.full_text)).collect();
        self.find_duplicate_tokens(
            &tokenize(candidate_text),
            corpus.iter().zip(token_sets.iter()),
        )
    }

    /// Same as [`find_duplicate`](Self::find_duplicate) over token sets
    /// computed in advance
    pub fn find_duplicate_tokens<'a>(
        &self,
        candidate: &HashSet<String>,
        corpus: impl IntoIterator<Item = (&'a CorpusDocument, &'a HashSet<String>)>,
    ) -> Option<DuplicateMatch> {
        corpus.into_iter().find_map(|(doc, tokens)| {
            let similarity = jaccard_similarity(candidate, tokens);
            (similarity > self.threshold).then(|| DuplicateMatch {
                document_id: doc.id,
                url: doc.url.clone(),
                similarity,
            })
        })
    }
}

impl Default for NearDuplicateFilter {
    fn default() -> Self {
        Self::new(0.8)
    }
}
