//! Core types shared between the crawler and the corpus

use serde::{Deserialize, Serialize};

/// Sequential corpus document identifier, assigned in insertion order
pub type DocumentId = u64;

/// On-disk shape of a corpus record, consumed by the downstream index builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Extracted page text. Records written without it load as empty text.
    #[serde(default)]
    pub content: String,
}

/// An accepted page in the corpus
///
/// Immutable once created; ids are never reused.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusDocument {
    pub id: DocumentId,
    pub url: String,
    pub title: String,
    /// Leading slice of the content handed to the search consumer
    pub content_snippet: String,
    /// Full extracted text, used for near-duplicate comparison
    pub full_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_missing_content_defaults_empty() {
        let record: CorpusRecord =
            serde_json::from_str(r#"{"url": "https://example.com/", "title": "Home"}"#).unwrap();
        assert_eq!(record.content, "");
        assert_eq!(record.title, "Home");
    }
}
