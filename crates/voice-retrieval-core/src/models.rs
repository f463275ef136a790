//! Core data models for the retrieval layer.
//!
//! These types flow between the upload/generate layer, the retrieval
//! facade, and every store backend. They serialize to the JSON shapes the
//! HTTP layer returns, so field names are part of the external contract.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Free-form document metadata (scalar or nested JSON values).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Default number of results returned by a query.
pub const DEFAULT_N_RESULTS: usize = 4;

/// Default collection name when none is configured.
pub const DEFAULT_COLLECTION: &str = "writing_samples";

/// A unit of retrievable text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique within a collection.
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Serialize metadata as a JSON object string for engines that store it as text.
    pub fn metadata_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.metadata)?)
    }
}

/// Reject a batch that would violate the document invariants.
///
/// Ids must be non-empty and unique within the batch; text must be non-empty.
pub fn validate_batch(docs: &[Document]) -> Result<()> {
    let mut seen = std::collections::HashSet::with_capacity(docs.len());
    for doc in docs {
        if doc.id.is_empty() {
            return Err(StoreError::invalid_input("document id must not be empty"));
        }
        if doc.text.trim().is_empty() {
            return Err(StoreError::invalid_input(format!(
                "document '{}' has empty text",
                doc.id
            )));
        }
        if !seen.insert(doc.id.as_str()) {
            return Err(StoreError::invalid_input(format!(
                "duplicate document id '{}' in batch",
                doc.id
            )));
        }
    }
    Ok(())
}

/// Ranked query output as three parallel sequences.
///
/// Index `i` of `documents`, `metadatas`, and `distances` always refers to
/// the same stored document; the only way to grow a result is [`push`](Self::push).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub documents: Vec<String>,
    pub metadatas: Vec<Metadata>,
    /// Lower is more similar. Cosine distance for vector backends,
    /// `1 - overlap` for keyword scoring, fixed constants in degraded mode.
    pub distances: Vec<f64>,
}

impl SearchResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            documents: Vec::with_capacity(n),
            metadatas: Vec::with_capacity(n),
            distances: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, text: impl Into<String>, metadata: Metadata, distance: f64) {
        self.documents.push(text.into());
        self.metadatas.push(metadata);
        self.distances.push(distance);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Drop everything past the first `n` entries.
    pub fn truncate(&mut self, n: usize) {
        self.documents.truncate(n);
        self.metadatas.truncate(n);
        self.distances.truncate(n);
    }

    /// Build a result from engine-provided parallel arrays, repairing
    /// length mismatches by truncating to the shortest sequence.
    pub fn from_parallel(
        documents: Vec<String>,
        metadatas: Vec<Metadata>,
        distances: Vec<f64>,
    ) -> Self {
        let n = documents.len().min(metadatas.len()).min(distances.len());
        let mut result = Self {
            documents,
            metadatas,
            distances,
        };
        result.truncate(n);
        result
    }
}

/// Decode a stored metadata JSON string. Missing or malformed input is empty.
pub fn parse_metadata(raw: Option<&str>) -> Metadata {
    raw.and_then(|s| serde_json::from_str::<Metadata>(s).ok())
        .unwrap_or_default()
}

/// Name and size of a collection as reported by its backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_sequences_parallel() {
        let mut r = SearchResult::empty();
        r.push("a", Metadata::new(), 0.1);
        r.push("b", Metadata::new(), 0.2);
        assert_eq!(r.len(), 2);
        assert_eq!(r.metadatas.len(), 2);
        assert_eq!(r.distances, vec![0.1, 0.2]);
    }

    #[test]
    fn test_from_parallel_truncates_to_shortest() {
        let r = SearchResult::from_parallel(
            vec!["a".into(), "b".into(), "c".into()],
            vec![Metadata::new(), Metadata::new()],
            vec![0.1, 0.2, 0.3],
        );
        assert_eq!(r.len(), 2);
        assert_eq!(r.distances.len(), 2);
    }

    #[test]
    fn test_empty_result_serializes_to_three_empty_arrays() {
        let json = serde_json::to_value(SearchResult::empty()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"documents": [], "metadatas": [], "distances": []})
        );
    }

    #[test]
    fn test_document_metadata_defaults_to_empty() {
        let doc: Document = serde_json::from_str(r#"{"id":"1","text":"hello"}"#).unwrap();
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.metadata_json().unwrap(), "{}");
    }

    #[test]
    fn test_parse_metadata_is_lenient() {
        assert_eq!(parse_metadata(Some(r#"{"source":"a.txt"}"#))["source"], "a.txt");
        assert!(parse_metadata(Some("{broken")).is_empty());
        assert!(parse_metadata(Some("[1, 2]")).is_empty());
        assert!(parse_metadata(None).is_empty());
    }

    #[test]
    fn test_validate_batch() {
        let ok = vec![Document::new("1", "a"), Document::new("2", "b")];
        assert!(validate_batch(&ok).is_ok());

        let dup = vec![Document::new("1", "a"), Document::new("1", "b")];
        assert!(matches!(
            validate_batch(&dup),
            Err(StoreError::InvalidInput(_))
        ));

        let blank = vec![Document::new("1", "   ")];
        assert!(validate_batch(&blank).is_err());

        let no_id = vec![Document::new("", "text")];
        assert!(validate_batch(&no_id).is_err());
    }
}
