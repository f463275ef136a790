//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the single capability contract every
//! backend satisfies. Backends differ in how they rank (keyword overlap vs.
//! cosine distance) and in how they degrade when their primary query path
//! fails, but callers only ever see this shape.
//!
//! Implementations must be `Send + Sync` so one instance can be shared
//! across requests behind an `Arc`.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{CollectionInfo, Document, SearchResult};

/// Tag identifying one of the four backend variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// JSON array file on local disk, keyword scoring.
    File,
    /// Chroma-compatible HTTP vector engine.
    Chroma,
    /// Redis hashes plus a RediSearch vector index.
    Redis,
    /// MariaDB table with a vector (or JSON) column.
    MariaDb,
}

impl StoreKind {
    pub const ALL: [StoreKind; 4] = [Self::File, Self::Chroma, Self::Redis, Self::MariaDb];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Chroma => "chroma",
            Self::Redis => "redis",
            Self::MariaDb => "mariadb",
        }
    }

    /// Parse a configuration selector. Unknown values select [`StoreKind::File`].
    pub fn from_config_value(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "chroma" | "chromadb" => Self::Chroma,
            "redis" => Self::Redis,
            "mariadb" | "mysql" => Self::MariaDb,
            _ => Self::File,
        }
    }

    /// Whether the value names a known backend (used to log silent defaults).
    pub fn is_known(value: &str) -> bool {
        let v = value.trim().to_ascii_lowercase();
        v == "file" || Self::from_config_value(&v) != Self::File
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Abstract retrieval backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`init`](VectorStore::init) | Connect and bootstrap schema |
/// | [`add_documents`](VectorStore::add_documents) | Persist documents, embedding where needed |
/// | [`query_documents`](VectorStore::query_documents) | Ranked retrieval, best first |
/// | [`clear_collection`](VectorStore::clear_collection) | Remove every document, keep the collection usable |
/// | [`get_or_create_collection`](VectorStore::get_or_create_collection) | Idempotent bootstrap, returns name + count |
/// | [`health_check`](VectorStore::health_check) | Side-effect-free readiness check |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Which backend variant this is.
    fn kind(&self) -> StoreKind;

    /// Name of the collection this instance is bound to.
    fn collection_name(&self) -> &str;

    /// Establish connections and create the collection structure.
    async fn init(&self) -> Result<()>;

    /// Append documents to the collection.
    ///
    /// Atomicity across the batch is backend-specific: the file backend
    /// rewrites the whole file once, networked backends insert per document.
    async fn add_documents(&self, docs: &[Document]) -> Result<()>;

    /// Return at most `n_results` entries ranked best-first.
    ///
    /// An empty collection yields an empty [`SearchResult`], never an error.
    async fn query_documents(&self, query: &str, n_results: usize) -> Result<SearchResult>;

    /// Remove all documents. The collection stays queryable afterwards.
    async fn clear_collection(&self) -> Result<()>;

    /// Create the underlying structure on first call; later calls are no-ops.
    async fn get_or_create_collection(&self) -> Result<CollectionInfo>;

    /// Readiness check. Internal errors are reported as `false`.
    async fn health_check(&self) -> bool;

    /// Release connections. Backends without pooled resources do nothing.
    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_value() {
        assert_eq!(StoreKind::from_config_value("chroma"), StoreKind::Chroma);
        assert_eq!(StoreKind::from_config_value(" Redis "), StoreKind::Redis);
        assert_eq!(StoreKind::from_config_value("mariadb"), StoreKind::MariaDb);
        assert_eq!(StoreKind::from_config_value("file"), StoreKind::File);
    }

    #[test]
    fn test_unknown_value_defaults_to_file() {
        assert_eq!(StoreKind::from_config_value("pinecone"), StoreKind::File);
        assert_eq!(StoreKind::from_config_value(""), StoreKind::File);
        assert!(!StoreKind::is_known("pinecone"));
        assert!(StoreKind::is_known("FILE"));
    }

    #[test]
    fn test_as_str_roundtrips_through_config_value() {
        for kind in StoreKind::ALL {
            assert_eq!(StoreKind::from_config_value(kind.as_str()), kind);
        }
    }
}
