//! Flat-file keyword [`VectorStore`].
//!
//! The whole collection lives in one JSON array file,
//! `{data_dir}/{collection}.json`, which is read on every operation and
//! rewritten whole on every write. There is no index: queries score every
//! document with substring overlap (see [`voice_retrieval_core::keyword`]).
//!
//! This is the default backend and the factory's fallback, so reads are
//! lenient: a missing or corrupt file is an empty collection.
//!
//! Concurrent `add_documents` calls are last-write-wins; two writers that
//! load the same snapshot lose one batch.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};

use voice_retrieval_core::keyword::rank_with_placeholder;
use voice_retrieval_core::models::validate_batch;
use voice_retrieval_core::{
    CollectionInfo, Document, Result, SearchResult, StoreKind, VectorStore,
};

/// JSON-file implementation of [`VectorStore`].
pub struct FileStore {
    dir: PathBuf,
    collection: String,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, collection: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            collection: collection.into(),
        }
    }

    /// Path of the backing JSON file.
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.collection))
    }

    async fn load(&self) -> Result<Vec<Document>> {
        let path = self.file_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice::<Vec<Document>>(&bytes) {
            Ok(docs) => Ok(docs),
            Err(e) => {
                warn!(
                    backend = "file",
                    path = %path.display(),
                    error = %e,
                    "store file is corrupt, treating collection as empty"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, docs: &[Document]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(docs)?;
        let path = self.file_path();
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for FileStore {
    fn kind(&self) -> StoreKind {
        StoreKind::File
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        self.get_or_create_collection().await?;
        Ok(())
    }

    async fn add_documents(&self, docs: &[Document]) -> Result<()> {
        validate_batch(docs)?;
        let mut stored = self.load().await?;
        for doc in docs {
            match stored.iter_mut().find(|d| d.id == doc.id) {
                Some(existing) => *existing = doc.clone(),
                None => stored.push(doc.clone()),
            }
        }
        self.save(&stored).await?;
        debug!(
            backend = "file",
            added = docs.len(),
            total = stored.len(),
            "documents saved"
        );
        Ok(())
    }

    async fn query_documents(&self, query: &str, n_results: usize) -> Result<SearchResult> {
        let docs = self.load().await?;
        if docs.is_empty() || n_results == 0 {
            return Ok(SearchResult::empty());
        }

        let ranked = rank_with_placeholder(query, docs.iter().map(|d| d.text.as_str()), n_results);
        let mut result = SearchResult::with_capacity(ranked.len());
        for r in ranked {
            let doc = &docs[r.index];
            result.push(doc.text.clone(), doc.metadata.clone(), r.distance());
        }
        Ok(result)
    }

    async fn clear_collection(&self) -> Result<()> {
        self.save(&[]).await
    }

    async fn get_or_create_collection(&self) -> Result<CollectionInfo> {
        let path = self.file_path();
        let count = if tokio::fs::try_exists(&path).await? {
            self.load().await?.len()
        } else {
            self.save(&[]).await?;
            0
        };
        Ok(CollectionInfo {
            name: self.collection.clone(),
            count,
        })
    }

    async fn health_check(&self) -> bool {
        tokio::fs::metadata(&self.dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }
}
