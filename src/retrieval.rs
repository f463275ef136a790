//! Retrieval facade.
//!
//! The six-operation API the HTTP layer and the CLI call. Every operation
//! asks the [`StoreFactory`] for the current backend first, so a config
//! change or a recovered dependency is picked up on the next call.

use std::sync::Arc;

use voice_retrieval_core::{
    CollectionInfo, Document, Result, SearchResult, StoreError, StoreKind,
};

use crate::config::Config;
use crate::factory::StoreFactory;

#[derive(Clone)]
pub struct Retrieval {
    factory: Arc<StoreFactory>,
}

impl Retrieval {
    pub fn new(factory: Arc<StoreFactory>) -> Self {
        Self { factory }
    }

    /// Facade over a factory with the default backend builder.
    pub fn from_config(config: Config) -> Self {
        Self::new(Arc::new(StoreFactory::new(config)))
    }

    pub fn factory(&self) -> &StoreFactory {
        &self.factory
    }

    pub async fn init(&self) -> Result<()> {
        self.factory.store().await?.init().await
    }

    pub async fn add_documents(&self, docs: &[Document]) -> Result<()> {
        self.factory.store().await?.add_documents(docs).await
    }

    /// Ranked retrieval. `None` uses `store.default_results` (4 unless configured).
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidInput`] when `n_results` is `Some(0)`.
    pub async fn query_documents(
        &self,
        query: &str,
        n_results: Option<usize>,
    ) -> Result<SearchResult> {
        let n = match n_results {
            Some(0) => return Err(StoreError::invalid_input("n_results must be at least 1")),
            Some(n) => n,
            None => self.factory.config().store.default_results,
        };
        self.factory.store().await?.query_documents(query, n).await
    }

    pub async fn clear_collection(&self) -> Result<()> {
        self.factory.store().await?.clear_collection().await
    }

    pub async fn get_or_create_collection(&self) -> Result<CollectionInfo> {
        self.factory.store().await?.get_or_create_collection().await
    }

    /// `false` if no backend could be resolved at all.
    pub async fn health_check(&self) -> bool {
        match self.factory.store().await {
            Ok(store) => store.health_check().await,
            Err(_) => false,
        }
    }

    /// Kind of the backend actually serving requests, after any fallback.
    pub async fn backend_kind(&self) -> Result<StoreKind> {
        Ok(self.factory.store().await?.kind())
    }
}
