//! Backend selection, lifecycle, and degraded fallback.
//!
//! [`StoreFactory`] owns the one live [`VectorStore`] the process uses and
//! the configuration it was resolved from. Resolution runs:
//!
//! ```text
//! Unresolved ─▶ Resolving ─▶ Initializing ─▶ HealthChecking ─▶ Ready
//!                                 │                 │
//!                                 └──── failure ────┴─▶ Degraded: build file store,
//!                                                       init it, Ready as `file`
//! ```
//!
//! Every call to [`StoreFactory::store`] compares the cached resolved kind
//! with the configured kind; a mismatch runs resolution again and swaps the
//! result in, closing the store it replaces. A degraded factory therefore
//! retries the configured backend on each call and recovers as soon as it
//! becomes healthy. The state lock is held only for the comparison and the
//! swap, never across network I/O.
//!
//! Substitution is never an error for the caller. It is logged as a
//! `warn` event with `degraded = true`.

use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use voice_retrieval_core::embedding::CharCodeEmbedding;
use voice_retrieval_core::{Result, StoreKind, VectorStore};

use crate::chroma_store::ChromaStore;
use crate::config::Config;
use crate::file_store::FileStore;
use crate::mariadb_store::MariaDbStore;
use crate::redis_store::RedisStore;

/// Constructs backend instances. Construction must not touch the network.
pub trait StoreBuilder: Send + Sync {
    fn build(&self, kind: StoreKind, config: &Config) -> Result<Arc<dyn VectorStore>>;
}

/// Builds the four real backends with the char-code embedding.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStoreBuilder;

impl StoreBuilder for DefaultStoreBuilder {
    fn build(&self, kind: StoreKind, config: &Config) -> Result<Arc<dyn VectorStore>> {
        let store = &config.store;
        let collection = store.collection.clone();
        let built: Arc<dyn VectorStore> = match kind {
            StoreKind::File => Arc::new(FileStore::new(&store.data_dir, collection)),
            StoreKind::Chroma => Arc::new(ChromaStore::new(&store.chroma, collection)?),
            StoreKind::Redis => Arc::new(RedisStore::new(
                &store.redis,
                collection,
                CharCodeEmbedding::shared(config.embedding.dims),
            )),
            StoreKind::MariaDb => Arc::new(MariaDbStore::new(
                &store.mariadb,
                collection,
                CharCodeEmbedding::shared(config.embedding.dims),
            )),
        };
        Ok(built)
    }
}

struct Resolved {
    store: Arc<dyn VectorStore>,
    kind: StoreKind,
}

/// Lazily resolved, shared backend holder.
pub struct StoreFactory {
    config: RwLock<Config>,
    builder: Box<dyn StoreBuilder>,
    state: Mutex<Option<Resolved>>,
}

impl StoreFactory {
    pub fn new(config: Config) -> Self {
        Self::with_builder(config, DefaultStoreBuilder)
    }

    pub fn with_builder(config: Config, builder: impl StoreBuilder + 'static) -> Self {
        Self {
            config: RwLock::new(config),
            builder: Box::new(builder),
            state: Mutex::new(None),
        }
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Config {
        match self.config.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the configuration. Takes effect on the next [`store`](Self::store) call.
    pub fn set_config(&self, config: Config) {
        match self.config.write() {
            Ok(mut slot) => *slot = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }

    pub fn configured_kind(&self) -> StoreKind {
        self.config().store.kind()
    }

    /// Kind of the cached store, if one has been resolved.
    pub async fn current_kind(&self) -> Option<StoreKind> {
        self.state.lock().await.as_ref().map(|r| r.kind)
    }

    /// Return the live store, resolving it first if needed.
    ///
    /// # Errors
    ///
    /// Only file-backend failures surface here: a non-file backend that
    /// fails to initialize or reports unhealthy is replaced by the file
    /// backend instead.
    pub async fn store(&self) -> Result<Arc<dyn VectorStore>> {
        let config = self.config();
        let configured = config.store.kind();

        if let Some(resolved) = self.state.lock().await.as_ref() {
            if resolved.kind == configured {
                return Ok(Arc::clone(&resolved.store));
            }
            debug!(
                cached = %resolved.kind,
                configured = %configured,
                "store kind changed, re-resolving"
            );
        }

        // Resolution runs unlocked; concurrent callers may each build a
        // candidate, and the first one installed wins.
        let resolved = self.resolve(&config, configured).await?;

        let mut state = self.state.lock().await;
        if let Some(current) = state.as_ref() {
            if current.kind == resolved.kind {
                let installed = Arc::clone(&current.store);
                drop(state);
                resolved.store.close().await;
                return Ok(installed);
            }
        }
        let store = Arc::clone(&resolved.store);
        let replaced = state.replace(resolved);
        drop(state);
        if let Some(old) = replaced {
            old.store.close().await;
        }
        Ok(store)
    }

    /// Close and forget the cached store. The next call resolves afresh.
    pub async fn reset(&self) {
        if let Some(old) = self.state.lock().await.take() {
            old.store.close().await;
            debug!(backend = %old.kind, "store reset");
        }
    }

    async fn resolve(&self, config: &Config, kind: StoreKind) -> Result<Resolved> {
        let candidate = self.builder.build(kind, config)?;
        if kind == StoreKind::File {
            candidate.init().await?;
            info!(backend = %kind, collection = %candidate.collection_name(), "store ready");
            return Ok(Resolved {
                store: candidate,
                kind,
            });
        }

        let failure = match candidate.init().await {
            Err(e) => Some(e.to_string()),
            Ok(()) => {
                if candidate.health_check().await {
                    None
                } else {
                    Some("health check failed".to_string())
                }
            }
        };

        let Some(error) = failure else {
            info!(backend = %kind, collection = %candidate.collection_name(), "store ready");
            return Ok(Resolved {
                store: candidate,
                kind,
            });
        };

        warn!(
            backend = %kind,
            collection = %config.store.collection,
            error = %error,
            degraded = true,
            "backend unavailable, falling back to file store"
        );
        candidate.close().await;

        let fallback = self.builder.build(StoreKind::File, config)?;
        fallback.init().await?;
        Ok(Resolved {
            store: fallback,
            kind: StoreKind::File,
        })
    }
}
