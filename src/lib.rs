//! # Voice Retrieval
//!
//! Pluggable retrieval backends that find writing samples relevant to a
//! prompt, so a text generator can be conditioned on a person's own voice.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────────────────┐
//! │  HTTP / CLI  │──▶│  Retrieval   │──▶│        StoreFactory         │
//! │   (vr)       │   │   facade     │   │ resolve · health · fallback │
//! └──────────────┘   └──────────────┘   └─────────────┬──────────────┘
//!                                                      │
//!               ┌───────────────┬──────────────────────┼──────────────┐
//!               ▼               ▼                      ▼              ▼
//!         ┌──────────┐   ┌────────────┐        ┌────────────┐  ┌────────────┐
//!         │   File   │   │   Chroma   │        │   Redis    │  │  MariaDB   │
//!         │ keyword  │   │  HTTP ANN  │        │ RediSearch │  │ VECTOR/JSON│
//!         └──────────┘   └────────────┘        └────────────┘  └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! vr init                                  # create the collection
//! vr add samples/*.txt                     # split and store writing samples
//! vr query "a rainy morning" -n 3          # ranked passages as JSON
//! VECTOR_STORE_TYPE=redis vr status        # which backend is really serving
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`file_store`] | Flat-file keyword backend |
//! | [`chroma_store`] | HTTP vector-engine backend |
//! | [`redis_store`] | Redis + RediSearch backend |
//! | [`mariadb_store`] | MariaDB vector backend |
//! | [`db`] | MariaDB connection pool |
//! | [`factory`] | Backend selection and fallback |
//! | [`retrieval`] | Facade used by callers |
//!
//! Data types, the [`VectorStore`] trait, the embedding, and keyword scoring
//! live in `voice-retrieval-core` and are re-exported here.

pub mod chroma_store;
pub mod config;
pub mod db;
pub mod factory;
pub mod file_store;
pub mod mariadb_store;
pub mod redis_store;
pub mod retrieval;

pub use voice_retrieval_core::{
    chunk, embedding, keyword, CollectionInfo, Document, Metadata, Result, SearchResult,
    StoreError, StoreKind, VectorStore,
};
