//! Configuration parsing, environment overrides, and validation.
//!
//! Voice Retrieval reads an optional TOML file (default: `config/vr.toml`).
//! Every key has a local default, so a missing file is not an error; a
//! fresh checkout runs against the flat-file backend out of the box.
//!
//! # Example
//!
//! ```toml
//! [store]
//! backend = "redis"            # file | chroma | redis | mariadb
//! collection = "writing_samples"
//!
//! [store.redis]
//! url = "redis://127.0.0.1:6379"
//!
//! [embedding]
//! dims = 384
//! ```
//!
//! # Environment Overrides
//!
//! Applied after the file is read:
//!
//! | Variable | Key |
//! |----------|-----|
//! | `VECTOR_STORE_TYPE` | `store.backend` |
//! | `VECTOR_COLLECTION` | `store.collection` |
//! | `VECTOR_DATA_DIR` | `store.data_dir` |
//! | `CHROMA_URL` | `store.chroma.url` |
//! | `REDIS_URL` | `store.redis.url` |
//! | `MARIADB_HOST` / `_PORT` / `_USER` / `_PASSWORD` / `_DATABASE` | `store.mariadb.*` |
//! | `EMBEDDING_DIMS` | `embedding.dims` |

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use voice_retrieval_core::embedding::DEFAULT_DIMS;
use voice_retrieval_core::models::{DEFAULT_COLLECTION, DEFAULT_N_RESULTS};
use voice_retrieval_core::StoreKind;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Backend selector. Unknown values select the flat-file backend.
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Directory holding the flat-file store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_results")]
    pub default_results: usize,
    #[serde(default)]
    pub chroma: ChromaConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub mariadb: MariaDbConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            collection: default_collection(),
            data_dir: default_data_dir(),
            default_results: default_results(),
            chroma: ChromaConfig::default(),
            redis: RedisConfig::default(),
            mariadb: MariaDbConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Resolve the configured backend tag. Unknown values select the file backend.
    pub fn kind(&self) -> StoreKind {
        StoreKind::from_config_value(&self.backend)
    }
}

fn default_backend() -> String {
    "file".to_string()
}
fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("vector_store")
}
fn default_results() -> usize {
    DEFAULT_N_RESULTS
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChromaConfig {
    #[serde(default = "default_chroma_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            url: default_chroma_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_chroma_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Search index name is `{index_prefix}:{collection}`.
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            index_prefix: default_index_prefix(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_index_prefix() -> String {
    "idx".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MariaDbConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_db_name")]
    pub database: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for MariaDbConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            password: String::new(),
            database: default_db_name(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_db_host() -> String {
    "127.0.0.1".to_string()
}
fn default_db_port() -> u16 {
    3306
}
fn default_db_user() -> String {
    "root".to_string()
}
fn default_db_name() -> String {
    "voice".to_string()
}
fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_dims")]
    pub dims: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dims: default_dims(),
        }
    }
}

fn default_dims() -> usize {
    DEFAULT_DIMS
}

/// Load configuration from `path`, apply environment overrides, and validate.
///
/// A missing file yields the defaults. A file that exists but cannot be
/// parsed is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    if !StoreKind::is_known(&config.store.backend) {
        debug!(backend = %config.store.backend, "unrecognized store backend, using file");
    }
    Ok(config)
}

/// Apply overrides from a variable lookup (the process environment in production).
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let store = &mut config.store;
    if let Some(v) = lookup("VECTOR_STORE_TYPE") {
        store.backend = v;
    }
    if let Some(v) = lookup("VECTOR_COLLECTION") {
        store.collection = v;
    }
    if let Some(v) = lookup("VECTOR_DATA_DIR") {
        store.data_dir = PathBuf::from(v);
    }
    if let Some(v) = lookup("CHROMA_URL") {
        store.chroma.url = v;
    }
    if let Some(v) = lookup("REDIS_URL") {
        store.redis.url = v;
    }
    if let Some(v) = lookup("MARIADB_HOST") {
        store.mariadb.host = v;
    }
    if let Some(v) = lookup("MARIADB_PORT") {
        store.mariadb.port = v
            .parse()
            .with_context(|| format!("MARIADB_PORT is not a port number: {v}"))?;
    }
    if let Some(v) = lookup("MARIADB_USER") {
        store.mariadb.user = v;
    }
    if let Some(v) = lookup("MARIADB_PASSWORD") {
        store.mariadb.password = v;
    }
    if let Some(v) = lookup("MARIADB_DATABASE") {
        store.mariadb.database = v;
    }
    if let Some(v) = lookup("EMBEDDING_DIMS") {
        config.embedding.dims = v
            .parse()
            .with_context(|| format!("EMBEDDING_DIMS is not a number: {v}"))?;
    }
    Ok(())
}

/// Check invariants the backends rely on.
///
/// The collection name is spliced into SQL table names and Redis key
/// prefixes, so it is restricted to ASCII alphanumerics and `_`.
pub fn validate(config: &Config) -> Result<()> {
    let name = &config.store.collection;
    if name.is_empty() {
        anyhow::bail!("store.collection must not be empty");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        anyhow::bail!(
            "store.collection '{}' may only contain ASCII letters, digits, and '_'",
            name
        );
    }
    if config.store.default_results == 0 {
        anyhow::bail!("store.default_results must be >= 1");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |_| None).unwrap();
        assert_eq!(config.store.kind(), StoreKind::File);
        assert_eq!(config.store.collection, DEFAULT_COLLECTION);
        assert_eq!(config.store.data_dir, PathBuf::from("vector_store"));
        assert_eq!(config.embedding.dims, 384);
    }

    #[test]
    fn test_empty_file_matches_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.store.backend, "file");
        assert_eq!(config.store.chroma.url, "http://localhost:8000");
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = toml::from_str(
            r#"
[store]
backend = "mariadb"

[store.mariadb]
port = 3307
"#,
        )
        .unwrap();
        assert_eq!(config.store.kind(), StoreKind::MariaDb);
        assert_eq!(config.store.mariadb.port, 3307);
        assert_eq!(config.store.mariadb.host, "127.0.0.1");
        assert_eq!(config.store.redis.url, "redis://127.0.0.1:6379");
        assert_eq!(config.store.default_results, 4);
    }

    #[test]
    fn test_load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vr.toml");
        std::fs::write(&path, "[store]\ncollection = \"essays\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.store.collection, "essays");
    }

    #[test]
    fn test_load_config_rejects_bad_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vr.toml");
        std::fs::write(&path, "[store\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("VECTOR_STORE_TYPE", "redis"),
            ("REDIS_URL", "redis://cache:6380"),
            ("MARIADB_PORT", "3310"),
            ("EMBEDDING_DIMS", "128"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.store.kind(), StoreKind::Redis);
        assert_eq!(config.store.redis.url, "redis://cache:6380");
        assert_eq!(config.store.mariadb.port, 3310);
        assert_eq!(config.embedding.dims, 128);
    }

    #[test]
    fn test_env_override_bad_port() {
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, |k| {
            (k == "MARIADB_PORT").then(|| "not-a-port".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_backend_is_file() {
        let mut config = Config::default();
        config.store.backend = "pinecone".to_string();
        assert_eq!(config.store.kind(), StoreKind::File);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_load_config_accepts_unknown_backend() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vr.toml");
        std::fs::write(&path, "[store]\nbackend = \"pinecone\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.store.backend, "pinecone");
        assert_eq!(config.store.kind(), StoreKind::File);
        assert_eq!(config.store.kind(), StoreKind::File);
    }

    #[test]
    fn test_validate_collection_name() {
        let mut config = Config::default();
        config.store.collection = "drop table; --".to_string();
        assert!(validate(&config).is_err());
        config.store.collection = String::new();
        assert!(validate(&config).is_err());
        config.store.collection = "essays_2024".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_dims_and_results() {
        let mut config = Config::default();
        config.embedding.dims = 0;
        assert!(validate(&config).is_err());
        let mut config = Config::default();
        config.store.default_results = 0;
        assert!(validate(&config).is_err());
    }
}
