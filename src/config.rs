//! TOML configuration parsing and validation.
//!
//! Every section is optional; an empty file yields a SQLite-backed service
//! over the built-in `words`/`groups`/`group_words` catalog. See
//! `config/vocab.example.toml` for a full example.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use vocab_pager_core::{Catalog, CollectionSpec, ParentRelation, SortOrder};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Collection overrides. Empty means the built-in catalog.
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/vocab.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// `sqlite`, `qdrant`, or `memory`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Upper bound on any single store call.
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            timeout_secs: default_store_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}
fn default_store_timeout_secs() -> u64 {
    5
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_qdrant_timeout_secs")]
    pub timeout_secs: u64,
    /// Largest working set sorted client-side for one page request.
    #[serde(default = "default_max_scan")]
    pub max_scan: u64,
    /// Points fetched per scroll round-trip.
    #[serde(default = "default_scroll_batch")]
    pub scroll_batch: u32,
    #[serde(default = "default_vector_size")]
    pub vector_size: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            api_key: None,
            timeout_secs: default_qdrant_timeout_secs(),
            max_scan: default_max_scan(),
            scroll_batch: default_scroll_batch(),
            vector_size: default_vector_size(),
        }
    }
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}
fn default_qdrant_timeout_secs() -> u64 {
    10
}
fn default_max_scan() -> u64 {
    10_000
}
fn default_scroll_batch() -> u32 {
    256
}
fn default_vector_size() -> u64 {
    384
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaginationConfig {
    #[serde(default = "default_per_page")]
    pub default_per_page: u64,
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
        }
    }
}

fn default_per_page() -> u64 {
    10
}
fn default_max_per_page() -> u64 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// One `[collections.<name>]` table.
#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    /// Physical table/view/collection name; defaults to the logical name.
    #[serde(default)]
    pub source: Option<String>,
    pub sortable: Vec<String>,
    #[serde(default)]
    pub filterable: Vec<String>,
    #[serde(default)]
    pub required: Vec<String>,
    /// Insertable fields besides `required`. Defaults to every sortable
    /// and filterable field except `id`.
    #[serde(default)]
    pub writable: Option<Vec<String>>,
    #[serde(default)]
    pub default_sort: Option<String>,
    #[serde(default = "default_order")]
    pub default_order: String,
    #[serde(default)]
    pub per_page: Option<u64>,
    #[serde(default)]
    pub parent: Option<ParentConfig>,
    #[serde(default)]
    pub read_only: bool,
}

fn default_order() -> String {
    "asc".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ParentConfig {
    pub collection: String,
    pub key: String,
}

impl Config {
    /// Builds the collection catalog: the built-in one when no
    /// `[collections]` are configured, otherwise exactly the configured set.
    pub fn catalog(&self) -> Result<Catalog> {
        if self.collections.is_empty() {
            let mut catalog = Catalog::new();
            for spec in Catalog::builtin().iter() {
                let mut spec = spec.clone();
                spec.default_per_page = self.pagination.default_per_page;
                catalog.register(spec);
            }
            return Ok(catalog);
        }

        let mut catalog = Catalog::new();
        for (name, c) in &self.collections {
            if c.sortable.is_empty() {
                bail!("collections.{}.sortable must list at least one field", name);
            }
            let default_sort = c
                .default_sort
                .clone()
                .unwrap_or_else(|| c.sortable[0].clone());
            if !c.sortable.contains(&default_sort) {
                bail!(
                    "collections.{}.default_sort '{}' is not in sortable",
                    name,
                    default_sort
                );
            }
            let default_order: SortOrder = c
                .default_order
                .parse()
                .with_context(|| format!("collections.{}.default_order", name))?;

            let writable = c.writable.clone().unwrap_or_else(|| {
                let mut fields: Vec<String> = c
                    .sortable
                    .iter()
                    .chain(&c.filterable)
                    .filter(|f| f.as_str() != "id")
                    .cloned()
                    .collect();
                fields.sort();
                fields.dedup();
                fields
            });

            catalog.register(CollectionSpec {
                name: name.clone(),
                source: c.source.clone().unwrap_or_else(|| name.clone()),
                sortable: c.sortable.clone(),
                filterable: c.filterable.clone(),
                required: c.required.clone(),
                writable,
                default_sort,
                default_order,
                default_per_page: c.per_page.unwrap_or(self.pagination.default_per_page),
                parent: c.parent.as_ref().map(|p| ParentRelation {
                    collection: p.collection.clone(),
                    key: p.key.clone(),
                }),
                read_only: c.read_only || c.parent.is_some(),
            });
        }

        for spec in catalog.iter() {
            if let Some(parent) = &spec.parent {
                if catalog.get(&parent.collection).is_err() {
                    bail!(
                        "collections.{}.parent references unknown collection '{}'",
                        spec.name,
                        parent.collection
                    );
                }
            }
        }

        Ok(catalog)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    match config.store.backend.as_str() {
        "sqlite" | "qdrant" | "memory" => {}
        other => bail!(
            "Unknown store backend: '{}'. Must be sqlite, qdrant, or memory.",
            other
        ),
    }

    if config.store.timeout_secs == 0 {
        bail!("store.timeout_secs must be > 0");
    }

    if config.pagination.max_per_page < 1 {
        bail!("pagination.max_per_page must be >= 1");
    }
    if config.pagination.default_per_page < 1
        || config.pagination.default_per_page > config.pagination.max_per_page
    {
        bail!(
            "pagination.default_per_page must be in [1, {}]",
            config.pagination.max_per_page
        );
    }

    if config.qdrant.max_scan < 1 {
        bail!("qdrant.max_scan must be >= 1");
    }
    if config.qdrant.scroll_batch < 1 {
        bail!("qdrant.scroll_batch must be >= 1");
    }

    match config.log.format.as_str() {
        "pretty" | "json" => {}
        other => bail!("Unknown log format: '{}'. Must be pretty or json.", other),
    }

    config.catalog()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.store.backend, "sqlite");
        assert_eq!(config.pagination.max_per_page, 100);
        assert_eq!(config.server.bind, "127.0.0.1:5000");
        let catalog = config.catalog().unwrap();
        assert!(catalog.get("words").is_ok());
        assert!(catalog.get("group_words").is_ok());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = parse("[store]\nbackend = \"pinecone\"\n").unwrap_err();
        assert!(err.to_string().contains("pinecone"));
    }

    #[test]
    fn test_default_per_page_above_max_rejected() {
        let err = parse("[pagination]\ndefault_per_page = 50\nmax_per_page = 20\n").unwrap_err();
        assert!(err.to_string().contains("default_per_page"));
    }

    #[test]
    fn test_custom_collections() {
        let config = parse(
            r#"
[collections.words]
sortable = ["id", "salish", "english", "created_at"]
filterable = ["language"]
default_sort = "created_at"
default_order = "DESC"

[collections.lesson_words]
source = "lesson_words_view"
sortable = ["id", "salish"]
parent = { collection = "words", key = "word_id" }
"#,
        )
        .unwrap();
        let catalog = config.catalog().unwrap();
        let words = catalog.get("words").unwrap();
        assert_eq!(words.default_order, SortOrder::Desc);
        assert!(!words.is_sortable("kanji"));
        assert!(words.is_writable("language"));
        assert!(!words.is_writable("id"));
        let lesson = catalog.get("lesson_words").unwrap();
        assert_eq!(lesson.source, "lesson_words_view");
        assert!(lesson.read_only);
        assert_eq!(catalog.child_of("words").unwrap().name, "lesson_words");
    }

    #[test]
    fn test_default_sort_must_be_sortable() {
        let err = parse(
            r#"
[collections.words]
sortable = ["id"]
default_sort = "kanji"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("kanji"));
    }

    #[test]
    fn test_parent_must_exist() {
        let err = parse(
            r#"
[collections.group_words]
sortable = ["id"]
parent = { collection = "groups", key = "group_id" }
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("groups"));
    }
}
