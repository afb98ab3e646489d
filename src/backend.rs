//! Backend selection and storage setup.
//!
//! `[store].backend` picks the [`Store`] implementation the service runs
//! against:
//!
//! | Backend | Store | `vocab init` |
//! |---------|-------|--------------|
//! | `sqlite` | [`SqliteStore`] | runs schema migrations |
//! | `qdrant` | [`QdrantStore`] | creates missing collections and payload indexes |
//! | `memory` | [`InMemoryStore`] | nothing to set up |

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::info;

use vocab_pager_core::store::memory::InMemoryStore;
use vocab_pager_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::qdrant_store::QdrantStore;
use crate::sqlite_store::SqliteStore;

pub async fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match config.store.backend.as_str() {
        "sqlite" => Arc::new(SqliteStore::new(db::connect(config).await?)),
        "qdrant" => Arc::new(QdrantStore::connect(&config.qdrant)?),
        "memory" => Arc::new(InMemoryStore::new()),
        other => bail!("Unknown store backend: '{}'", other),
    };
    info!(backend = store.backend(), "store opened");
    Ok(store)
}

/// Prepares the configured backend for reads and writes. Idempotent.
pub async fn init_storage(config: &Config) -> Result<()> {
    match config.store.backend.as_str() {
        "sqlite" => {
            migrate::run_migrations(config).await?;
            println!(
                "Database initialized successfully at {}.",
                config.db.path.display()
            );
        }
        "qdrant" => {
            let store = QdrantStore::connect(&config.qdrant)?;
            store.ensure_collections(&config.catalog()?).await?;
            println!("Qdrant collections ready at {}.", config.qdrant.url);
        }
        "memory" => println!("Memory backend needs no initialization."),
        other => bail!("Unknown store backend: '{}'", other),
    }
    Ok(())
}
