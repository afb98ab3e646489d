//! `vocab import`: bulk-load a JSON array of items into a collection.
//!
//! Every object goes through [`QueryService::insert`], so the same
//! required-field and scalar checks apply as for `POST /{collection}`.
//! Invalid entries are reported and skipped; a store failure aborts the run.

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::warn;

use vocab_pager_core::error::QueryError;

use crate::backend::open_store;
use crate::config::Config;
use crate::service::QueryService;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    /// `(index in input, reason)` for each skipped entry.
    pub skipped: Vec<(usize, String)>,
}

/// Parses an import file: a top-level JSON array whose entries are objects.
pub fn parse_items(content: &str) -> Result<Vec<Map<String, Value>>> {
    let value: Value = serde_json::from_str(content).context("Failed to parse import file")?;
    let Value::Array(entries) = value else {
        bail!("import file must contain a JSON array of objects");
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Object(fields) => Ok(fields),
            other => bail!("entry {} is not an object: {}", index, other),
        })
        .collect()
}

pub async fn import_items(
    service: &QueryService,
    collection: &str,
    items: Vec<Map<String, Value>>,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for (index, fields) in items.into_iter().enumerate() {
        match service.insert(collection, fields).await {
            Ok(_) => report.inserted += 1,
            Err(err @ QueryError::InvalidArgument { .. }) => {
                warn!(collection, index, error = %err, "skipping invalid entry");
                report.skipped.push((index, err.to_string()));
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("import aborted at entry {}", index)))
            }
        }
    }

    Ok(report)
}

pub async fn run_import(config: &Config, collection: &str, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file: {}", path.display()))?;
    let items = parse_items(&content)?;
    let total = items.len();

    let store = open_store(config).await?;
    let service = QueryService::from_config(config, store)?;
    let report = import_items(&service, collection, items).await?;

    for (index, reason) in &report.skipped {
        println!("  skipped entry {}: {}", index, reason);
    }
    println!(
        "Imported {} of {} items into {}.",
        report.inserted, total, collection
    );
    Ok(())
}
