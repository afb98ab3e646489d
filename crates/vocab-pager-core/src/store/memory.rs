//! In-memory [`Store`] implementation for tests and demos.
//!
//! Items live in a `HashMap` of collection name to `Vec<Item>` behind a
//! `std::sync::RwLock`. Ordering and slicing use the same client-side
//! helpers as the vector-store backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::catalog::CollectionSpec;
use crate::models::{Item, ItemId};
use crate::paginate::{matches_filters, sort_items, window, Filters, SortSpec};

use super::Store;

/// In-memory store keyed by [`CollectionSpec::source`].
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<Item>>>,
    next_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Seeds a collection with pre-built items, keeping their ids.
    pub fn with_items(self, source: &str, items: Vec<Item>) -> Self {
        let max_id = items
            .iter()
            .filter_map(|item| match item.id {
                ItemId::Int(n) => Some(n),
                ItemId::Text(_) => None,
            })
            .max();
        if let Some(max_id) = max_id {
            self.next_id.fetch_max(max_id + 1, Ordering::SeqCst);
        }
        if let Ok(mut collections) = self.collections.write() {
            collections
                .entry(source.to_string())
                .or_default()
                .extend(items);
        }
        self
    }

    fn matching(&self, source: &str, filters: &Filters) -> Result<Vec<Item>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(collections
            .get(source)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| matches_filters(item, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn count(&self, collection: &CollectionSpec, filters: &Filters) -> Result<u64> {
        Ok(self.matching(&collection.source, filters)?.len() as u64)
    }

    async fn fetch_slice(
        &self,
        collection: &CollectionSpec,
        filters: &Filters,
        sort: &SortSpec,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Item>> {
        let mut items = self.matching(&collection.source, filters)?;
        sort_items(&mut items, sort);
        Ok(window(items, offset, limit))
    }

    async fn insert(
        &self,
        collection: &CollectionSpec,
        fields: Map<String, Value>,
    ) -> Result<ItemId> {
        let id = ItemId::Int(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        collections
            .entry(collection.source.clone())
            .or_default()
            .push(Item {
                id: id.clone(),
                fields,
            });
        Ok(id)
    }
}
