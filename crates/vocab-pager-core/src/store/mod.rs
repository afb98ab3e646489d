//! Storage abstraction for Vocab Pager.
//!
//! The [`Store`] trait is the single seam between the pagination layer and
//! a backend. Validation, offset math, and error translation are written
//! once in the query service; each backend only answers "how many items
//! match" and "give me this ordered slice".
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::catalog::CollectionSpec;
use crate::models::{Item, ItemId};
use crate::paginate::{Filters, SortSpec};

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`count`](Store::count) | Items matching the filters, ignoring pagination |
/// | [`fetch_slice`](Store::fetch_slice) | Ordered `[offset, offset + limit)` window of matching items |
/// | [`insert`](Store::insert) | Write path used by the loader and `POST /{collection}` |
///
/// Callers validate field names against the [`CollectionSpec`] before
/// calling in, so backends may splice `sort.field` and filter keys into
/// their query language.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for logs (`sqlite`, `qdrant`, `memory`).
    fn backend(&self) -> &'static str;

    async fn count(&self, collection: &CollectionSpec, filters: &Filters) -> Result<u64>;

    async fn fetch_slice(
        &self,
        collection: &CollectionSpec,
        filters: &Filters,
        sort: &SortSpec,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Item>>;

    /// Inserts a new item and returns the id the backend assigned.
    async fn insert(&self, collection: &CollectionSpec, fields: Map<String, Value>)
        -> Result<ItemId>;
}
