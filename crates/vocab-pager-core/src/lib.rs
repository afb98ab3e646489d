//! # Vocab Pager Core
//!
//! Shared, runtime-agnostic logic for Vocab Pager: the item model, the
//! collection catalog, page-request validation, client-side ordering, the
//! store abstraction, and an in-memory store.
//!
//! This crate contains no tokio, sqlx, or network dependencies. Backends
//! that need them (SQLite, Qdrant) live in the `vocab-pager` crate and
//! implement [`store::Store`].

pub mod catalog;
pub mod error;
pub mod models;
pub mod paginate;
pub mod store;

pub use catalog::{Catalog, CollectionSpec, ParentRelation};
pub use error::QueryError;
pub use models::{Item, ItemId};
pub use paginate::{Filters, ListParams, PageRequest, PageResult, SortOrder, SortSpec};
