//! # Vocab Pager
//!
//! Paginated, filterable listing of vocabulary collections over
//! interchangeable backends.
//!
//! Every listing, whatever the backend, returns the same envelope:
//!
//! ```json
//! { "page": 3, "per_page": 10, "total": 25, "items": [ ... ] }
//! ```
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────┐   ┌──────────┐
//!  │   CLI    │   │   HTTP   │
//!  │ (vocab)  │   │  (axum)  │
//!  └────┬─────┘   └────┬─────┘
//!       └──────┬───────┘
//!              ▼
//!      ┌───────────────┐     validate, count, fetch slice
//!      │ QueryService  │
//!      └───────┬───────┘
//!              ▼ Store trait
//!   ┌────────┬─┴───────┬────────┐
//!   │ SQLite │ Qdrant  │ Memory │
//!   └────────┴─────────┴────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! vocab init                                    # create schema / collections
//! vocab import words ./data/words.json          # bulk-load vocabulary
//! vocab list words --sort-by english --order desc --page 2
//! vocab list groups --parent-id 1               # words in group 1
//! vocab serve                                   # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`service`] | Paginated query service |
//! | [`backend`] | Backend selection and storage setup |
//! | [`sqlite_store`] | SQLite store |
//! | [`qdrant_store`] | Qdrant store |
//! | [`server`] | HTTP server |
//! | [`list`] | `vocab list` |
//! | [`import`] | `vocab import` |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`telemetry`] | Tracing setup |

pub mod backend;
pub mod config;
pub mod db;
pub mod import;
pub mod list;
pub mod migrate;
pub mod qdrant_store;
pub mod server;
pub mod service;
pub mod sqlite_store;
pub mod telemetry;

pub use vocab_pager_core::{
    Catalog, CollectionSpec, Filters, Item, ItemId, ListParams, PageRequest, PageResult,
    ParentRelation, QueryError, SortOrder, SortSpec,
};
