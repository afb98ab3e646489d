//! Paginated query service.
//!
//! The one place where listing requests are validated, paged, and
//! translated into store calls. Every backend sits behind the same
//! [`Store`] trait, so the rules below hold for SQLite, Qdrant, and the
//! in-memory store alike:
//!
//! - parameters are validated against the catalog before any store call;
//! - `total` comes from a separate `count` call, not from the page length;
//! - each store call is bounded by a timeout;
//! - store failures are logged with collection and operation, then
//!   surfaced as [`QueryError::StoreUnavailable`]. No empty-page fallback.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use vocab_pager_core::error::{QueryError, QueryResult};
use vocab_pager_core::models::{is_scalar, ItemId};
use vocab_pager_core::paginate::{Filters, ListParams, PageRequest, PageResult};
use vocab_pager_core::store::Store;
use vocab_pager_core::{Catalog, CollectionSpec};

use crate::config::Config;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_PER_PAGE: u64 = 100;

pub struct QueryService {
    catalog: Catalog,
    store: Arc<dyn Store>,
    timeout: Duration,
    max_per_page: u64,
}

impl QueryService {
    pub fn new(catalog: Catalog, store: Arc<dyn Store>) -> Self {
        Self {
            catalog,
            store,
            timeout: DEFAULT_TIMEOUT,
            max_per_page: DEFAULT_MAX_PER_PAGE,
        }
    }

    pub fn from_config(config: &Config, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        Ok(Self::new(config.catalog()?, store)
            .with_timeout(config.store.timeout())
            .with_max_per_page(config.pagination.max_per_page))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_per_page(mut self, max_per_page: u64) -> Self {
        self.max_per_page = max_per_page;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Returns one page of `collection`.
    ///
    /// `items.len() == min(per_page, max(0, total - offset))`; a page past
    /// the end is empty, not an error.
    pub async fn query(&self, collection: &str, params: ListParams) -> QueryResult<PageResult> {
        let spec = self.catalog.get(collection)?;
        let request = self.resolve(spec, params)?;
        self.run(spec, request).await
    }

    /// Returns one page of the sub-view attached to `parent`, restricted to
    /// the items linked to `parent_id` (e.g. `GET /groups/{id}`).
    ///
    /// Fails with [`QueryError::NotFound`] when `parent` has no sub-view or
    /// no item with `parent_id` exists.
    pub async fn query_child(
        &self,
        parent: &str,
        parent_id: &str,
        params: ListParams,
    ) -> QueryResult<PageResult> {
        let parent_spec = self.catalog.get(parent)?;
        let spec = self.catalog.child_of(parent).ok_or_else(|| {
            QueryError::NotFound(format!("collection {} has no sub-view", parent))
        })?;
        let relation = spec.parent.as_ref().ok_or_else(|| {
            QueryError::NotFound(format!("collection {} has no sub-view", parent))
        })?;

        let mut request = self.resolve(spec, params)?;
        request
            .filters
            .insert(relation.key.clone(), parent_id.to_string());

        let mut by_id = Filters::new();
        by_id.insert("id".to_string(), parent_id.to_string());
        let found = self
            .guarded(parent_spec, "count", self.store.count(parent_spec, &by_id))
            .await?;
        if found == 0 {
            return Err(QueryError::NotFound(format!(
                "{} {} not found",
                parent, parent_id
            )));
        }

        self.run(spec, request).await
    }

    /// Inserts an item after checking the collection accepts writes, every
    /// field is writable and scalar, and the required fields are present.
    /// A client-supplied `id` is discarded; the store assigns ids.
    pub async fn insert(
        &self,
        collection: &str,
        mut fields: Map<String, Value>,
    ) -> QueryResult<ItemId> {
        let spec = self.catalog.get(collection)?;
        if spec.read_only {
            return Err(QueryError::invalid(
                "collection",
                format!("collection {} is read-only", spec.name),
            ));
        }

        fields.remove("id");
        for (field, value) in &fields {
            if !is_field_name(field) {
                return Err(QueryError::invalid(
                    field.as_str(),
                    format!("invalid field name: {:?}", field),
                ));
            }
            if !spec.is_writable(field) {
                return Err(QueryError::invalid(
                    field.as_str(),
                    format!(
                        "Unknown field: {} (writable: {}, {})",
                        field,
                        spec.required.join(", "),
                        spec.writable.join(", ")
                    ),
                ));
            }
            if !is_scalar(value) {
                return Err(QueryError::invalid(
                    field.as_str(),
                    format!("{} must be a string, number, boolean, or null", field),
                ));
            }
        }
        for field in &spec.required {
            let present = match fields.get(field) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(_) => true,
            };
            if !present {
                return Err(QueryError::invalid(
                    field.as_str(),
                    format!("{} is required", field),
                ));
            }
        }

        let id = self
            .guarded(spec, "insert", self.store.insert(spec, fields))
            .await?;
        debug!(collection = %spec.name, id = %id, "item inserted");
        Ok(id)
    }

    fn resolve(&self, spec: &CollectionSpec, params: ListParams) -> QueryResult<PageRequest> {
        PageRequest::resolve(spec, params, self.max_per_page).inspect_err(|err| {
            warn!(collection = %spec.name, error = %err, "rejected page request");
        })
    }

    async fn run(&self, spec: &CollectionSpec, request: PageRequest) -> QueryResult<PageResult> {
        debug!(
            collection = %spec.name,
            backend = self.store.backend(),
            page = request.page,
            per_page = request.per_page,
            sort_by = %request.sort.field,
            order = %request.sort.order,
            filters = request.filters.len(),
            "query"
        );

        let total = self
            .guarded(spec, "count", self.store.count(spec, &request.filters))
            .await?;

        let items = if request.offset() >= total {
            Vec::new()
        } else {
            self.guarded(
                spec,
                "fetch_slice",
                self.store.fetch_slice(
                    spec,
                    &request.filters,
                    &request.sort,
                    request.offset(),
                    request.per_page,
                ),
            )
            .await?
        };

        Ok(PageResult {
            page: request.page,
            per_page: request.per_page,
            total,
            items,
        })
    }

    /// Runs one store call under the timeout and maps its failure into the
    /// query error taxonomy.
    async fn guarded<T>(
        &self,
        spec: &CollectionSpec,
        operation: &'static str,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> QueryResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => {
                error!(
                    collection = %spec.name,
                    backend = self.store.backend(),
                    operation,
                    error = %format!("{:#}", source),
                    "store call failed"
                );
                Err(QueryError::StoreUnavailable {
                    collection: spec.name.clone(),
                    operation,
                    retryable: false,
                    source,
                })
            }
            Err(_) => {
                error!(
                    collection = %spec.name,
                    backend = self.store.backend(),
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "store call timed out"
                );
                Err(QueryError::StoreUnavailable {
                    collection: spec.name.clone(),
                    operation,
                    retryable: true,
                    source: anyhow::anyhow!("timed out after {:?}", self.timeout),
                })
            }
        }
    }
}

fn is_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
