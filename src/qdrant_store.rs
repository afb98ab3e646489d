//! Qdrant-backed [`Store`] implementation.
//!
//! Items are stored as point payloads. Qdrant can count and filter on
//! payload fields but has no ordering primitive over arbitrary payload
//! fields, so a page is produced by:
//!
//! 1. counting the matching points (exact count),
//! 2. scrolling every matching point into memory, at most `max_scan`,
//! 3. sorting the working set client-side, then slicing the window.
//!
//! # Scalability limit
//!
//! The working set is bounded by `max_scan`. When more points match than
//! the cap allows, the request fails instead of returning a page computed
//! from a truncated (and therefore wrongly ordered) set. Collections that
//! outgrow the cap need a secondary index or a relational backend.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    self, Condition, CountPointsBuilder, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, Distance, FieldType, Filter, PointId, PointStruct,
    RetrievedPoint, ScrollPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::{Map, Value};
use uuid::Uuid;

use vocab_pager_core::catalog::{Catalog, CollectionSpec};
use vocab_pager_core::models::{Item, ItemId};
use vocab_pager_core::paginate::{sort_items, window, Filters, SortSpec};
use vocab_pager_core::store::Store;

use crate::config::QdrantConfig;

/// Qdrant implementation of the [`Store`] trait.
pub struct QdrantStore {
    client: Qdrant,
    max_scan: u64,
    scroll_batch: u32,
    vector_size: u64,
}

impl QdrantStore {
    /// Builds a client from `[qdrant]` settings. No request is made until
    /// the first store call.
    pub fn connect(config: &QdrantConfig) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.url);
        if let Some(api_key) = &config.api_key {
            builder = builder.api_key(api_key.clone());
        }
        builder = builder.timeout(Duration::from_secs(config.timeout_secs));

        let client = builder
            .build()
            .with_context(|| format!("Failed to build Qdrant client for {}", config.url))?;

        Ok(Self::from_client(client, config))
    }

    pub fn from_client(client: Qdrant, config: &QdrantConfig) -> Self {
        Self {
            client,
            max_scan: config.max_scan,
            scroll_batch: config.scroll_batch,
            vector_size: config.vector_size,
        }
    }

    /// Creates missing collections (cosine distance, configured vector
    /// size) and a keyword payload index for each filterable field.
    /// Read-only sub-views are skipped.
    pub async fn ensure_collections(&self, catalog: &Catalog) -> Result<()> {
        for spec in catalog.iter().filter(|s| !s.read_only) {
            if self.client.collection_exists(spec.source.as_str()).await? {
                println!("Collection '{}' already exists.", spec.source);
            } else {
                self.client
                    .create_collection(
                        CreateCollectionBuilder::new(&spec.source).vectors_config(
                            VectorParamsBuilder::new(self.vector_size, Distance::Cosine),
                        ),
                    )
                    .await
                    .with_context(|| format!("Failed to create collection '{}'", spec.source))?;
                println!("Created collection '{}'.", spec.source);
            }

            for field in &spec.filterable {
                self.client
                    .create_field_index(CreateFieldIndexCollectionBuilder::new(
                        &spec.source,
                        field,
                        FieldType::Keyword,
                    ))
                    .await
                    .with_context(|| {
                        format!("Failed to index '{}.{}'", spec.source, field)
                    })?;
            }
        }
        Ok(())
    }

    async fn scroll_all(&self, collection: &CollectionSpec, filters: &Filters) -> Result<Vec<Item>> {
        let filter = match build_filter(filters) {
            PointFilter::Nothing => return Ok(Vec::new()),
            PointFilter::All => None,
            PointFilter::Only(filter) => Some(filter),
        };
        let mut items = Vec::new();
        let mut next_offset: Option<PointId> = None;

        loop {
            let mut builder = ScrollPointsBuilder::new(&collection.source)
                .limit(self.scroll_batch)
                .with_payload(true)
                .with_vectors(false);
            if let Some(filter) = &filter {
                builder = builder.filter(filter.clone());
            }
            if let Some(offset) = next_offset.take() {
                builder = builder.offset(offset);
            }

            let response = self.client.scroll(builder).await?;
            for point in response.result {
                items.push(point_to_item(point)?);
            }

            ensure_within_scan(&collection.name, items.len() as u64, self.max_scan)?;

            match response.next_page_offset {
                Some(offset) => next_offset = Some(offset),
                None => break,
            }
        }

        Ok(items)
    }
}

/// Qdrant filter for a set of equality filters.
#[derive(Debug, Clone)]
pub enum PointFilter {
    /// No filters; every point matches.
    All,
    Only(Filter),
    /// An `id` filter that is neither an unsigned integer nor a UUID, which
    /// no point can carry.
    Nothing,
}

/// Equality filters as a Qdrant `must` filter.
///
/// `id` becomes a has-id condition. Values that parse as integers match
/// either a keyword or an integer payload, since filter values arrive as
/// text.
pub fn build_filter(filters: &Filters) -> PointFilter {
    if filters.is_empty() {
        return PointFilter::All;
    }

    let mut conditions = Vec::with_capacity(filters.len());
    for (field, value) in filters {
        if field == "id" {
            match text_to_point_id(value) {
                Some(point_id) => conditions.push(Condition::has_id([point_id])),
                None => return PointFilter::Nothing,
            }
            continue;
        }
        conditions.push(match value.parse::<i64>() {
            Ok(n) => Filter::should([
                Condition::matches(field.clone(), value.clone()),
                Condition::matches(field.clone(), n),
            ])
            .into(),
            Err(_) => Condition::matches(field.clone(), value.clone()),
        });
    }

    PointFilter::Only(Filter::must(conditions))
}

/// Point ids are unsigned integers or UUIDs.
fn text_to_point_id(value: &str) -> Option<PointId> {
    if let Ok(n) = value.parse::<u64>() {
        return Some(PointId::from(n));
    }
    Uuid::parse_str(value)
        .ok()
        .map(|uuid| PointId::from(uuid.to_string()))
}

fn ensure_within_scan(collection: &str, matched: u64, max_scan: u64) -> Result<()> {
    if matched > max_scan {
        bail!(
            "'{}' has {} matching points; client-side ordering is capped at max_scan ({})",
            collection,
            matched,
            max_scan
        );
    }
    Ok(())
}

/// Whether a page needs the working set scrolled at all. Fails when more
/// points match than can be ordered client-side.
fn needs_scan(collection: &str, total: u64, max_scan: u64, offset: u64) -> Result<bool> {
    ensure_within_scan(collection, total, max_scan)?;
    Ok(offset < total)
}

/// Orders a scrolled working set and cuts the requested window out of it.
pub fn page_from_working_set(
    collection: &str,
    mut items: Vec<Item>,
    max_scan: u64,
    sort: &SortSpec,
    offset: u64,
    limit: u64,
) -> Result<Vec<Item>> {
    ensure_within_scan(collection, items.len() as u64, max_scan)?;
    sort_items(&mut items, sort);
    Ok(window(items, offset, limit))
}

fn point_id_to_item_id(point_id: Option<PointId>) -> Result<ItemId> {
    use qdrant::point_id::PointIdOptions;

    match point_id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Num(n)) => Ok(i64::try_from(n)
            .map(ItemId::Int)
            .unwrap_or_else(|_| ItemId::Text(n.to_string()))),
        Some(PointIdOptions::Uuid(s)) => Ok(ItemId::Text(s)),
        None => Err(anyhow!("point without id")),
    }
}

fn point_to_item(point: RetrievedPoint) -> Result<Item> {
    let id = point_id_to_item_id(point.id)?;
    let fields = point
        .payload
        .into_iter()
        .filter(|(key, _)| key != "id")
        .filter_map(|(key, val)| qdrant_value_to_json(val).map(|v| (key, v)))
        .collect();
    Ok(Item { id, fields })
}

pub fn json_to_qdrant_value(val: Value) -> Option<QdrantValue> {
    match val {
        Value::Null => None,
        Value::Bool(b) => Some(QdrantValue::from(b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(QdrantValue::from(i))
            } else {
                n.as_f64().map(QdrantValue::from)
            }
        }
        Value::String(s) => Some(QdrantValue::from(s)),
        // Items are flat; nested values are kept as their JSON text
        other => Some(QdrantValue::from(other.to_string())),
    }
}

pub fn qdrant_value_to_json(val: QdrantValue) -> Option<Value> {
    use qdrant::value::Kind;

    match val.kind {
        Some(Kind::NullValue(_)) => Some(Value::Null),
        Some(Kind::BoolValue(b)) => Some(Value::Bool(b)),
        Some(Kind::IntegerValue(i)) => Some(Value::Number(i.into())),
        Some(Kind::DoubleValue(f)) => serde_json::Number::from_f64(f).map(Value::Number),
        Some(Kind::StringValue(s)) => Some(Value::String(s)),
        _ => None,
    }
}

#[async_trait]
impl Store for QdrantStore {
    fn backend(&self) -> &'static str {
        "qdrant"
    }

    async fn count(&self, collection: &CollectionSpec, filters: &Filters) -> Result<u64> {
        let mut builder = CountPointsBuilder::new(&collection.source).exact(true);
        match build_filter(filters) {
            PointFilter::Nothing => return Ok(0),
            PointFilter::All => {}
            PointFilter::Only(filter) => builder = builder.filter(filter),
        }
        let response = self.client.count(builder).await?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn fetch_slice(
        &self,
        collection: &CollectionSpec,
        filters: &Filters,
        sort: &SortSpec,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Item>> {
        let total = self.count(collection, filters).await?;
        if !needs_scan(&collection.name, total, self.max_scan, offset)? {
            return Ok(Vec::new());
        }

        let items = self.scroll_all(collection, filters).await?;
        page_from_working_set(&collection.name, items, self.max_scan, sort, offset, limit)
    }

    async fn insert(
        &self,
        collection: &CollectionSpec,
        fields: Map<String, Value>,
    ) -> Result<ItemId> {
        if collection.read_only {
            bail!("collection '{}' is read-only", collection.name);
        }

        let mut payload: HashMap<String, QdrantValue> = fields
            .into_iter()
            .filter_map(|(key, val)| json_to_qdrant_value(val).map(|v| (key, v)))
            .collect();
        payload
            .entry("created_at".to_string())
            .or_insert_with(|| QdrantValue::from(chrono::Utc::now().to_rfc3339()));

        let id = Uuid::new_v4().to_string();
        let point = PointStruct::new(
            id.clone(),
            vec![0.0_f32; self.vector_size as usize],
            payload,
        );

        self.client
            .upsert_points(UpsertPointsBuilder::new(&collection.source, vec![point]).wait(true))
            .await?;

        Ok(ItemId::Text(id))
    }
}
