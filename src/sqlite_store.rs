//! SQLite-backed [`Store`] implementation.
//!
//! Filtering, ordering, and slicing are pushed into SQL:
//!
//! ```sql
//! SELECT * FROM "words" WHERE "language" = ? ORDER BY "kanji" ASC, "id" ASC LIMIT ? OFFSET ?
//! ```
//!
//! Identifiers come from the collection catalog and are checked and quoted
//! before being spliced; values are always bound.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};

use vocab_pager_core::catalog::CollectionSpec;
use vocab_pager_core::models::{scalar_text, Item, ItemId};
use vocab_pager_core::paginate::{Filters, SortSpec};
use vocab_pager_core::store::Store;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// SQLite implementation of the [`Store`] trait.
///
/// Each collection's [`CollectionSpec::source`] names a table or view.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Double-quotes an identifier after checking it is a plain
/// `[A-Za-z_][A-Za-z0-9_]*` name.
pub fn quote_ident(name: &str) -> Result<String> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("invalid identifier: {:?}", name);
    }
    Ok(format!("\"{}\"", name))
}

fn where_clause(filters: &Filters) -> Result<String> {
    if filters.is_empty() {
        return Ok(String::new());
    }
    let conditions = filters
        .keys()
        .map(|field| quote_ident(field).map(|f| format!("{} = ?", f)))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(" WHERE {}", conditions.join(" AND ")))
}

fn bind_filters<'q>(mut query: SqliteQuery<'q>, filters: &'q Filters) -> SqliteQuery<'q> {
    for value in filters.values() {
        query = query.bind(value.as_str());
    }
    query
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s),
        other => query.bind(other.to_string()),
    }
}

/// Decodes one column by its runtime storage class.
fn column_value(row: &SqliteRow, index: usize) -> Result<Value> {
    let storage_class = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        raw.type_info().name().to_string()
    };

    let value = match storage_class.as_str() {
        "INTEGER" => Value::from(row.try_get::<i64, _>(index)?),
        "REAL" => Number::from_f64(row.try_get::<f64, _>(index)?)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        // Binary columns have no scalar representation
        "BLOB" => Value::Null,
        _ => Value::String(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}

fn row_to_item(row: &SqliteRow) -> Result<Item> {
    let mut id = None;
    let mut fields = Map::new();

    for (index, column) in row.columns().iter().enumerate() {
        let value = column_value(row, index)?;
        if column.name() == "id" {
            id = Some(match &value {
                Value::Number(n) if n.is_i64() => ItemId::Int(n.as_i64().unwrap_or_default()),
                other => ItemId::Text(scalar_text(other).unwrap_or_default()),
            });
        } else {
            fields.insert(column.name().to_string(), value);
        }
    }

    let id = id.ok_or_else(|| anyhow!("row has no id column"))?;
    Ok(Item { id, fields })
}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn count(&self, collection: &CollectionSpec, filters: &Filters) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            quote_ident(&collection.source)?,
            where_clause(filters)?
        );

        let mut query = sqlx::query_scalar::<Sqlite, i64>(&sql);
        for value in filters.values() {
            query = query.bind(value.as_str());
        }
        let total = query.fetch_one(&self.pool).await?;

        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn fetch_slice(
        &self,
        collection: &CollectionSpec,
        filters: &Filters,
        sort: &SortSpec,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT * FROM {}{} ORDER BY {} {}, \"id\" ASC LIMIT ? OFFSET ?",
            quote_ident(&collection.source)?,
            where_clause(filters)?,
            quote_ident(&sort.field)?,
            sort.order.as_sql(),
        );

        let limit = i64::try_from(limit).map_err(|_| anyhow!("limit out of range: {}", limit))?;
        let offset =
            i64::try_from(offset).map_err(|_| anyhow!("offset out of range: {}", offset))?;

        let rows = bind_filters(sqlx::query(&sql), filters)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_item).collect()
    }

    async fn insert(
        &self,
        collection: &CollectionSpec,
        fields: Map<String, Value>,
    ) -> Result<ItemId> {
        if collection.read_only {
            bail!("collection '{}' is read-only", collection.name);
        }

        let table = quote_ident(&collection.source)?;
        let sql = if fields.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table)
        } else {
            let columns = fields
                .keys()
                .map(|k| quote_ident(k))
                .collect::<Result<Vec<_>>>()?;
            let placeholders = vec!["?"; columns.len()].join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders
            )
        };

        let mut query = sqlx::query(&sql);
        for (_, value) in fields {
            query = bind_value(query, value);
        }
        let result = query.execute(&self.pool).await?;

        Ok(ItemId::Int(result.last_insert_rowid()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("words").unwrap(), "\"words\"");
        assert_eq!(quote_ident("_group_id2").unwrap(), "\"_group_id2\"");
        assert!(quote_ident("").is_err());
        assert!(quote_ident("2fast").is_err());
        assert!(quote_ident("kanji; DROP TABLE words").is_err());
        assert!(quote_ident("a\"b").is_err());
    }

    #[test]
    fn test_where_clause() {
        assert_eq!(where_clause(&Filters::new()).unwrap(), "");
        let mut filters = Filters::new();
        filters.insert("language".to_string(), "salish".to_string());
        filters.insert("group_id".to_string(), "1".to_string());
        assert_eq!(
            where_clause(&filters).unwrap(),
            " WHERE \"group_id\" = ? AND \"language\" = ?"
        );
    }
}
