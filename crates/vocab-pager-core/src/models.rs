//! Item model shared by every store backend.
//!
//! An [`Item`] is one record of a collection: an opaque [`ItemId`] plus a
//! flat map of scalar fields. It serializes flat, so a word renders as
//! `{"id": 1, "kanji": "山", "romaji": "yama", ...}` regardless of which
//! backend produced it.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unique identifier of an item.
///
/// SQLite rows and numeric Qdrant points carry integer ids; UUID points
/// carry text ids. Integers order numerically and sort before text ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Int(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Int(n) => write!(f, "{}", n),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

impl Ord for ItemId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ItemId::Int(a), ItemId::Int(b)) => a.cmp(b),
            (ItemId::Text(a), ItemId::Text(b)) => a.cmp(b),
            (ItemId::Int(_), ItemId::Text(_)) => Ordering::Less,
            (ItemId::Text(_), ItemId::Int(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for ItemId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<i64> for ItemId {
    fn from(n: i64) -> Self {
        ItemId::Int(n)
    }
}

impl From<i32> for ItemId {
    fn from(n: i32) -> Self {
        ItemId::Int(i64::from(n))
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::Text(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId::Text(s)
    }
}

/// A single record within a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter, mostly used by tests and the memory store.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Returns the field value, or `None` when the item lacks the field.
    /// `id` is not part of `fields`; use [`Item::id`] for it.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Renders a field the way equality filters compare it.
    ///
    /// `id` resolves to the item id. Nulls, missing fields, and non-scalar
    /// values have no filter representation and never match.
    pub fn filter_text(&self, field: &str) -> Option<String> {
        if field == "id" {
            return Some(self.id.to_string());
        }
        self.fields.get(field).and_then(scalar_text)
    }
}

/// Textual form of a scalar JSON value, `None` for null, arrays and objects.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Items hold scalar fields only.
pub fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}
