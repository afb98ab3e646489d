//! Collection catalog.
//!
//! The catalog is the whitelist the query layer validates against: which
//! collections exist, which of their fields may be sorted on or filtered
//! by, and which defaults apply when a request omits them. Backends read
//! [`CollectionSpec::source`] to locate the physical table, view, or
//! vector-store collection.

use std::collections::BTreeMap;

use crate::error::QueryError;
use crate::paginate::SortOrder;

/// A child collection's link to its parent, e.g. `group_words.group_id -> groups.id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRelation {
    pub collection: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSpec {
    /// Logical name used in URLs and CLI arguments.
    pub name: String,
    /// Physical table, view, or vector-store collection name.
    pub source: String,
    pub sortable: Vec<String>,
    pub filterable: Vec<String>,
    /// Fields that must be present on insert.
    pub required: Vec<String>,
    /// Fields an insert may set besides the required ones.
    pub writable: Vec<String>,
    pub default_sort: String,
    pub default_order: SortOrder,
    pub default_per_page: u64,
    pub parent: Option<ParentRelation>,
    /// Views and joined sub-views reject inserts.
    pub read_only: bool,
}

impl CollectionSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            source: name.to_string(),
            sortable: vec!["id".to_string()],
            filterable: Vec::new(),
            required: Vec::new(),
            writable: Vec::new(),
            default_sort: "id".to_string(),
            default_order: SortOrder::Asc,
            default_per_page: 10,
            parent: None,
            read_only: false,
        }
    }

    pub fn sortable(mut self, fields: &[&str]) -> Self {
        self.sortable = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn filterable(mut self, fields: &[&str]) -> Self {
        self.filterable = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn required(mut self, fields: &[&str]) -> Self {
        self.required = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn writable(mut self, fields: &[&str]) -> Self {
        self.writable = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn default_sort(mut self, field: &str, order: SortOrder) -> Self {
        self.default_sort = field.to_string();
        self.default_order = order;
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn child_of(mut self, parent: &str, key: &str) -> Self {
        self.parent = Some(ParentRelation {
            collection: parent.to_string(),
            key: key.to_string(),
        });
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn is_sortable(&self, field: &str) -> bool {
        self.sortable.iter().any(|f| f == field)
    }

    pub fn is_writable(&self, field: &str) -> bool {
        !self.read_only
            && (self.writable.iter().any(|f| f == field)
                || self.required.iter().any(|f| f == field))
    }

    /// The parent key of a sub-view is always filterable.
    pub fn is_filterable(&self, field: &str) -> bool {
        self.filterable.iter().any(|f| f == field)
            || self.parent.as_ref().is_some_and(|p| p.key == field)
    }
}

/// Registry of collections by logical name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    collections: BTreeMap<String, CollectionSpec>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The vocabulary collections served out of the box: `words`,
    /// `groups`, and the `group_words` sub-view joining words to groups.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(
            CollectionSpec::new("words")
                .sortable(&[
                    "id",
                    "kanji",
                    "romaji",
                    "english",
                    "salish",
                    "language",
                    "correct_count",
                    "wrong_count",
                    "created_at",
                ])
                .filterable(&["language", "kanji", "romaji", "english", "salish"])
                .required(&["english"])
                .writable(&[
                    "kanji",
                    "romaji",
                    "salish",
                    "language",
                    "parts",
                    "correct_count",
                    "wrong_count",
                ])
                .default_sort("kanji", SortOrder::Asc),
        );
        catalog.register(
            CollectionSpec::new("groups")
                .sortable(&["id", "name", "words_count", "created_at"])
                .filterable(&["name"])
                .required(&["name"])
                .default_sort("name", SortOrder::Asc),
        );
        catalog.register(
            CollectionSpec::new("group_words")
                .sortable(&[
                    "id",
                    "kanji",
                    "romaji",
                    "english",
                    "correct_count",
                    "wrong_count",
                    "group_name",
                    "created_at",
                ])
                .filterable(&["language"])
                .default_sort("kanji", SortOrder::Asc)
                .child_of("groups", "group_id")
                .read_only(),
        );
        catalog
    }

    /// Adds or replaces a collection.
    pub fn register(&mut self, spec: CollectionSpec) {
        self.collections.insert(spec.name.clone(), spec);
    }

    pub fn get(&self, name: &str) -> Result<&CollectionSpec, QueryError> {
        self.collections
            .get(name)
            .ok_or_else(|| QueryError::unknown_collection(name))
    }

    /// The sub-view whose parent is `parent`, if one is registered.
    pub fn child_of(&self, parent: &str) -> Option<&CollectionSpec> {
        self.collections.values().find(|spec| {
            spec.parent
                .as_ref()
                .is_some_and(|p| p.collection == parent)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectionSpec> {
        self.collections.values()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}
