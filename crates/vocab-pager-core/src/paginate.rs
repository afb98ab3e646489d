//! Page requests, validation, and client-side ordering.
//!
//! Raw listing parameters ([`ListParams`]) are resolved against a
//! [`CollectionSpec`] into a validated [`PageRequest`] before any store is
//! touched. Backends without a native ordering primitive use
//! [`sort_items`] and [`window`] to order and slice a working set in
//! memory with the same semantics SQLite applies in `ORDER BY`:
//!
//! - missing fields and `null` sort lowest,
//! - then booleans, then numbers, then strings,
//! - ties are broken by item id ascending, so pages never overlap.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::catalog::CollectionSpec;
use crate::error::QueryError;
use crate::models::Item;

/// Equality filters: field name to the textual value it must equal.
pub type Filters = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("asc"),
            SortOrder::Desc => f.write_str("desc"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = QueryError;

    /// Case-insensitive: `asc`, `ASC`, and `Asc` are all accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(SortOrder::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(SortOrder::Desc)
        } else {
            Err(QueryError::invalid(
                "order",
                format!("order must be 'asc' or 'desc', got '{}'", s),
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

/// Unvalidated listing parameters as they arrive from HTTP or the CLI.
///
/// `None` means "use the collection default".
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub filters: Filters,
}

/// A validated page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
    pub sort: SortSpec,
    pub filters: Filters,
    offset: u64,
}

impl PageRequest {
    /// Validates `params` against `spec`.
    ///
    /// Fails with [`QueryError::InvalidArgument`] naming the offending
    /// parameter when `page < 1`, `per_page` is outside `1..=max_per_page`,
    /// `sort_by` is not whitelisted, `order` is not asc/desc, a filter
    /// field is not filterable, or the offset overflows.
    pub fn resolve(
        spec: &CollectionSpec,
        params: ListParams,
        max_per_page: u64,
    ) -> Result<Self, QueryError> {
        let page = params.page.unwrap_or(1);
        if page < 1 {
            return Err(QueryError::invalid(
                "page",
                format!("page must be >= 1, got {}", page),
            ));
        }

        let per_page = params
            .per_page
            .unwrap_or(spec.default_per_page.min(max_per_page) as i64);
        if per_page < 1 {
            return Err(QueryError::invalid(
                "per_page",
                format!("per_page must be >= 1, got {}", per_page),
            ));
        }
        if per_page as u64 > max_per_page {
            return Err(QueryError::invalid(
                "per_page",
                format!("per_page must be <= {}, got {}", max_per_page, per_page),
            ));
        }

        let sort_by = params
            .sort_by
            .unwrap_or_else(|| spec.default_sort.clone());
        if !spec.is_sortable(&sort_by) {
            return Err(QueryError::invalid(
                "sort_by",
                format!(
                    "Invalid sort_by field: {} (sortable: {})",
                    sort_by,
                    spec.sortable.join(", ")
                ),
            ));
        }

        let order = match params.order {
            Some(raw) => raw.parse::<SortOrder>()?,
            None => spec.default_order,
        };

        for field in params.filters.keys() {
            if !spec.is_filterable(field) {
                return Err(QueryError::invalid(
                    field.as_str(),
                    format!(
                        "Invalid filter field: {} (filterable: {})",
                        field,
                        spec.filterable.join(", ")
                    ),
                ));
            }
        }

        let (page, per_page) = (page as u64, per_page as u64);
        let offset = (page - 1).checked_mul(per_page).ok_or_else(|| {
            QueryError::invalid("page", format!("page {} is out of range", page))
        })?;

        Ok(Self {
            page,
            per_page,
            sort: SortSpec {
                field: sort_by,
                order,
            },
            filters: params.filters,
            offset,
        })
    }

    /// Index of the first item on this page: `(page - 1) * per_page`.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

/// The uniform page envelope returned for every collection and backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    pub page: u64,
    pub per_page: u64,
    /// Count of all items matching the filters, not just this page.
    pub total: u64,
    pub items: Vec<Item>,
}

impl PageResult {
    /// Number of pages needed to cover `total` at `per_page`.
    pub fn page_count(&self) -> u64 {
        if self.per_page == 0 {
            0
        } else {
            self.total.div_ceil(self.per_page)
        }
    }
}

/// Comparable projection of a field value.
#[derive(Debug)]
enum SortKey<'a> {
    Missing,
    Bool(bool),
    Number(f64),
    Text(&'a str),
}

impl SortKey<'_> {
    fn rank(&self) -> u8 {
        match self {
            SortKey::Missing => 0,
            SortKey::Bool(_) => 1,
            SortKey::Number(_) => 2,
            SortKey::Text(_) => 3,
        }
    }

    fn compare(&self, other: &SortKey<'_>) -> Ordering {
        match (self, other) {
            (SortKey::Bool(a), SortKey::Bool(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn sort_key<'a>(value: Option<&'a Value>) -> SortKey<'a> {
    match value {
        None | Some(Value::Null) => SortKey::Missing,
        Some(Value::Bool(b)) => SortKey::Bool(*b),
        Some(Value::Number(n)) => n.as_f64().map_or(SortKey::Missing, SortKey::Number),
        Some(Value::String(s)) => SortKey::Text(s),
        Some(Value::Array(_)) | Some(Value::Object(_)) => SortKey::Missing,
    }
}

/// Total order of two items under `sort`, id ascending as tie-breaker.
pub fn compare_items(a: &Item, b: &Item, sort: &SortSpec) -> Ordering {
    let primary = if sort.field == "id" {
        a.id.cmp(&b.id)
    } else {
        sort_key(a.get(&sort.field)).compare(&sort_key(b.get(&sort.field)))
    };
    let primary = match sort.order {
        SortOrder::Asc => primary,
        SortOrder::Desc => primary.reverse(),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

/// Stable in-place sort of a working set.
pub fn sort_items(items: &mut [Item], sort: &SortSpec) {
    items.sort_by(|a, b| compare_items(a, b, sort));
}

/// Returns the `[offset, offset + limit)` window of an ordered working set.
pub fn window(items: Vec<Item>, offset: u64, limit: u64) -> Vec<Item> {
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    items.into_iter().skip(offset).take(limit).collect()
}

/// True when every filter equals the item's textual field value.
pub fn matches_filters(item: &Item, filters: &Filters) -> bool {
    filters
        .iter()
        .all(|(field, expected)| item.filter_text(field).as_deref() == Some(expected.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn words() -> CollectionSpec {
        Catalog::builtin().get("words").unwrap().clone()
    }

    fn params(page: i64, per_page: i64, sort_by: &str, order: &str) -> ListParams {
        ListParams {
            page: Some(page),
            per_page: Some(per_page),
            sort_by: Some(sort_by.to_string()),
            order: Some(order.to_string()),
            filters: Filters::new(),
        }
    }

    fn invalid_field(err: QueryError) -> String {
        match err {
            QueryError::InvalidArgument { field, .. } => field,
            other => panic!("expected InvalidArgument, got {:?}", other),
        }
    }

    #[test]
    fn test_offset() {
        let req = PageRequest::resolve(&words(), params(3, 10, "kanji", "asc"), 100).unwrap();
        assert_eq!(req.offset(), 20);
        let req = PageRequest::resolve(&words(), params(1, 25, "kanji", "asc"), 100).unwrap();
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_defaults_applied() {
        let req = PageRequest::resolve(&words(), ListParams::default(), 100).unwrap();
        assert_eq!(req.page, 1);
        assert_eq!(req.per_page, 10);
        assert_eq!(req.sort.field, "kanji");
        assert_eq!(req.sort.order, SortOrder::Asc);
    }

    #[test]
    fn test_default_per_page_respects_cap() {
        let req = PageRequest::resolve(&words(), ListParams::default(), 5).unwrap();
        assert_eq!(req.per_page, 5);
    }

    #[test]
    fn test_page_below_one_rejected() {
        let err = PageRequest::resolve(&words(), params(0, 10, "kanji", "asc"), 100).unwrap_err();
        assert_eq!(invalid_field(err), "page");
        let err = PageRequest::resolve(&words(), params(-3, 10, "kanji", "asc"), 100).unwrap_err();
        assert_eq!(invalid_field(err), "page");
    }

    #[test]
    fn test_per_page_bounds() {
        let err = PageRequest::resolve(&words(), params(1, 0, "kanji", "asc"), 100).unwrap_err();
        assert_eq!(invalid_field(err), "per_page");
        let err = PageRequest::resolve(&words(), params(1, 101, "kanji", "asc"), 100).unwrap_err();
        assert_eq!(invalid_field(err), "per_page");
        assert!(PageRequest::resolve(&words(), params(1, 100, "kanji", "asc"), 100).is_ok());
    }

    #[test]
    fn test_unknown_sort_field_named() {
        let err = PageRequest::resolve(
            &words(),
            params(1, 10, "nonexistent_field", "asc"),
            100,
        )
        .unwrap_err();
        assert!(err.to_string().contains("nonexistent_field"));
        assert_eq!(invalid_field(err), "sort_by");
    }

    #[test]
    fn test_order_case_insensitive() {
        for raw in ["asc", "ASC", "Asc"] {
            assert_eq!(raw.parse::<SortOrder>().unwrap(), SortOrder::Asc);
        }
        for raw in ["desc", "DESC", "dEsC"] {
            assert_eq!(raw.parse::<SortOrder>().unwrap(), SortOrder::Desc);
        }
        for raw in ["", "ascending", "up", "des"] {
            assert!(raw.parse::<SortOrder>().is_err(), "accepted '{}'", raw);
        }
    }

    #[test]
    fn test_unknown_filter_rejected() {
        let mut p = params(1, 10, "kanji", "asc");
        p.filters.insert("color".to_string(), "red".to_string());
        let err = PageRequest::resolve(&words(), p, 100).unwrap_err();
        assert_eq!(invalid_field(err), "color");
    }

    #[test]
    fn test_offset_overflow_rejected() {
        let err =
            PageRequest::resolve(&words(), params(i64::MAX, 100, "kanji", "asc"), 100).unwrap_err();
        assert_eq!(invalid_field(err), "page");
    }

    #[test]
    fn test_sort_missing_fields_lowest() {
        let mut items = vec![
            Item::new(1).with("kanji", "b"),
            Item::new(2),
            Item::new(3).with("kanji", Value::Null),
            Item::new(4).with("kanji", "a"),
        ];
        let sort = SortSpec {
            field: "kanji".to_string(),
            order: SortOrder::Asc,
        };
        sort_items(&mut items, &sort);
        let ids: Vec<String> = items.iter().map(|i| i.id.to_string()).collect();
        assert_eq!(ids, vec!["2", "3", "4", "1"]);
    }

    #[test]
    fn test_sort_desc_keeps_id_tiebreak_ascending() {
        let mut items = vec![
            Item::new(3).with("correct_count", 1),
            Item::new(1).with("correct_count", 5),
            Item::new(2).with("correct_count", 1),
        ];
        let sort = SortSpec {
            field: "correct_count".to_string(),
            order: SortOrder::Desc,
        };
        sort_items(&mut items, &sort);
        let ids: Vec<String> = items.iter().map(|i| i.id.to_string()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_sort_mixed_types() {
        let mut items = vec![
            Item::new(1).with("v", "text"),
            Item::new(2).with("v", 2.5),
            Item::new(3).with("v", true),
            Item::new(4),
        ];
        let sort = SortSpec {
            field: "v".to_string(),
            order: SortOrder::Asc,
        };
        sort_items(&mut items, &sort);
        let ids: Vec<String> = items.iter().map(|i| i.id.to_string()).collect();
        assert_eq!(ids, vec!["4", "3", "2", "1"]);
    }

    #[test]
    fn test_window() {
        let items: Vec<Item> = (1..=25).map(Item::new).collect();
        assert_eq!(window(items.clone(), 20, 10).len(), 5);
        assert_eq!(window(items.clone(), 0, 10).len(), 10);
        assert!(window(items, 990, 10).is_empty());
    }

    #[test]
    fn test_matches_filters() {
        let item = Item::new(1).with("language", "italian");
        let mut filters = Filters::new();
        assert!(matches_filters(&item, &filters));
        filters.insert("language".to_string(), "salish".to_string());
        assert!(!matches_filters(&item, &filters));
        filters.insert("language".to_string(), "italian".to_string());
        assert!(matches_filters(&item, &filters));
    }

    #[test]
    fn test_page_count() {
        let result = PageResult {
            page: 1,
            per_page: 10,
            total: 25,
            items: Vec::new(),
        };
        assert_eq!(result.page_count(), 3);
    }
}
