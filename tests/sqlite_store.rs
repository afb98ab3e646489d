//! The query service over a real SQLite database: SQL ordering and
//! slicing, the `group_words` view, and the insert path.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use tempfile::TempDir;

use vocab_pager::config::Config;
use vocab_pager::db;
use vocab_pager::migrate::migrate_pool;
use vocab_pager::service::QueryService;
use vocab_pager::sqlite_store::SqliteStore;
use vocab_pager::{Filters, ItemId, ListParams, QueryError};

async fn setup() -> (TempDir, QueryService, sqlx::SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.db.path = tmp.path().join("data").join("vocab.sqlite");

    let pool = db::connect(&config).await.unwrap();
    migrate_pool(&pool).await.unwrap();

    let store = Arc::new(SqliteStore::new(pool.clone()));
    let service = QueryService::from_config(&config, store).unwrap();
    (tmp, service, pool)
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

async fn insert_word(service: &QueryService, kanji: &str, english: &str, language: &str) -> i64 {
    let id = service
        .insert(
            "words",
            object(json!({"kanji": kanji, "english": english, "language": language})),
        )
        .await
        .unwrap();
    match id {
        ItemId::Int(n) => n,
        other => panic!("expected integer id, got {}", other),
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let (_tmp, _service, pool) = setup().await;
    migrate_pool(&pool).await.unwrap();
}

#[tokio::test]
async fn test_sorted_pages_from_sql() {
    let (_tmp, service, _pool) = setup().await;
    for i in 1..=25 {
        insert_word(&service, &format!("k{:02}", i), &format!("word {:02}", i), "japanese").await;
    }

    let result = service
        .query(
            "words",
            ListParams {
                page: Some(3),
                per_page: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result.total, 25);
    let kanji: Vec<&str> = result
        .items
        .iter()
        .map(|item| item.get("kanji").and_then(Value::as_str).unwrap())
        .collect();
    assert_eq!(kanji, vec!["k21", "k22", "k23", "k24", "k25"]);

    let desc = service
        .query(
            "words",
            ListParams {
                per_page: Some(2),
                sort_by: Some("english".to_string()),
                order: Some("desc".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(desc.items[0].get("english"), Some(&json!("word 25")));
    assert_eq!(desc.items[1].get("english"), Some(&json!("word 24")));
}

#[tokio::test]
async fn test_row_columns_become_item_fields() {
    let (_tmp, service, _pool) = setup().await;
    let id = insert_word(&service, "水", "water", "japanese").await;

    let result = service.query("words", ListParams::default()).await.unwrap();

    let item = &result.items[0];
    assert_eq!(item.id, ItemId::Int(id));
    assert_eq!(item.get("english"), Some(&json!("water")));
    assert_eq!(item.get("correct_count"), Some(&json!(0)));
    assert_eq!(item.get("romaji"), Some(&Value::Null));
    assert!(item.get("created_at").and_then(Value::as_str).is_some());
    assert!(item.get("id").is_none());
}

#[tokio::test]
async fn test_ties_break_by_id() {
    let (_tmp, service, _pool) = setup().await;
    let a = insert_word(&service, "同", "same a", "japanese").await;
    let b = insert_word(&service, "同", "same b", "japanese").await;

    for order in ["asc", "desc"] {
        let result = service
            .query(
                "words",
                ListParams {
                    order: Some(order.to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let ids: Vec<ItemId> = result.items.iter().map(|item| item.id.clone()).collect();
        assert_eq!(ids, vec![ItemId::Int(a), ItemId::Int(b)]);
    }
}

#[tokio::test]
async fn test_language_filter() {
    let (_tmp, service, _pool) = setup().await;
    insert_word(&service, "a", "to say", "salish").await;
    insert_word(&service, "b", "ready", "italian").await;
    insert_word(&service, "c", "drink", "salish").await;

    let mut filters = Filters::new();
    filters.insert("language".to_string(), "salish".to_string());
    let result = service
        .query(
            "words",
            ListParams {
                filters,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result.total, 2);
    assert!(result
        .items
        .iter()
        .all(|item| item.get("language") == Some(&json!("salish"))));
}

#[tokio::test]
async fn test_group_words_view() {
    let (_tmp, service, pool) = setup().await;
    let hello = insert_word(&service, "今日は", "hello", "japanese").await;
    let bye = insert_word(&service, "さようなら", "goodbye", "japanese").await;
    let rice = insert_word(&service, "ご飯", "rice", "japanese").await;

    let greetings = service
        .insert("groups", object(json!({"name": "Greetings"})))
        .await
        .unwrap();
    let food = service
        .insert("groups", object(json!({"name": "Food"})))
        .await
        .unwrap();

    for (word, group) in [(hello, &greetings), (bye, &greetings), (rice, &food)] {
        sqlx::query("INSERT INTO word_groups (word_id, group_id) VALUES (?, ?)")
            .bind(word)
            .bind(group.to_string().parse::<i64>().unwrap())
            .execute(&pool)
            .await
            .unwrap();
    }

    let result = service
        .query_child("groups", &greetings.to_string(), ListParams::default())
        .await
        .unwrap();

    assert_eq!(result.total, 2);
    let mut ids: Vec<ItemId> = result.items.iter().map(|item| item.id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec![ItemId::Int(hello), ItemId::Int(bye)]);
    assert!(result
        .items
        .iter()
        .all(|item| item.get("group_name") == Some(&json!("Greetings"))));

    let sorted = service
        .query_child(
            "groups",
            &greetings.to_string(),
            ListParams {
                sort_by: Some("english".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(sorted.items[0].get("english"), Some(&json!("goodbye")));

    let groups = service
        .query(
            "groups",
            ListParams {
                sort_by: Some("words_count".to_string()),
                order: Some("desc".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(groups.items[0].get("name"), Some(&json!("Greetings")));
    assert_eq!(groups.items[0].get("words_count"), Some(&json!(2)));
    assert_eq!(groups.items[1].get("words_count"), Some(&json!(1)));

    sqlx::query("DELETE FROM word_groups WHERE word_id = ?")
        .bind(bye)
        .execute(&pool)
        .await
        .unwrap();
    let after_delete = service
        .query(
            "groups",
            ListParams {
                sort_by: Some("words_count".to_string()),
                order: Some("desc".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(after_delete
        .items
        .iter()
        .all(|group| group.get("words_count") == Some(&json!(1))));

    let missing = service
        .query_child("groups", "4242", ListParams::default())
        .await
        .unwrap_err();
    assert!(matches!(missing, QueryError::NotFound(_)));
}

#[tokio::test]
async fn test_view_rejects_inserts() {
    let (_tmp, service, _pool) = setup().await;

    let err = service
        .insert("group_words", object(json!({"english": "water"})))
        .await
        .unwrap_err();

    assert!(matches!(err, QueryError::InvalidArgument { .. }));
}

#[tokio::test]
async fn test_unknown_field_insert_rejected_before_sql() {
    let (_tmp, service, pool) = setup().await;

    let err = service
        .insert("words", object(json!({"english": "water", "colour": "blue"})))
        .await
        .unwrap_err();

    match err {
        QueryError::InvalidArgument { field, message } => {
            assert_eq!(field, "colour");
            assert!(message.contains("english"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM words")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn test_missing_relation_fails_loud() {
    let (_tmp, service, pool) = setup().await;
    sqlx::query("DROP VIEW group_words")
        .execute(&pool)
        .await
        .unwrap();

    let err = service
        .query("group_words", ListParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, QueryError::StoreUnavailable { .. }));
    assert!(!err.is_retryable());
}
