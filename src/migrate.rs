use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Creates the vocabulary schema. Idempotent.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = migrate_pool(&pool).await;
    pool.close().await;
    result
}

pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS words (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kanji TEXT,
            romaji TEXT,
            english TEXT NOT NULL,
            salish TEXT,
            language TEXT,
            parts TEXT,
            correct_count INTEGER NOT NULL DEFAULT 0,
            wrong_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            words_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS word_groups (
            word_id INTEGER NOT NULL,
            group_id INTEGER NOT NULL,
            PRIMARY KEY (word_id, group_id),
            FOREIGN KEY (word_id) REFERENCES words(id),
            FOREIGN KEY (group_id) REFERENCES groups(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Words joined to the groups they belong to, served as `GET /groups/{id}`
    sqlx::query(
        r#"
        CREATE VIEW IF NOT EXISTS group_words AS
        SELECT w.id, w.kanji, w.romaji, w.english, w.salish, w.language, w.parts,
               w.correct_count, w.wrong_count, w.created_at,
               wg.group_id AS group_id, g.name AS group_name
        FROM words w
        JOIN word_groups wg ON w.id = wg.word_id
        JOIN groups g ON g.id = wg.group_id
        "#,
    )
    .execute(pool)
    .await?;

    // groups.words_count follows word_groups membership
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS word_groups_count_insert
        AFTER INSERT ON word_groups
        BEGIN
            UPDATE groups SET words_count = words_count + 1 WHERE id = NEW.group_id;
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS word_groups_count_delete
        AFTER DELETE ON word_groups
        BEGIN
            UPDATE groups SET words_count = words_count - 1 WHERE id = OLD.group_id;
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_words_language ON words(language)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_word_groups_group_id ON word_groups(group_id)")
        .execute(pool)
        .await?;

    Ok(())
}
