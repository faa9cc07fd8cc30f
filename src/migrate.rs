use anyhow::Result;
use sqlx::SqlitePool;

/// Lookup tables share one shape: an integer id and a unique name.
const LOOKUP_TABLES: &[&str] = &["categories", "statuses", "authors", "tags"];

/// Create every table and index the SQLite store needs. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;

    for table in LOOKUP_TABLES {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            )"
        ))
        .execute(&mut *tx)
        .await?;
    }

    // Create records table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            summary TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL,
            hash TEXT NOT NULL UNIQUE,
            category_id INTEGER REFERENCES categories(id),
            status_id INTEGER REFERENCES statuses(id),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Join tables keep list order in `position`
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS record_authors (
            record_id TEXT NOT NULL REFERENCES records(id) ON DELETE CASCADE,
            author_id INTEGER NOT NULL REFERENCES authors(id),
            position INTEGER NOT NULL,
            PRIMARY KEY (record_id, author_id)
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS record_tags (
            record_id TEXT NOT NULL REFERENCES records(id) ON DELETE CASCADE,
            tag_id INTEGER NOT NULL REFERENCES tags(id),
            position INTEGER NOT NULL,
            PRIMARY KEY (record_id, tag_id)
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_title ON records(title)")
        .execute(&mut *tx)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_status ON records(status_id)")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
