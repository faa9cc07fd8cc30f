//! SQLite-backed [`Store`] implementation.
//!
//! Categories, statuses, authors and tags are normalized into lookup tables;
//! `record_authors` and `record_tags` keep list order in a `position`
//! column. Every mutation runs in its own transaction: it commits on success
//! and the transaction guard rolls back when dropped on an error path.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::error::SyncError;
use crate::migrate;
use crate::models::{content_hash, Document, Record, RecordUpdate};

use super::Store;

const RECORD_SELECT: &str = r#"
    SELECT r.id, r.title, r.summary, r.content, r.hash, r.created_at, r.updated_at,
           c.name AS category, s.name AS status
    FROM records r
    LEFT JOIN categories c ON c.id = r.category_id
    LEFT JOIN statuses s ON s.id = r.status_id
"#;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the database configured in `[db]`.
    pub async fn open(config: &Config) -> Result<Self> {
        Ok(Self::new(db::connect(config).await?))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn fetch_where(&self, clause: &str, arg: Option<&str>) -> Result<Vec<Record>> {
        let sql = format!("{RECORD_SELECT} {clause} ORDER BY r.rowid");
        let mut query = sqlx::query(&sql);
        if let Some(arg) = arg {
            query = query.bind(arg);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(self.materialize(row).await?);
        }
        Ok(records)
    }

    async fn fetch_one_where(&self, clause: &str, arg: &str) -> Result<Option<Record>> {
        let sql = format!("{RECORD_SELECT} {clause} ORDER BY r.rowid LIMIT 1");
        let row = sqlx::query(&sql)
            .bind(arg)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.materialize(&row).await?)),
            None => Ok(None),
        }
    }

    /// Turn a record row into a [`Record`], loading its authors and tags.
    async fn materialize(&self, row: &SqliteRow) -> Result<Record> {
        let id: String = row.get("id");

        let authors: Vec<String> = sqlx::query_scalar(
            "SELECT a.name FROM record_authors ra JOIN authors a ON a.id = ra.author_id
             WHERE ra.record_id = ? ORDER BY ra.position",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;

        let tags: Vec<String> = sqlx::query_scalar(
            "SELECT t.name FROM record_tags rt JOIN tags t ON t.id = rt.tag_id
             WHERE rt.record_id = ? ORDER BY rt.position",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Record {
            id,
            title: row.get("title"),
            content: row.get("content"),
            summary: row.get("summary"),
            category: row.get("category"),
            authors,
            tags,
            status: row.get("status"),
            hash: row.get("hash"),
            created_time: from_ts(row.get("created_at")),
            updated_time: from_ts(row.get("updated_at")),
        })
    }

    async fn require_record(&self, id: &str) -> Result<Record> {
        self.fetch_one_where("WHERE r.id = ?", id)
            .await?
            .ok_or_else(|| SyncError::RecordNotFound { id: id.to_string() }.into())
    }
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Lookup tables that map a name to an integer id.
#[derive(Clone, Copy)]
enum Lookup {
    Category,
    Status,
    Author,
    Tag,
}

impl Lookup {
    fn table(self) -> &'static str {
        match self {
            Lookup::Category => "categories",
            Lookup::Status => "statuses",
            Lookup::Author => "authors",
            Lookup::Tag => "tags",
        }
    }
}

/// Id of `name` in the lookup table, inserting it first if needed.
async fn lookup_id(conn: &mut SqliteConnection, lookup: Lookup, name: &str) -> Result<i64> {
    let table = lookup.table();
    sqlx::query(&format!("INSERT OR IGNORE INTO {table} (name) VALUES (?)"))
        .bind(name)
        .execute(&mut *conn)
        .await?;
    let id: i64 = sqlx::query_scalar(&format!("SELECT id FROM {table} WHERE name = ?"))
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

/// Replace the author and tag links of a record.
async fn replace_links(
    conn: &mut SqliteConnection,
    record_id: &str,
    authors: &[String],
    tags: &[String],
) -> Result<()> {
    sqlx::query("DELETE FROM record_authors WHERE record_id = ?")
        .bind(record_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM record_tags WHERE record_id = ?")
        .bind(record_id)
        .execute(&mut *conn)
        .await?;

    // Repeated names keep their first position.
    for (position, author) in authors.iter().enumerate() {
        let author_id = lookup_id(conn, Lookup::Author, author).await?;
        sqlx::query(
            "INSERT OR IGNORE INTO record_authors (record_id, author_id, position) VALUES (?, ?, ?)",
        )
        .bind(record_id)
        .bind(author_id)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }

    for (position, tag) in tags.iter().enumerate() {
        let tag_id = lookup_id(conn, Lookup::Tag, tag).await?;
        sqlx::query(
            "INSERT OR IGNORE INTO record_tags (record_id, tag_id, position) VALUES (?, ?, ?)",
        )
        .bind(record_id)
        .bind(tag_id)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Title of another record already holding `hash`, if any.
async fn hash_owner(
    conn: &mut SqliteConnection,
    hash: &str,
    except_id: Option<&str>,
) -> Result<Option<String>> {
    let title: Option<String> =
        sqlx::query_scalar("SELECT title FROM records WHERE hash = ? AND id IS NOT ? LIMIT 1")
            .bind(hash)
            .bind(except_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(title)
}

#[async_trait]
impl Store for SqliteStore {
    async fn ensure_schema(&self) -> Result<()> {
        migrate::run_migrations(&self.pool).await
    }

    async fn list_all(&self) -> Result<Vec<Record>> {
        self.fetch_where("", None).await
    }

    async fn list_by_status(&self, status: &str) -> Result<Vec<Record>> {
        self.fetch_where("WHERE s.name = ?", Some(status)).await
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<Record>> {
        self.fetch_where("WHERE c.name = ?", Some(category)).await
    }

    async fn list_by_tag(&self, tag: &str) -> Result<Vec<Record>> {
        self.fetch_where(
            "WHERE r.id IN (SELECT rt.record_id FROM record_tags rt
                            JOIN tags t ON t.id = rt.tag_id WHERE t.name = ?)",
            Some(tag),
        )
        .await
    }

    async fn list_by_author(&self, author: &str) -> Result<Vec<Record>> {
        self.fetch_where(
            "WHERE r.id IN (SELECT ra.record_id FROM record_authors ra
                            JOIN authors a ON a.id = ra.author_id WHERE a.name = ?)",
            Some(author),
        )
        .await
    }

    async fn get_by_title(&self, title: &str) -> Result<Option<Record>> {
        self.fetch_one_where("WHERE r.title = ?", title).await
    }

    async fn get_by_hash(&self, hash: &str) -> Result<Option<Record>> {
        self.fetch_one_where("WHERE r.hash = ?", hash).await
    }

    async fn set_status(&self, id: &str, status: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let status_id = lookup_id(&mut tx, Lookup::Status, status).await?;
        let result = sqlx::query("UPDATE records SET status_id = ? WHERE id = ?")
            .bind(status_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(SyncError::RecordNotFound { id: id.to_string() }.into());
        }
        tx.commit().await?;
        Ok(())
    }

    async fn create(&self, doc: &Document) -> Result<Record> {
        let hash = content_hash(&doc.content);
        let id = Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await?;
        if let Some(existing_title) = hash_owner(&mut tx, &hash, None).await? {
            return Err(SyncError::DuplicateContent {
                title: doc.title.clone(),
                existing_title,
                hash,
            }
            .into());
        }

        let category_id = lookup_id(&mut tx, Lookup::Category, &doc.category).await?;
        let status_id = lookup_id(&mut tx, Lookup::Status, &doc.status).await?;

        sqlx::query(
            r#"
            INSERT INTO records (id, title, summary, content, hash, category_id, status_id,
                                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&doc.title)
        .bind(&doc.summary)
        .bind(&doc.content)
        .bind(&hash)
        .bind(category_id)
        .bind(status_id)
        .bind(doc.created_time.timestamp())
        .bind(doc.updated_time.timestamp())
        .execute(&mut *tx)
        .await?;

        replace_links(&mut tx, &id, &doc.authors, &doc.tags).await?;
        tx.commit().await?;

        self.require_record(&id).await
    }

    async fn update(&self, id: &str, update: &RecordUpdate) -> Result<Record> {
        let hash = content_hash(&update.content);

        let mut tx = self.pool.begin().await?;
        if let Some(existing_title) = hash_owner(&mut tx, &hash, Some(id)).await? {
            return Err(SyncError::DuplicateContent {
                title: update.title.clone(),
                existing_title,
                hash,
            }
            .into());
        }

        let category_id = lookup_id(&mut tx, Lookup::Category, &update.category).await?;
        let status_id = lookup_id(&mut tx, Lookup::Status, &update.status).await?;

        let result = sqlx::query(
            r#"
            UPDATE records SET
                title = ?, summary = ?, content = ?, hash = ?,
                category_id = ?, status_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.title)
        .bind(&update.summary)
        .bind(&update.content)
        .bind(&hash)
        .bind(category_id)
        .bind(status_id)
        .bind(update.updated_time.timestamp())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(SyncError::RecordNotFound { id: id.to_string() }.into());
        }

        replace_links(&mut tx, id, &update.authors, &update.tags).await?;
        tx.commit().await?;

        self.require_record(id).await
    }

    async fn delete(&self, id: &str) -> Result<Record> {
        let record = self.require_record(id).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM record_authors WHERE record_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM record_tags WHERE record_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM records WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(SyncError::RecordNotFound { id: id.to_string() }.into());
        }
        tx.commit().await?;

        Ok(record)
    }
}
