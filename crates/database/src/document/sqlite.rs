//! SQLite-backed document store.

use super::store::{Document, DocumentStore};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use recordbase_query::Query;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use tracing::{debug, instrument};

/// Embedded migrations that are run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
const MAX_CONNECTIONS: u32 = 5;
/// Host value that opens a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Documents stored as JSON text in SQLite.
///
/// SQLite has no document query engine, so [`find`](DocumentStore::find)
/// narrows by collection in SQL and evaluates the query in-process.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    async fn new(options: SqliteConnectOptions, max: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Backend("could not open document database".to_string()))?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Open (creating if missing) the database file at `path`.
    pub async fn connect(path: impl AsRef<Path>, max_connections: Option<u32>) -> Result<Self> {
        let options = Self::base_options().filename(path.as_ref()).create_if_missing(true);
        Self::new(options, max_connections.unwrap_or(MAX_CONNECTIONS)).await
    }

    /// Open a private in-memory database.
    ///
    /// In-memory databases are destroyed when the connection closes, and a
    /// second connection would see a different database, so the pool holds
    /// exactly one.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(IN_MEMORY);
        Self::new(options, 1).await
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    #[instrument("performing document database migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .or_raise(|| ErrorKind::Backend("could not migrate document database".to_string()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn backend(what: &str) -> ErrorKind {
    ErrorKind::Backend(format!("document database: {what}"))
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT name, content FROM documents WHERE collection = ? ORDER BY id")
                .bind(collection)
                .fetch_all(&self.pool)
                .await
                .or_raise(|| backend("find"))?;
        let mut found = Vec::new();
        for (name, content) in rows {
            let content = serde_json::from_str(&content).or_raise(|| backend("stored content is not JSON"))?;
            let document = Document::new(name, content);
            if query.matches(&document.to_value()).map_err(ErrorKind::query)? {
                found.push(document);
            }
        }
        debug!(collection, found = found.len(), "evaluated document query");
        Ok(found)
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<()> {
        let content = serde_json::to_string(&document.content).or_raise(|| backend("content is not serializable"))?;
        sqlx::query("INSERT INTO documents (collection, name, content) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(&document.name)
            .bind(content)
            .execute(&self.pool)
            .await
            .or_raise(|| backend("insert"))?;
        Ok(())
    }

    async fn remove(&self, collection: &str, name: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
                DELETE FROM documents WHERE id = (
                    SELECT id FROM documents WHERE collection = ? AND name = ? ORDER BY id LIMIT 1
                )
            "#,
        )
        .bind(collection)
        .bind(name)
        .execute(&self.pool)
        .await
        .or_raise(|| backend("remove"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn put_blob(&self, collection: &str, name: &str, data: Vec<u8>) -> Result<()> {
        sqlx::query(
            r#"
                INSERT INTO blobs (collection, recordname, data) VALUES (?, ?, ?)
                ON CONFLICT (collection, recordname) DO UPDATE SET data = excluded.data
            "#,
        )
        .bind(collection)
        .bind(name)
        .bind(data)
        .execute(&self.pool)
        .await
        .or_raise(|| backend("blob upload"))?;
        Ok(())
    }

    async fn get_blob(&self, collection: &str, name: &str) -> Result<Option<Vec<u8>>> {
        sqlx::query_scalar::<_, Vec<u8>>("SELECT data FROM blobs WHERE collection = ? AND recordname = ?")
            .bind(collection)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| backend("blob download"))
    }

    async fn remove_blob(&self, collection: &str, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM blobs WHERE collection = ? AND recordname = ?")
            .bind(collection)
            .bind(name)
            .execute(&self.pool)
            .await
            .or_raise(|| backend("blob removal"))?;
        Ok(result.rows_affected() > 0)
    }
}
