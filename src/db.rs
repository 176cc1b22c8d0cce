//! SQLite connection setup for the destination database.

use crate::error::DbError;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection tuning.
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    /// Trade durability for write speed: no fsync, large cache, in-memory temp storage.
    pub live_hard_die_fast: bool,
    /// Pool size for file-backed databases. In-memory databases always use one connection.
    pub max_connections: u32,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            live_hard_die_fast: true,
            max_connections: 8,
        }
    }
}

/// Handle to the destination database, shared by every worker.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    uri: String,
}

impl Database {
    /// Open (creating if needed) the database at `uri`.
    ///
    /// `:memory:` (also `mem`, `modernc://mem`) opens a private in-memory
    /// database held by a single long-lived connection, so all workers see
    /// the same data. Anything else is a file path, optionally prefixed with
    /// `sqlite://`.
    pub async fn connect(uri: &str, options: &DatabaseOptions) -> Result<Self, DbError> {
        let in_memory = is_memory_uri(uri);

        let mut connect_options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            let path = uri.strip_prefix("sqlite://").unwrap_or(uri);
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        connect_options = connect_options.busy_timeout(BUSY_TIMEOUT);

        if options.live_hard_die_fast {
            connect_options = connect_options
                .synchronous(SqliteSynchronous::Off)
                .page_size(4096)
                .pragma("cache_size", "-262144")
                .pragma("temp_store", "MEMORY");
        }

        let pool_options = if in_memory {
            // Every connection to `:memory:` is a separate database; pin one.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(options.max_connections.max(1))
        };

        let pool = pool_options.connect_with(connect_options).await?;

        tracing::debug!(uri, in_memory, "connected to database");

        Ok(Self {
            pool,
            uri: uri.to_string(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Run `PRAGMA optimize`. Failure is logged, not returned.
    pub async fn optimize(&self) {
        if let Err(error) = sqlx::query("PRAGMA optimize").execute(&self.pool).await {
            tracing::warn!(%error, "unable to optimize database");
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_memory_uri(uri: &str) -> bool {
    matches!(
        uri,
        ":memory:" | "mem" | "modernc://mem" | "sqlite::memory:" | "sqlite://:memory:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_database_is_shared_across_queries() {
        let db = Database::connect(":memory:", &DatabaseOptions::default())
            .await
            .expect("connect");

        sqlx::query("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .execute(db.pool())
            .await
            .expect("create");

        // A second acquire must see the same in-memory database.
        let mut conn = db.pool().acquire().await.expect("acquire");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(&mut *conn)
            .await
            .expect("count");
        assert_eq!(count, 0);
        drop(conn);
    }

    #[tokio::test]
    async fn file_database_is_created() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("features.db");
        let uri = path.to_str().expect("path utf8");

        let db = Database::connect(uri, &DatabaseOptions::default())
            .await
            .expect("connect");
        db.optimize().await;
        db.close().await;

        assert!(path.exists());
    }
}
