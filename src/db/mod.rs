/// Database layer for Quillpad
///
/// Manages the SQLite connection pool, migrations, and the row types
/// shared by the account, social and content services.

pub mod models;

use crate::error::{BlogError, BlogResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> BlogResult<SqlitePool> {
    if path.as_os_str() == ":memory:" {
        return create_memory_pool().await;
    }

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(if options.enable_wal {
                    SqliteJournalMode::Wal
                } else {
                    SqliteJournalMode::Delete
                })
                .foreign_keys(true)
                .busy_timeout(std::time::Duration::from_secs(5)),
        )
        .await?;

    Ok(pool)
}

/// Create an in-memory pool.
///
/// Every SQLite in-memory connection is its own database, so the pool is
/// capped at a single connection.
pub async fn create_memory_pool() -> BlogResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Run migrations for a database
/// Migrations are embedded at compile time from ./migrations directory
pub async fn run_migrations(pool: &SqlitePool) -> BlogResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| BlogError::Internal(format!("Migration failed: {}", e)))?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> BlogResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// In-memory database with the schema applied
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = create_memory_pool()
        .await
        .expect("in-memory sqlite pool");
    run_migrations(&pool).await.expect("migrations apply");
    pool
}

/// File-backed WAL database under `dir`, with several connections so
/// concurrent callers really interleave
#[cfg(test)]
pub async fn test_file_pool(dir: &Path) -> SqlitePool {
    let pool = create_pool(&dir.join("blog.db"), DatabaseOptions::default())
        .await
        .expect("file sqlite pool");
    run_migrations(&pool).await.expect("migrations apply");
    pool
}
