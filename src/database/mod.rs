use std::str::FromStr;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::OnceCell;

use crate::db_migration;
use crate::errors::{DbError, DbResult};

const MAX_CONNECTIONS: u32 = 5;

/// Lazily opened handle to the local database, shared by the repositories built on it.
///
/// The first call to [`LocalDatabase::pool`] connects and migrates; later calls reuse the pool.
pub struct LocalDatabase {
    database_url: String,
    pool: OnceCell<SqlitePool>,
}

impl LocalDatabase {
    pub fn new(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            pool: OnceCell::new(),
        }
    }

    /// Wrap an already connected and migrated pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            database_url: String::new(),
            pool: OnceCell::new_with(Some(pool)),
        }
    }

    pub async fn pool(&self) -> DbResult<&SqlitePool> {
        self.pool
            .get_or_try_init(|| async { connect(&self.database_url).await })
            .await
    }

    pub fn is_open(&self) -> bool {
        self.pool.initialized()
    }

    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            log::info!("Database pool closed");
        }
    }
}

/// Open (creating if absent) the SQLite database at `database_url` and apply pending migrations.
///
/// In-memory databases are limited to a single connection, otherwise every pooled
/// connection would see its own empty database.
pub async fn connect(database_url: &str) -> DbResult<SqlitePool> {
    let in_memory = database_url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| DbError::ConnectionPool(format!("Invalid database URL {}: {}", database_url, e)))?
        .create_if_missing(true)
        .foreign_keys(true);
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { MAX_CONNECTIONS });
    if in_memory {
        pool_options = pool_options.idle_timeout(None).max_lifetime(None);
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|e| DbError::ConnectionPool(format!("Database connection failed: {}", e)))?;

    log::info!("Database connection established");

    db_migration::initialize_database(&pool).await?;
    Ok(pool)
}
