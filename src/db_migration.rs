use sqlx::SqlitePool;
use crate::errors::{DbError, DbResult};

// Embed all migration SQL files at compile time
const MIGRATION_WARDROBE: &str = include_str!("../migrations/20261001000000_wardrobe.sql");
const MIGRATION_SETTINGS: &str = include_str!("../migrations/20261001000001_settings.sql");
const MIGRATION_OUTFITS: &str = include_str!("../migrations/20261001000002_outfits.sql");

// List of migrations with their names and SQL content, in application order
const MIGRATIONS: &[(&str, &str)] = &[
    ("20261001000000_wardrobe.sql", MIGRATION_WARDROBE),
    ("20261001000001_settings.sql", MIGRATION_SETTINGS),
    ("20261001000002_outfits.sql", MIGRATION_OUTFITS),
];

/// Bring the database schema up to date.
pub async fn initialize_database(pool: &SqlitePool) -> DbResult<()> {
    log::info!("Starting database migration process");

    create_migrations_table(pool).await?;

    let last_migration = get_last_migration(pool).await?;
    match &last_migration {
        Some(name) => log::debug!("Last applied migration: {}", name),
        None => log::debug!("No migrations applied yet"),
    }

    apply_pending_migrations(pool, last_migration).await?;

    log::info!("Database migration process completed");
    Ok(())
}

async fn create_migrations_table(pool: &SqlitePool) -> DbResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )"
    )
    .execute(pool)
    .await
    .map_err(|e| DbError::Migration(format!("Failed to create migrations table: {}", e)))?;

    Ok(())
}

async fn get_last_migration(pool: &SqlitePool) -> DbResult<Option<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM migrations ORDER BY id DESC LIMIT 1"
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| DbError::Migration(format!("Failed to get last migration: {}", e)))
}

async fn apply_pending_migrations(pool: &SqlitePool, last_migration: Option<String>) -> DbResult<()> {
    let pending_migrations = get_pending_migrations(last_migration.as_deref());

    if pending_migrations.is_empty() {
        log::debug!("No pending migrations to apply");
        return Ok(());
    }

    let mut tx = pool.begin().await
        .map_err(|e| DbError::Transaction(format!("Failed to begin migration transaction: {}", e)))?;

    for (migration_name, migration_sql) in pending_migrations {
        log::info!("Applying migration: {}", migration_name);

        sqlx::query(migration_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Migration(format!("Failed to apply migration {}: {}", migration_name, e)))?;

        sqlx::query("INSERT INTO migrations (name, applied_at) VALUES (?, ?)")
            .bind(migration_name)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Migration(format!("Failed to record migration {}: {}", migration_name, e)))?;
    }

    tx.commit().await
        .map_err(|e| DbError::Transaction(format!("Failed to commit migrations: {}", e)))?;

    Ok(())
}

/// Migrations after `last_migration`, or all of them for a fresh database.
fn get_pending_migrations(last_migration: Option<&str>) -> Vec<(&'static str, &'static str)> {
    let mut pending = Vec::new();
    let mut should_include = last_migration.is_none();

    for &(migration_name, migration_sql) in MIGRATIONS {
        if should_include {
            pending.push((migration_name, migration_sql));
        } else if Some(migration_name) == last_migration {
            should_include = true;
        }
    }

    pending
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_migrations_for_fresh_database() {
        let pending = get_pending_migrations(None);
        assert_eq!(pending.len(), MIGRATIONS.len());
        assert_eq!(pending[0].0, "20261001000000_wardrobe.sql");
    }

    #[test]
    fn test_pending_migrations_after_first() {
        let pending = get_pending_migrations(Some("20261001000000_wardrobe.sql"));
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].0, "20261001000001_settings.sql");
    }

    #[test]
    fn test_no_pending_migrations_when_current() {
        let pending = get_pending_migrations(Some("20261001000002_outfits.sql"));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_initialize_is_repeatable() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_database(&pool).await.unwrap();
        initialize_database(&pool).await.unwrap();

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }
}
