//! Database schema migrations
//!
//! Versioned migrations tracked in the `schema_version` table. Each migration
//! is idempotent and safe to run against a database that already has the
//! change (fresh databases are created with the current table layout).
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - deployed study databases depend on them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Use ALTER TABLE** - participant data must never be dropped

use crate::config::ModelCatalog;
use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool, catalog: &ModelCatalog) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool, catalog).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    Ok(())
}

/// Migration v1: counterbalanced model order per user
///
/// Adds `users.model_order` when the table predates it, then assigns a
/// shuffled order to every user that has none.
async fn migrate_v1(pool: &SqlitePool, catalog: &ModelCatalog) -> Result<()> {
    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('users') WHERE name = 'model_order'",
    )
    .fetch_one(pool)
    .await?;

    if has_column == 0 {
        sqlx::query("ALTER TABLE users ADD COLUMN model_order TEXT")
            .execute(pool)
            .await?;
        info!("Migration v1: Added model_order column to users table");
    }

    backfill_model_orders(pool, catalog).await
}

/// Assign a shuffled model order to every user without one
pub async fn backfill_model_orders(pool: &SqlitePool, catalog: &ModelCatalog) -> Result<()> {
    let user_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM users WHERE model_order IS NULL")
        .fetch_all(pool)
        .await?;

    if user_ids.is_empty() {
        return Ok(());
    }

    // Orders are generated up front; ThreadRng is not Send across awaits
    let orders: Vec<String> = {
        let mut rng = rand::thread_rng();
        user_ids
            .iter()
            .map(|_| catalog.shuffled_order(&mut rng))
            .collect()
    };

    let mut tx = pool.begin().await?;
    for (user_id, order) in user_ids.iter().zip(orders) {
        sqlx::query("UPDATE users SET model_order = ? WHERE id = ?")
            .bind(order)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!("Assigned model orders to {} existing users", user_ids.len());
    Ok(())
}
