//! Aggregate counts for the admin endpoints

use sqlx::SqlitePool;
use std::collections::BTreeMap;
use utr_common::Result;

/// Row count of a known table
pub async fn count_rows(pool: &SqlitePool, table: &'static str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn sessions_by_model(pool: &SqlitePool) -> Result<BTreeMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT model_name, COUNT(id) FROM sessions GROUP BY model_name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Rows of `table` (which must have a `session_id` column) grouped by the
/// owning session's model
pub async fn rows_by_model(pool: &SqlitePool, table: &'static str) -> Result<BTreeMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(&format!(
        "SELECT s.model_name, COUNT(t.id) FROM {} t \
         JOIN sessions s ON s.id = t.session_id GROUP BY s.model_name",
        table
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}
