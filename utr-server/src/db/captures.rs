//! Prompt and concept queries
//!
//! `prompts` and `concepts` share one layout, so every query takes a
//! [`CaptureKind`] selecting the table.

use sqlx::SqlitePool;
use utr_common::db::Capture;
use utr_common::Result;

const CAPTURE_COLUMNS: &str =
    "id, session_id, title, content, source_message_id, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Prompt,
    Concept,
}

impl CaptureKind {
    pub fn table(&self) -> &'static str {
        match self {
            CaptureKind::Prompt => "prompts",
            CaptureKind::Concept => "concepts",
        }
    }

    /// Capitalized singular used in error messages ("Prompt not found")
    pub fn label(&self) -> &'static str {
        match self {
            CaptureKind::Prompt => "Prompt",
            CaptureKind::Concept => "Concept",
        }
    }
}

/// Fields written by create/update
#[derive(Debug, Clone, Default)]
pub struct CaptureFields {
    pub title: Option<String>,
    pub content: String,
    pub source_message_id: Option<i64>,
}

pub async fn list_for_session(
    pool: &SqlitePool,
    kind: CaptureKind,
    session_id: i64,
) -> Result<Vec<Capture>> {
    let rows = sqlx::query_as::<_, Capture>(&format!(
        "SELECT {} FROM {} WHERE session_id = ? ORDER BY created_at, id",
        CAPTURE_COLUMNS,
        kind.table()
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(pool: &SqlitePool, kind: CaptureKind, id: i64) -> Result<Option<Capture>> {
    let row = sqlx::query_as::<_, Capture>(&format!(
        "SELECT {} FROM {} WHERE id = ?",
        CAPTURE_COLUMNS,
        kind.table()
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn create(
    pool: &SqlitePool,
    kind: CaptureKind,
    session_id: i64,
    fields: &CaptureFields,
) -> Result<Capture> {
    let now = utr_common::time::now();
    let row = sqlx::query_as::<_, Capture>(&format!(
        "INSERT INTO {} (session_id, title, content, source_message_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
        kind.table(),
        CAPTURE_COLUMNS
    ))
    .bind(session_id)
    .bind(&fields.title)
    .bind(&fields.content)
    .bind(fields.source_message_id)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Overwrite the editable fields and bump `updated_at`
pub async fn update(
    pool: &SqlitePool,
    kind: CaptureKind,
    id: i64,
    fields: &CaptureFields,
) -> Result<Capture> {
    let row = sqlx::query_as::<_, Capture>(&format!(
        "UPDATE {} SET title = ?, content = ?, source_message_id = ?, updated_at = ? \
         WHERE id = ? RETURNING {}",
        kind.table(),
        CAPTURE_COLUMNS
    ))
    .bind(&fields.title)
    .bind(&fields.content)
    .bind(fields.source_message_id)
    .bind(utr_common::time::now())
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Returns false when nothing was deleted
pub async fn delete(pool: &SqlitePool, kind: CaptureKind, id: i64) -> Result<bool> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", kind.table()))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_all(pool: &SqlitePool, kind: CaptureKind) -> Result<Vec<Capture>> {
    let rows = sqlx::query_as::<_, Capture>(&format!(
        "SELECT {} FROM {} ORDER BY created_at, id",
        CAPTURE_COLUMNS,
        kind.table()
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
