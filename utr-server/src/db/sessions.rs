//! Chat session and message queries

use sqlx::SqlitePool;
use utr_common::db::{Message, Role, Session};
use utr_common::Result;

const SESSION_COLUMNS: &str = "id, user_id, model_name, created_at";
const MESSAGE_COLUMNS: &str = "id, session_id, role, content, timestamp";

pub async fn create(pool: &SqlitePool, user_id: i64, model_name: &str) -> Result<Session> {
    let session = sqlx::query_as::<_, Session>(&format!(
        "INSERT INTO sessions (user_id, model_name, created_at) VALUES (?, ?, ?) RETURNING {}",
        SESSION_COLUMNS
    ))
    .bind(user_id)
    .bind(model_name)
    .bind(utr_common::time::now())
    .fetch_one(pool)
    .await?;
    Ok(session)
}

pub async fn get(pool: &SqlitePool, session_id: i64) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>(&format!(
        "SELECT {} FROM sessions WHERE id = ?",
        SESSION_COLUMNS
    ))
    .bind(session_id)
    .fetch_optional(pool)
    .await?;
    Ok(session)
}

pub async fn exists(pool: &SqlitePool, session_id: i64) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?)")
        .bind(session_id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Session>> {
    let sessions = sqlx::query_as::<_, Session>(&format!(
        "SELECT {} FROM sessions ORDER BY created_at, id",
        SESSION_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(sessions)
}

/// Append a message to a session transcript
pub async fn insert_message(
    pool: &SqlitePool,
    session_id: i64,
    role: Role,
    content: &str,
) -> Result<Message> {
    let message = sqlx::query_as::<_, Message>(&format!(
        "INSERT INTO messages (session_id, role, content, timestamp) VALUES (?, ?, ?, ?) RETURNING {}",
        MESSAGE_COLUMNS
    ))
    .bind(session_id)
    .bind(role.as_str())
    .bind(content)
    .bind(utr_common::time::now())
    .fetch_one(pool)
    .await?;
    Ok(message)
}

/// Transcript in conversation order
pub async fn list_messages(pool: &SqlitePool, session_id: i64) -> Result<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(&format!(
        "SELECT {} FROM messages WHERE session_id = ? ORDER BY timestamp, id",
        MESSAGE_COLUMNS
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(messages)
}

/// A message, only if it belongs to `session_id`
pub async fn get_message_in_session(
    pool: &SqlitePool,
    message_id: i64,
    session_id: i64,
) -> Result<Option<Message>> {
    let message = sqlx::query_as::<_, Message>(&format!(
        "SELECT {} FROM messages WHERE id = ? AND session_id = ?",
        MESSAGE_COLUMNS
    ))
    .bind(message_id)
    .bind(session_id)
    .fetch_optional(pool)
    .await?;
    Ok(message)
}

pub async fn list_all_messages(pool: &SqlitePool) -> Result<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(&format!(
        "SELECT {} FROM messages ORDER BY timestamp, id",
        MESSAGE_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(messages)
}
