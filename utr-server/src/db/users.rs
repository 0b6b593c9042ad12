//! Participant queries

use sqlx::SqlitePool;
use utr_common::db::User;
use utr_common::Result;

const USER_COLUMNS: &str = "id, email, model_order, created_at";

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email = ?",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn get(pool: &SqlitePool, user_id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn exists(pool: &SqlitePool, user_id: i64) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

pub async fn create(pool: &SqlitePool, email: &str, model_order: &str) -> Result<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, model_order, created_at) VALUES (?, ?, ?) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(email)
    .bind(model_order)
    .bind(utr_common::time::now())
    .fetch_one(pool)
    .await?;
    Ok(user)
}

pub async fn set_model_order(pool: &SqlitePool, user_id: i64, model_order: &str) -> Result<()> {
    sqlx::query("UPDATE users SET model_order = ? WHERE id = ?")
        .bind(model_order)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users ORDER BY created_at, id",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(users)
}
