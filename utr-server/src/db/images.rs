//! Generated image queries

use sqlx::SqlitePool;
use utr_common::db::GeneratedImage;
use utr_common::Result;

const IMAGE_COLUMNS: &str = "id, session_id, prompt_id, image_path, created_at";

pub async fn find_for_prompt(
    pool: &SqlitePool,
    session_id: i64,
    prompt_id: i64,
) -> Result<Option<GeneratedImage>> {
    let image = sqlx::query_as::<_, GeneratedImage>(&format!(
        "SELECT {} FROM generated_images WHERE session_id = ? AND prompt_id = ?",
        IMAGE_COLUMNS
    ))
    .bind(session_id)
    .bind(prompt_id)
    .fetch_optional(pool)
    .await?;
    Ok(image)
}

pub async fn insert(
    pool: &SqlitePool,
    session_id: i64,
    prompt_id: i64,
    image_path: &str,
) -> Result<GeneratedImage> {
    let image = sqlx::query_as::<_, GeneratedImage>(&format!(
        "INSERT INTO generated_images (session_id, prompt_id, image_path, created_at) \
         VALUES (?, ?, ?, ?) RETURNING {}",
        IMAGE_COLUMNS
    ))
    .bind(session_id)
    .bind(prompt_id)
    .bind(image_path)
    .bind(utr_common::time::now())
    .fetch_one(pool)
    .await?;
    Ok(image)
}

pub async fn get(pool: &SqlitePool, image_id: i64) -> Result<Option<GeneratedImage>> {
    let image = sqlx::query_as::<_, GeneratedImage>(&format!(
        "SELECT {} FROM generated_images WHERE id = ?",
        IMAGE_COLUMNS
    ))
    .bind(image_id)
    .fetch_optional(pool)
    .await?;
    Ok(image)
}

pub async fn list_for_session(pool: &SqlitePool, session_id: i64) -> Result<Vec<GeneratedImage>> {
    let images = sqlx::query_as::<_, GeneratedImage>(&format!(
        "SELECT {} FROM generated_images WHERE session_id = ? ORDER BY created_at, id",
        IMAGE_COLUMNS
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(images)
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<GeneratedImage>> {
    let images = sqlx::query_as::<_, GeneratedImage>(&format!(
        "SELECT {} FROM generated_images ORDER BY created_at, id",
        IMAGE_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(images)
}
