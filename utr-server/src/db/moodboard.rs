//! Moodboard image queries

use sqlx::SqlitePool;
use utr_common::db::MoodboardImage;
use utr_common::Result;

const MOODBOARD_COLUMNS: &str = "id, user_id, image_path, original_filename, created_at";

pub async fn insert(
    pool: &SqlitePool,
    user_id: i64,
    image_path: &str,
    original_filename: &str,
) -> Result<MoodboardImage> {
    let image = sqlx::query_as::<_, MoodboardImage>(&format!(
        "INSERT INTO moodboard_images (user_id, image_path, original_filename, created_at) \
         VALUES (?, ?, ?, ?) RETURNING {}",
        MOODBOARD_COLUMNS
    ))
    .bind(user_id)
    .bind(image_path)
    .bind(original_filename)
    .bind(utr_common::time::now())
    .fetch_one(pool)
    .await?;
    Ok(image)
}

pub async fn get(pool: &SqlitePool, image_id: i64) -> Result<Option<MoodboardImage>> {
    let image = sqlx::query_as::<_, MoodboardImage>(&format!(
        "SELECT {} FROM moodboard_images WHERE id = ?",
        MOODBOARD_COLUMNS
    ))
    .bind(image_id)
    .fetch_optional(pool)
    .await?;
    Ok(image)
}

/// Oldest first, the order images were added to the board
pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<MoodboardImage>> {
    let images = sqlx::query_as::<_, MoodboardImage>(&format!(
        "SELECT {} FROM moodboard_images WHERE user_id = ? ORDER BY created_at ASC, id ASC",
        MOODBOARD_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(images)
}

pub async fn delete(pool: &SqlitePool, image_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM moodboard_images WHERE id = ?")
        .bind(image_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<MoodboardImage>> {
    let images = sqlx::query_as::<_, MoodboardImage>(&format!(
        "SELECT {} FROM moodboard_images ORDER BY created_at, id",
        MOODBOARD_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(images)
}
