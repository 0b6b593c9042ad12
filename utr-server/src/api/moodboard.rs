//! Moodboard uploads
//!
//! Participants upload reference images before the chat activities. Files
//! are stored under `moodboard/user_<id>/` with a random name; the sanitized
//! original name is kept only for display.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use utr_common::db::MoodboardImage;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::storage::StudyStorage;
use crate::AppState;

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Request body cap for the upload route; leaves room for multipart framing
/// so oversize files reach the size check instead of a bare 413
pub const MAX_UPLOAD_BODY: usize = MAX_FILE_SIZE + 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct MoodboardView {
    #[serde(flatten)]
    pub image: MoodboardImage,
    pub image_url: String,
}

impl From<MoodboardImage> for MoodboardView {
    fn from(image: MoodboardImage) -> Self {
        let image_url = format!("/api/moodboard/image/{}", image.id);
        Self { image, image_url }
    }
}

/// Lowercased extension when it is an accepted image type
pub fn allowed_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Reduce a client-supplied name to `[A-Za-z0-9._-]`, without leading dots
/// or path components
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    cleaned.trim_start_matches(['.', '_']).to_string()
}

pub fn content_type_for(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::BadRequest(too_large_message())
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

fn too_large_message() -> String {
    format!("File too large. Maximum size: {}MB", MAX_FILE_SIZE / (1024 * 1024))
}

/// POST /api/moodboard/upload
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut user_id_field: Option<String> = None;
    let mut upload: Option<Upload> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("user_id") => {
                user_id_field = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                upload = Some(Upload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            other => debug!(field = ?other, "Ignoring multipart field"),
        }
    }

    let user_id_text = user_id_field
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest("User ID is required".to_string()))?;
    let user_id: i64 = user_id_text
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".to_string()))?;

    if !db::users::exists(&state.db, user_id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let upload = upload.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
    if upload.file_name.is_empty() {
        return Err(ApiError::BadRequest("No file selected".to_string()));
    }
    let ext = allowed_extension(&upload.file_name).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "File type not allowed. Allowed types: {}",
            ALLOWED_EXTENSIONS.join(", ")
        ))
    })?;
    if upload.bytes.len() > MAX_FILE_SIZE {
        return Err(ApiError::BadRequest(too_large_message()));
    }

    let stored_name = format!("{}.{}", uuid::Uuid::new_v4().simple(), ext);
    let relative = StudyStorage::moodboard_path(user_id, &stored_name);
    state.storage.write(&relative, &upload.bytes).await?;

    let mut original = sanitize_filename(&upload.file_name);
    if original.is_empty() {
        original = format!("upload.{}", ext);
    }
    let image = db::moodboard::insert(&state.db, user_id, &relative, &original).await?;
    info!(user_id, image_id = image.id, size = upload.bytes.len(), "Moodboard image uploaded");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "image": MoodboardView::from(image) })),
    ))
}

/// GET /api/moodboard/:user_id
pub async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if !db::users::exists(&state.db, user_id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    let images: Vec<MoodboardView> = db::moodboard::list_for_user(&state.db, user_id)
        .await?
        .into_iter()
        .map(MoodboardView::from)
        .collect();
    Ok(Json(json!({ "success": true, "images": images })))
}

async fn require_image(state: &AppState, image_id: i64) -> ApiResult<MoodboardImage> {
    db::moodboard::get(&state.db, image_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found".to_string()))
}

/// GET /api/moodboard/image/:id
pub async fn serve_image(
    State(state): State<AppState>,
    Path(image_id): Path<i64>,
) -> ApiResult<Response> {
    let image = require_image(&state, image_id).await?;
    let bytes = state
        .storage
        .read(&image.image_path)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image file not found".to_string()))?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&image.image_path))], bytes).into_response())
}

/// DELETE /api/moodboard/image/:id
pub async fn delete_image(
    State(state): State<AppState>,
    Path(image_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let image = require_image(&state, image_id).await?;
    if !state.storage.remove(&image.image_path).await? {
        warn!(image_id, path = %image.image_path, "Moodboard file already missing");
    }
    db::moodboard::delete(&state.db, image_id).await?;
    info!(image_id, user_id = image.user_id, "Moodboard image deleted");
    Ok(Json(json!({ "success": true, "message": "Image deleted successfully" })))
}

/// DELETE /api/moodboard/clear/:user_id
pub async fn clear_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if !db::users::exists(&state.db, user_id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let mut deleted_count = 0;
    for image in db::moodboard::list_for_user(&state.db, user_id).await? {
        state.storage.remove(&image.image_path).await?;
        db::moodboard::delete(&state.db, image.id).await?;
        deleted_count += 1;
    }
    info!(user_id, deleted_count, "Moodboard cleared");

    Ok(Json(json!({
        "success": true,
        "message": format!("Cleared {} images", deleted_count),
        "deleted_count": deleted_count,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extension() {
        assert_eq!(allowed_extension("sofa.PNG").as_deref(), Some("png"));
        assert_eq!(allowed_extension("a.b.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(allowed_extension("notes.txt"), None);
        assert_eq!(allowed_extension("noext"), None);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("my lounge chair.jpg"), "my_lounge_chair.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\pic.png"), "pic.png");
        assert_eq!(sanitize_filename(".hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename("日本.png"), "png");
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("moodboard/user_1/a.webp"), "image/webp");
        assert_eq!(content_type_for("moodboard/user_1/a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("moodboard/user_1/a"), "application/octet-stream");
    }
}
