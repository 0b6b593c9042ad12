//! Image generation from captured prompts, and the session gallery

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};
use utr_common::db::GeneratedImage;

use crate::db;
use crate::db::captures::CaptureKind;
use crate::error::{ApiError, ApiResult};
use crate::services::image_generator::styled_prompt;
use crate::storage::StudyStorage;
use crate::AppState;

/// Image row plus the URL the gallery loads it from
#[derive(Debug, Serialize)]
pub struct ImageView {
    #[serde(flatten)]
    pub image: GeneratedImage,
    pub image_url: String,
}

impl From<GeneratedImage> for ImageView {
    fn from(image: GeneratedImage) -> Self {
        let image_url = format!("/api/image-file/{}", image.id);
        Self { image, image_url }
    }
}

/// POST /api/generate-images/:session_id
///
/// One image per prompt. Prompts that already have an image are reused, so
/// calling this again only fills in failures.
pub async fn generate_images(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if !db::sessions::exists(&state.db, session_id).await? {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }

    let prompts = db::captures::list_for_session(&state.db, CaptureKind::Prompt, session_id).await?;
    if prompts.is_empty() {
        return Ok(Json(json!({
            "success": true,
            "message": "No prompts to generate images for",
            "images": [],
        })));
    }

    info!(session_id, prompts = prompts.len(), "Generating images");
    let mut images = Vec::new();
    let mut errors = Vec::new();

    for prompt in &prompts {
        if let Some(existing) = db::images::find_for_prompt(&state.db, session_id, prompt.id).await? {
            images.push(ImageView::from(existing));
            continue;
        }

        let text = styled_prompt(&state.config.image_style_prefix, &prompt.content);
        let bytes = match state.images.generate(&text).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(session_id, prompt_id = prompt.id, error = %e, "Image generation failed");
                errors.push(format!("Failed to generate image for prompt {}", prompt.id));
                continue;
            }
        };

        let relative = StudyStorage::generated_image_path(session_id, prompt.id);
        state.storage.write(&relative, &bytes).await?;
        let row = db::images::insert(&state.db, session_id, prompt.id, &relative).await?;
        info!(session_id, prompt_id = prompt.id, image_id = row.id, "Image stored");
        images.push(ImageView::from(row));
    }

    let mut body = json!({
        "success": !images.is_empty(),
        "generated": images.len(),
        "total": prompts.len(),
        "images": images,
    });
    if !errors.is_empty() {
        body["errors"] = json!(errors);
    }
    Ok(Json(body))
}

/// GET /api/images/:session_id
pub async fn list_images(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let images: Vec<ImageView> = db::images::list_for_session(&state.db, session_id)
        .await?
        .into_iter()
        .map(ImageView::from)
        .collect();
    Ok(Json(json!({ "success": true, "images": images })))
}

/// GET /api/image-file/:image_id
pub async fn serve_image_file(
    State(state): State<AppState>,
    Path(image_id): Path<i64>,
) -> ApiResult<Response> {
    let image = db::images::get(&state.db, image_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found".to_string()))?;

    let bytes = state
        .storage
        .read(&image.image_path)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image file not found".to_string()))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}
