//! Prompts and concepts captured during a chat session
//!
//! Both share one contract; the handlers below are thin per-kind wrappers
//! around the shared implementation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::info;
use utr_common::db::Capture;

use crate::db;
use crate::db::captures::{CaptureFields, CaptureKind};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::AppState;

pub const MAX_TITLE_CHARS: usize = 150;

/// Distinguishes an absent key (`None`) from an explicit `null` (`Some(None)`)
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptureRequest {
    #[serde(default, deserialize_with = "explicit_null")]
    pub content: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub source_message_id: Option<Option<i64>>,
}

fn clean_content(content: &str) -> ApiResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Content is required".to_string()));
    }
    Ok(content.to_string())
}

/// Blank titles become NULL
fn clean_title(title: Option<&str>) -> ApiResult<Option<String>> {
    let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Title must be {} characters or less",
            MAX_TITLE_CHARS
        )));
    }
    Ok(Some(title.to_string()))
}

async fn check_source_message(
    state: &AppState,
    session_id: i64,
    source_message_id: Option<i64>,
) -> ApiResult<()> {
    if let Some(message_id) = source_message_id {
        if db::sessions::get_message_in_session(&state.db, message_id, session_id)
            .await?
            .is_none()
        {
            return Err(ApiError::BadRequest(
                "Source message not found in this session".to_string(),
            ));
        }
    }
    Ok(())
}

async fn require_session(state: &AppState, session_id: i64) -> ApiResult<()> {
    if db::sessions::exists(&state.db, session_id).await? {
        Ok(())
    } else {
        Err(ApiError::NotFound("Session not found".to_string()))
    }
}

async fn require_capture(state: &AppState, kind: CaptureKind, id: i64) -> ApiResult<Capture> {
    db::captures::get(&state.db, kind, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{} not found", kind.label())))
}

async fn list(state: AppState, kind: CaptureKind, session_id: i64) -> ApiResult<Json<Value>> {
    require_session(&state, session_id).await?;
    let rows = db::captures::list_for_session(&state.db, kind, session_id).await?;
    Ok(Json(json!({ kind.table(): rows })))
}

async fn create(
    state: AppState,
    kind: CaptureKind,
    session_id: i64,
    req: CaptureRequest,
) -> ApiResult<(StatusCode, Json<Capture>)> {
    require_session(&state, session_id).await?;

    let fields = CaptureFields {
        content: clean_content(req.content.flatten().as_deref().unwrap_or_default())?,
        title: clean_title(req.title.flatten().as_deref())?,
        source_message_id: req.source_message_id.flatten(),
    };
    check_source_message(&state, session_id, fields.source_message_id).await?;

    let row = db::captures::create(&state.db, kind, session_id, &fields).await?;
    info!(session_id, id = row.id, kind = kind.table(), "Capture created");
    Ok((StatusCode::CREATED, Json(row)))
}

async fn update(
    state: AppState,
    kind: CaptureKind,
    id: i64,
    req: CaptureRequest,
) -> ApiResult<Json<Capture>> {
    let existing = require_capture(&state, kind, id).await?;

    let mut fields = CaptureFields {
        title: existing.title,
        content: existing.content,
        source_message_id: existing.source_message_id,
    };
    if let Some(content) = req.content {
        fields.content = clean_content(content.as_deref().unwrap_or_default())?;
    }
    if let Some(title) = req.title {
        fields.title = clean_title(title.as_deref())?;
    }
    if let Some(source) = req.source_message_id {
        check_source_message(&state, existing.session_id, source).await?;
        fields.source_message_id = source;
    }

    let row = db::captures::update(&state.db, kind, id, &fields).await?;
    info!(id, kind = kind.table(), "Capture updated");
    Ok(Json(row))
}

async fn delete(state: AppState, kind: CaptureKind, id: i64) -> ApiResult<Json<Value>> {
    if !db::captures::delete(&state.db, kind, id).await? {
        return Err(ApiError::NotFound(format!("{} not found", kind.label())));
    }
    info!(id, kind = kind.table(), "Capture deleted");
    Ok(Json(json!({ "success": true })))
}

/// GET /api/session/:id/prompts
pub async fn list_prompts(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    list(state, CaptureKind::Prompt, session_id).await
}

/// POST /api/session/:id/prompts
pub async fn create_prompt(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    ApiJson(req): ApiJson<CaptureRequest>,
) -> ApiResult<(StatusCode, Json<Capture>)> {
    create(state, CaptureKind::Prompt, session_id, req).await
}

/// PUT /api/prompts/:id
pub async fn update_prompt(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<CaptureRequest>,
) -> ApiResult<Json<Capture>> {
    update(state, CaptureKind::Prompt, id, req).await
}

/// DELETE /api/prompts/:id
pub async fn delete_prompt(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    delete(state, CaptureKind::Prompt, id).await
}

/// GET /api/session/:id/concepts
pub async fn list_concepts(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    list(state, CaptureKind::Concept, session_id).await
}

/// POST /api/session/:id/concepts
pub async fn create_concept(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    ApiJson(req): ApiJson<CaptureRequest>,
) -> ApiResult<(StatusCode, Json<Capture>)> {
    create(state, CaptureKind::Concept, session_id, req).await
}

/// PUT /api/concepts/:id
pub async fn update_concept(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<CaptureRequest>,
) -> ApiResult<Json<Capture>> {
    update(state, CaptureKind::Concept, id, req).await
}

/// DELETE /api/concepts/:id
pub async fn delete_concept(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    delete(state, CaptureKind::Concept, id).await
}
