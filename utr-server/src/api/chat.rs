//! Chat sessions and model conversation
//!
//! Every turn is written to the transcript before and after the upstream
//! call, so the stored conversation is the record of what the participant
//! saw.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use utr_common::db::{Message, Role, Session};

use crate::db;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::services::{spawn_relay, ChatMessage, ChatProvider, RelayEvent};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: Option<i64>,
    pub model_name: Option<String>,
}

/// POST /api/session
pub async fn create_session(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let (user_id, model_name) = match (req.user_id, req.model_name) {
        (Some(user_id), Some(model_name)) if !model_name.trim().is_empty() => (user_id, model_name),
        _ => {
            return Err(ApiError::BadRequest(
                "user_id and model_name are required".to_string(),
            ))
        }
    };

    if !state.config.catalog.contains(&model_name) {
        return Err(ApiError::BadRequest(format!(
            "Invalid model. Must be one of: {}",
            state.config.catalog.ids().join(", ")
        )));
    }
    if !db::users::exists(&state.db, user_id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let session = db::sessions::create(&state.db, user_id, &model_name).await?;
    info!(session_id = session.id, user_id, model = %model_name, "Chat session created");
    Ok((StatusCode::CREATED, Json(session)))
}

#[derive(Debug, Serialize)]
pub struct SessionWithMessages {
    #[serde(flatten)]
    pub session: Session,
    pub messages: Vec<Message>,
}

/// GET /api/session/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<SessionWithMessages>> {
    let session = load_session(&state, session_id).await?;
    let messages = db::sessions::list_messages(&state.db, session_id).await?;
    Ok(Json(SessionWithMessages { session, messages }))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<i64>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub message_id: i64,
    pub timestamp: String,
}

impl From<&Message> for ChatResponse {
    fn from(message: &Message) -> Self {
        Self {
            response: message.content.clone(),
            message_id: message.id,
            timestamp: utr_common::time::to_api_string(&message.timestamp),
        }
    }
}

/// A validated turn: the session, its provider, and the full transcript
/// including the just-stored user message
struct PreparedTurn {
    session: Session,
    provider: Arc<dyn ChatProvider>,
    history: Vec<ChatMessage>,
}

async fn load_session(state: &AppState, session_id: i64) -> ApiResult<Session> {
    db::sessions::get(&state.db, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))
}

async fn prepare_turn(state: &AppState, req: ChatRequest) -> ApiResult<PreparedTurn> {
    let (session_id, message) = match (req.session_id, req.message) {
        (Some(session_id), Some(message)) => (session_id, message),
        _ => {
            return Err(ApiError::BadRequest(
                "session_id and message are required".to_string(),
            ))
        }
    };
    if message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".to_string()));
    }

    let session = load_session(state, session_id).await?;
    db::sessions::insert_message(&state.db, session_id, Role::User, &message).await?;

    let provider = state.providers.get(&session.model_name).ok_or_else(|| {
        ApiError::ServiceUnavailable(format!(
            "Model error: no provider for {}",
            session.model_name
        ))
    })?;

    let history = db::sessions::list_messages(&state.db, session_id)
        .await?
        .iter()
        .map(ChatMessage::from)
        .collect();

    Ok(PreparedTurn {
        session,
        provider,
        history,
    })
}

/// POST /api/chat
pub async fn chat(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let turn = prepare_turn(&state, req).await?;

    let reply = turn.provider.complete(&turn.history).await.map_err(|e| {
        warn!(session_id = turn.session.id, provider = turn.provider.name(), error = %e, "Completion failed");
        ApiError::ServiceUnavailable(format!("Model error: {}", e))
    })?;

    let stored =
        db::sessions::insert_message(&state.db, turn.session.id, Role::Assistant, &reply).await?;
    info!(session_id = turn.session.id, message_id = stored.id, "Assistant reply stored");
    Ok(Json(ChatResponse::from(&stored)))
}

/// POST /api/chat/stream
///
/// Events: `token` (`{"content": ..}`) per text delta, then either `done`
/// (`{message_id, timestamp, response}`) or `error` (`{error}`). Failing to
/// open the upstream stream is a plain 503 before any event.
pub async fn chat_stream(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let turn = prepare_turn(&state, req).await?;
    let session_id = turn.session.id;

    let tokens = turn.provider.stream(&turn.history).await.map_err(|e| {
        warn!(session_id, provider = turn.provider.name(), error = %e, "Could not open model stream");
        ApiError::ServiceUnavailable(format!("Model error: {}", e))
    })?;

    info!(session_id, provider = turn.provider.name(), "Streaming reply");
    let mut rx = spawn_relay(state.db.clone(), session_id, tokens);

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok(relay_event_to_sse(event));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn relay_event_to_sse(event: RelayEvent) -> Event {
    match event {
        RelayEvent::Token(text) => Event::default()
            .event("token")
            .data(json!({ "content": text }).to_string()),
        RelayEvent::Done(message) => Event::default()
            .event("done")
            .data(serde_json::to_string(&ChatResponse::from(&message)).unwrap_or_default()),
        RelayEvent::Error(error) => Event::default()
            .event("error")
            .data(json!({ "error": error }).to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub session_id: Option<i64>,
}

/// POST /api/reset
///
/// Starts a fresh session with the same participant and model. The old
/// transcript is kept.
pub async fn reset_session(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let session_id = req
        .session_id
        .ok_or_else(|| ApiError::BadRequest("session_id is required".to_string()))?;
    let old = load_session(&state, session_id).await?;

    let session = db::sessions::create(&state.db, old.user_id, &old.model_name).await?;
    info!(old_session_id = old.id, new_session_id = session.id, "Session reset");
    Ok(Json(json!({
        "success": true,
        "new_session_id": session.id,
        "message": "Session reset successfully",
    })))
}
