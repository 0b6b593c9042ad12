//! Questionnaires and study progress

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use utr_common::db::QuestionnaireType;

use crate::db;
use crate::db::questionnaires::ResponseFilter;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub user_id: Option<i64>,
    pub session_id: Option<i64>,
    pub questionnaire_type: Option<String>,
    pub responses: Option<Value>,
}

/// POST /api/questionnaire/submit
pub async fn submit(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let user_id = req
        .user_id
        .ok_or_else(|| ApiError::BadRequest("user_id is required".to_string()))?;
    let kind = req
        .questionnaire_type
        .ok_or_else(|| ApiError::BadRequest("questionnaire_type is required".to_string()))?;
    let responses = req
        .responses
        .filter(|r| !r.is_null())
        .ok_or_else(|| ApiError::BadRequest("responses are required".to_string()))?;

    let kind = QuestionnaireType::parse(&kind).ok_or_else(|| {
        ApiError::BadRequest(
            "Invalid questionnaire_type. Must be \"pre-activity\" or \"post-activity\"".to_string(),
        )
    })?;
    if !responses.is_object() {
        return Err(ApiError::BadRequest("responses must be a dictionary".to_string()));
    }
    if kind == QuestionnaireType::PostActivity && req.session_id.is_none() {
        return Err(ApiError::BadRequest(
            "session_id is required for post-activity questionnaires".to_string(),
        ));
    }

    if !db::users::exists(&state.db, user_id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    if let Some(session_id) = req.session_id {
        let session = db::sessions::get(&state.db, session_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;
        if session.user_id != user_id {
            return Err(ApiError::Forbidden(
                "Session does not belong to this user".to_string(),
            ));
        }
    }

    let row = db::questionnaires::insert(&state.db, user_id, req.session_id, kind, &responses).await?;
    info!(
        user_id,
        session_id = ?req.session_id,
        questionnaire_type = kind.as_str(),
        response_id = row.id,
        "Questionnaire submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "response_id": row.id,
            "message": "Questionnaire submitted successfully",
        })),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserResponsesQuery {
    pub questionnaire_type: Option<String>,
    pub session_id: Option<i64>,
}

/// GET /api/questionnaire/user/:user_id
pub async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<UserResponsesQuery>,
) -> ApiResult<Json<Value>> {
    let filter = ResponseFilter {
        questionnaire_type: query.questionnaire_type.filter(|t| !t.is_empty()),
        session_id: query.session_id,
    };
    let responses = db::questionnaires::list_for_user(&state.db, user_id, &filter).await?;
    Ok(Json(json!({ "success": true, "responses": responses })))
}

/// GET /api/questionnaire/:id
pub async fn get_response(
    State(state): State<AppState>,
    Path(response_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let response = db::questionnaires::get(&state.db, response_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Questionnaire response not found".to_string()))?;
    Ok(Json(json!({ "success": true, "response": response })))
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub user_id: Option<i64>,
    pub questionnaire_type: Option<String>,
    pub session_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<i64>,
}

/// POST /api/questionnaire/check
pub async fn check(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CheckRequest>,
) -> ApiResult<Json<CheckResponse>> {
    let (user_id, kind) = match (req.user_id, req.questionnaire_type) {
        (Some(user_id), Some(kind)) => (user_id, kind),
        _ => {
            return Err(ApiError::BadRequest(
                "user_id and questionnaire_type are required".to_string(),
            ))
        }
    };

    let response_id =
        db::questionnaires::find_completed(&state.db, user_id, &kind, req.session_id).await?;
    Ok(Json(CheckResponse {
        completed: response_id.is_some(),
        response_id,
    }))
}

/// GET /api/completed-models/:user_id
pub async fn completed_models(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let models = db::questionnaires::completed_models(&state.db, user_id).await?;
    Ok(Json(json!({ "completed_models": models })))
}

#[derive(Debug, Serialize)]
pub struct StudyStatus {
    pub user_id: i64,
    pub pre_activity_completed: bool,
    pub completed_activities: i64,
    pub study_completed: bool,
    pub completed_models: Vec<String>,
    pub model_order: Vec<String>,
    /// First model in the participant's order without a post-activity
    /// questionnaire
    pub next_model: Option<String>,
}

/// First entry of `order` not in `completed`
pub fn next_model(order: &[String], completed: &[String]) -> Option<String> {
    order.iter().find(|m| !completed.contains(m)).cloned()
}

/// GET /api/study-status/:user_id
pub async fn study_status(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<StudyStatus>> {
    let user = db::users::get(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let pre_activity_completed = db::questionnaires::find_completed(
        &state.db,
        user_id,
        QuestionnaireType::PreActivity.as_str(),
        None,
    )
    .await?
    .is_some();
    let completed_activities =
        db::questionnaires::count_for_user(&state.db, user_id, QuestionnaireType::PostActivity)
            .await?;
    let completed_models = db::questionnaires::completed_models(&state.db, user_id).await?;
    let model_order = user.model_order_list();
    let next_model = next_model(&model_order, &completed_models);

    let required = state.config.required_activities as i64;
    Ok(Json(StudyStatus {
        user_id,
        pre_activity_completed,
        completed_activities,
        study_completed: completed_activities >= required,
        completed_models,
        model_order,
        next_model,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_next_model() {
        let order = ids(&["b", "a"]);
        assert_eq!(next_model(&order, &[]).as_deref(), Some("b"));
        assert_eq!(next_model(&order, &ids(&["b"])).as_deref(), Some("a"));
        assert_eq!(next_model(&order, &ids(&["a", "b"])), None);
        assert_eq!(next_model(&[], &[]), None);
    }
}
