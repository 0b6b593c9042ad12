//! Participant login
//!
//! Email-only identification: no passwords and no session tokens. The
//! browser keeps the returned `user_id` and sends it with later requests.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::info;
use utr_common::db::User;

use crate::db;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::AppState;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"))
}

/// Trimmed, lowercased email, or the 400 message for it
pub fn normalize_email(raw: Option<&str>) -> Result<String, ApiError> {
    let email = raw.map(|e| e.trim().to_lowercase()).unwrap_or_default();
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email is required".to_string()));
    }
    if !email_regex().is_match(&email) {
        return Err(ApiError::BadRequest("Invalid email format".to_string()));
    }
    Ok(email)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub email: String,
    pub is_new_user: bool,
    pub model_order: Vec<String>,
}

/// POST /api/login
///
/// 200 for a returning participant, 201 when the email is new. New
/// participants get a shuffled model order for counterbalancing.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<(StatusCode, Json<LoginResponse>)> {
    let email = normalize_email(req.email.as_deref())?;

    if let Some(user) = db::users::find_by_email(&state.db, &email).await? {
        info!(user_id = user.id, "Participant logged in");
        let model_order = user.model_order_list();
        return Ok((
            StatusCode::OK,
            Json(LoginResponse {
                user_id: user.id,
                email: user.email,
                is_new_user: false,
                model_order,
            }),
        ));
    }

    let order = state.config.catalog.shuffled_order(&mut rand::thread_rng());
    let user = db::users::create(&state.db, &email, &order).await?;
    info!(user_id = user.id, model_order = %order, "New participant registered");

    let model_order = user.model_order_list();
    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            user_id: user.id,
            email: user.email,
            is_new_user: true,
            model_order,
        }),
    ))
}

/// GET /api/users/:user_id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<User>> {
    db::users::get(&state.db, user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}
