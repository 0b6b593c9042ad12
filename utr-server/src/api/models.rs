//! Model catalog endpoint

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

/// GET /api/models
///
/// Public catalog fields only; upstream model ids and credentials stay
/// server side.
pub async fn list_models(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "models": state.config.catalog.models() }))
}
