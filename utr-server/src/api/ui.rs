//! Static frontend serving
//!
//! The study screens are plain HTML/JS files in the configured frontend
//! directory. `/` opens the login screen; every other unmatched path is
//! looked up in the same directory.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use tower_http::services::ServeDir;
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

const LOGIN_PAGE: &str = "login.html";

/// GET /
pub async fn serve_login(State(state): State<AppState>) -> ApiResult<Response> {
    let path = state.config.frontend_dir.join(LOGIN_PAGE);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok((
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            bytes,
        )
            .into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Login page missing from frontend directory");
            Err(ApiError::NotFound("Frontend not found".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Fallback service for the rest of the frontend files
pub fn frontend_service(state: &AppState) -> ServeDir {
    ServeDir::new(&state.config.frontend_dir)
}
