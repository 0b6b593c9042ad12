//! Unlearning to Rest study server
//!
//! Serves the study frontend, records every participant interaction in
//! SQLite, and proxies the chat and image-generation models.

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use utr_common::StudyConfig;

pub mod api;
pub mod db;
pub mod error;
pub mod logging;
pub mod services;
pub mod storage;

pub use error::{ApiError, ApiResult};

use services::{ImageGenerator, ProviderRegistry};
use storage::StudyStorage;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<StudyConfig>,
    /// Chat provider per catalog model id
    pub providers: ProviderRegistry,
    pub images: Arc<dyn ImageGenerator>,
    pub storage: StudyStorage,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: StudyConfig,
        providers: ProviderRegistry,
        images: Arc<dyn ImageGenerator>,
    ) -> Self {
        let storage = StudyStorage::new(config.root_folder.clone());
        Self {
            db,
            config: Arc::new(config),
            providers,
            images,
            storage,
        }
    }
}

fn cors_layer(config: &StudyConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if config.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post, put};

    let study = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/login", post(api::auth::login))
        .route("/api/users/:user_id", get(api::auth::get_user))
        .route("/api/models", get(api::models::list_models))
        .route("/api/session", post(api::chat::create_session))
        .route("/api/session/:id", get(api::chat::get_session))
        .route("/api/chat", post(api::chat::chat))
        .route("/api/chat/stream", post(api::chat::chat_stream))
        .route("/api/reset", post(api::chat::reset_session))
        .route(
            "/api/session/:id/prompts",
            get(api::captures::list_prompts).post(api::captures::create_prompt),
        )
        .route(
            "/api/prompts/:id",
            put(api::captures::update_prompt).delete(api::captures::delete_prompt),
        )
        .route(
            "/api/session/:id/concepts",
            get(api::captures::list_concepts).post(api::captures::create_concept),
        )
        .route(
            "/api/concepts/:id",
            put(api::captures::update_concept).delete(api::captures::delete_concept),
        )
        .route("/api/generate-images/:session_id", post(api::images::generate_images))
        .route("/api/images/:session_id", get(api::images::list_images))
        .route("/api/image-file/:image_id", get(api::images::serve_image_file))
        .route("/api/questionnaire/submit", post(api::questionnaire::submit))
        .route("/api/questionnaire/check", post(api::questionnaire::check))
        .route(
            "/api/questionnaire/user/:user_id",
            get(api::questionnaire::list_for_user),
        )
        .route("/api/questionnaire/:id", get(api::questionnaire::get_response))
        .route(
            "/api/completed-models/:user_id",
            get(api::questionnaire::completed_models),
        )
        .route("/api/study-status/:user_id", get(api::questionnaire::study_status))
        .route("/admin/export", get(api::admin::export))
        .route("/admin/stats", get(api::admin::stats));

    let moodboard = Router::new()
        .route("/api/moodboard/upload", post(api::moodboard::upload))
        .route("/api/moodboard/:user_id", get(api::moodboard::list_for_user))
        .route(
            "/api/moodboard/image/:id",
            get(api::moodboard::serve_image).delete(api::moodboard::delete_image),
        )
        .route(
            "/api/moodboard/clear/:user_id",
            axum::routing::delete(api::moodboard::clear_for_user),
        )
        .layer(DefaultBodyLimit::max(api::moodboard::MAX_UPLOAD_BODY));

    let frontend = api::frontend_service(&state);
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(api::serve_login))
        .merge(study)
        .merge(moodboard)
        .merge(api::health_routes())
        .fallback_service(frontend)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
