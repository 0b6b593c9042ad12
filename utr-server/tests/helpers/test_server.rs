//! Test server wrapper
//!
//! Drives the full router in-process with `oneshot`, backed by a temporary
//! root folder (database, images, moodboard) and a temporary frontend.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use utr_common::config::{ConfigOverrides, Secrets, StudyConfig, TomlConfig};
use utr_server::services::{ChatProvider, ImageGenerator, ProviderRegistry};
use utr_server::{build_router, db, AppState};

use super::fakes::{FakeImageGenerator, FakeProvider};

pub const LLAMA: &str = "meta-llama/Llama-3.2-3B-Instruct";
pub const ABLATED: &str = "martindisley/unlearning-to-rest";

pub const LOGIN_HTML: &str = "<html><body>login</body></html>";

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Should parse JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

pub struct TestServer {
    router: Router,
    pub db: SqlitePool,
    pub root: TempDir,
    pub provider: Arc<FakeProvider>,
    pub images: Arc<FakeImageGenerator>,
}

impl TestServer {
    /// Server whose models reply with "Hello there."
    pub async fn start() -> Self {
        Self::with_fakes(
            FakeProvider::replying(&["Hello", " there", "."]),
            FakeImageGenerator::default(),
        )
        .await
    }

    pub async fn with_provider(provider: FakeProvider) -> Self {
        Self::with_fakes(provider, FakeImageGenerator::default()).await
    }

    pub async fn with_fakes(provider: FakeProvider, images: FakeImageGenerator) -> Self {
        let root = TempDir::new().expect("Should create temp dir");
        let frontend = root.path().join("frontend");
        std::fs::create_dir_all(&frontend).unwrap();
        std::fs::write(frontend.join("login.html"), LOGIN_HTML).unwrap();
        std::fs::write(frontend.join("app.js"), "console.log('study');").unwrap();

        let overrides = ConfigOverrides {
            root_folder: Some(root.path().to_path_buf()),
            frontend_dir: Some(frontend),
            config_file: None,
        };
        let config = StudyConfig::from_parts(&overrides, TomlConfig::default(), Secrets::default());
        config.ensure_directories().unwrap();

        let pool = db::init_database(&config.database_path(), &config.catalog)
            .await
            .expect("Should initialize database");

        let provider = Arc::new(provider);
        let images = Arc::new(images);

        let mut registry = ProviderRegistry::new();
        for id in config.catalog.ids() {
            registry.insert(id, provider.clone() as Arc<dyn ChatProvider>);
        }

        let state = AppState::new(
            pool.clone(),
            config,
            registry,
            images.clone() as Arc<dyn ImageGenerator>,
        );

        Self {
            router: build_router(state),
            db: pool,
            root,
            provider,
            images,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router should respond");
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body")
            .to_vec();
        TestResponse {
            status,
            content_type,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(Request::delete(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.send_json("POST", uri, body).await
    }

    pub async fn put_json(&self, uri: &str, body: Value) -> TestResponse {
        self.send_json("PUT", uri, body).await
    }

    async fn send_json(&self, method: &str, uri: &str, body: Value) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// multipart/form-data upload; `file` is (file name, bytes)
    pub async fn post_multipart(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> TestResponse {
        const BOUNDARY: &str = "utr-test-boundary";
        let mut body: Vec<u8> = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Logs in `email` and returns the user id
    pub async fn login(&self, email: &str) -> i64 {
        let res = self
            .post_json("/api/login", serde_json::json!({ "email": email }))
            .await;
        assert!(res.status.is_success(), "login failed: {}", res.text());
        res.json()["user_id"].as_i64().unwrap()
    }

    /// New session for a new participant; returns (user_id, session_id)
    pub async fn start_session(&self, email: &str, model: &str) -> (i64, i64) {
        let user_id = self.login(email).await;
        let res = self
            .post_json(
                "/api/session",
                serde_json::json!({ "user_id": user_id, "model_name": model }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.text());
        (user_id, res.json()["id"].as_i64().unwrap())
    }
}

/// Parse an SSE body into (event, data) pairs
pub fn parse_sse(body: &str) -> Vec<(String, String)> {
    let mut events = Vec::new();
    for block in body.split("\n\n") {
        let mut event = String::from("message");
        let mut data: Vec<&str> = Vec::new();
        for line in block.lines() {
            if let Some(name) = line.strip_prefix("event:") {
                event = name.trim().to_string();
            } else if let Some(value) = line.strip_prefix("data:") {
                data.push(value.strip_prefix(' ').unwrap_or(value));
            }
        }
        if !data.is_empty() {
            events.push((event, data.join("\n")));
        }
    }
    events
}
