//! Integration tests for the study API
//!
//! Covers health/build info, static frontend, login, model catalog,
//! prompts and concepts, image generation, moodboard uploads,
//! questionnaires/progress and the admin export.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;
use utr_server::db;

use helpers::fakes::FAKE_PNG;
use helpers::test_server::{ABLATED, LLAMA, LOGIN_HTML};
use helpers::{FakeImageGenerator, FakeProvider, TestServer};

// =============================================================================
// Health, build info, frontend
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start().await;
    let res = server.get("/health").await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "Unlearning to Rest User Study");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_buildinfo_endpoint() {
    let server = TestServer::start().await;
    let body = server.get("/api/buildinfo").await.json();
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["git_hash"].is_string());
    assert!(body["build_profile"].is_string());
}

#[tokio::test]
async fn test_frontend_served() {
    let server = TestServer::start().await;

    let res = server.get("/").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.text(), LOGIN_HTML);
    assert!(res.content_type.unwrap().starts_with("text/html"));

    let res = server.get("/app.js").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.text().contains("study"));

    let res = server.get("/missing.html").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_creates_then_returns_user() {
    let server = TestServer::start().await;

    let res = server
        .post_json("/api/login", json!({ "email": "  New.Person@Example.com " }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let first = res.json();
    assert_eq!(first["email"], "new.person@example.com");
    assert_eq!(first["is_new_user"], true);

    let mut order: Vec<String> = first["model_order"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    order.sort();
    let mut expected = vec![LLAMA.to_string(), ABLATED.to_string()];
    expected.sort();
    assert_eq!(order, expected);

    let res = server
        .post_json("/api/login", json!({ "email": "new.person@example.com" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let second = res.json();
    assert_eq!(second["is_new_user"], false);
    assert_eq!(second["user_id"], first["user_id"]);
    assert_eq!(second["model_order"], first["model_order"]);
}

#[tokio::test]
async fn test_login_validation() {
    let server = TestServer::start().await;

    let res = server.post_json("/api/login", json!({})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "Email is required");

    let res = server.post_json("/api/login", json!({ "email": "nope" })).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "Invalid email format");
}

#[tokio::test]
async fn test_get_user() {
    let server = TestServer::start().await;
    let user_id = server.login("someone@example.com").await;

    let res = server.get(&format!("/api/users/{}", user_id)).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["email"], "someone@example.com");
    assert!(body["model_order"].as_str().unwrap().contains(','));

    let res = server.get("/api/users/555").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Models
// =============================================================================

#[tokio::test]
async fn test_models_hide_upstream_details() {
    let server = TestServer::start().await;
    let body = server.get("/api/models").await.json();
    let models = body["models"].as_array().unwrap();

    assert_eq!(models.len(), 2);
    assert_eq!(models[0]["id"], LLAMA);
    assert_eq!(models[0]["provider"], "openrouter");
    assert_eq!(models[1]["id"], ABLATED);
    assert_eq!(models[1]["provider"], "huggingface");
    for model in models {
        assert!(model.get("model_id").is_none());
        assert!(model["name"].is_string());
        assert!(model["description"].is_string());
    }
}

// =============================================================================
// Prompts and concepts
// =============================================================================

#[tokio::test]
async fn test_prompt_crud() {
    let server = TestServer::start().await;
    let (_, session_id) = server.start_session("p1@example.com", LLAMA).await;
    let chat = server
        .post_json("/api/chat", json!({ "session_id": session_id, "message": "ideas?" }))
        .await
        .json();
    let message_id = chat["message_id"].as_i64().unwrap();

    let res = server
        .post_json(
            &format!("/api/session/{}/prompts", session_id),
            json!({ "content": "  A hammock desk  ", "title": "  ", "source_message_id": message_id }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let prompt = res.json();
    let prompt_id = prompt["id"].as_i64().unwrap();
    assert_eq!(prompt["content"], "A hammock desk");
    assert!(prompt["title"].is_null());
    assert_eq!(prompt["source_message_id"], message_id);

    let res = server
        .put_json(
            &format!("/api/prompts/{}", prompt_id),
            json!({ "title": "Desk", "source_message_id": null }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let updated = res.json();
    assert_eq!(updated["title"], "Desk");
    assert_eq!(updated["content"], "A hammock desk");
    assert!(updated["source_message_id"].is_null());

    let list = server
        .get(&format!("/api/session/{}/prompts", session_id))
        .await
        .json();
    assert_eq!(list["prompts"].as_array().unwrap().len(), 1);

    let res = server.delete(&format!("/api/prompts/{}", prompt_id)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["success"], true);

    let res = server.delete(&format!("/api/prompts/{}", prompt_id)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["error"], "Prompt not found");
}

#[tokio::test]
async fn test_prompt_validation() {
    let server = TestServer::start().await;
    let (_, session_id) = server.start_session("p1@example.com", LLAMA).await;
    let (_, other_session) = server.start_session("p2@example.com", LLAMA).await;
    let other_msg = server
        .post_json("/api/chat", json!({ "session_id": other_session, "message": "x" }))
        .await
        .json()["message_id"]
        .as_i64()
        .unwrap();
    let uri = format!("/api/session/{}/prompts", session_id);

    let res = server.post_json(&uri, json!({ "content": "   " })).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "Content is required");

    let res = server
        .post_json(&uri, json!({ "content": "ok", "title": "t".repeat(151) }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = server
        .post_json(&uri, json!({ "content": "ok", "source_message_id": other_msg }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "Source message not found in this session");

    let res = server.get("/api/session/999/prompts").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = server.put_json("/api/prompts/999", json!({ "content": "x" })).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let prompt_id = server.post_json(&uri, json!({ "content": "keep" })).await.json()["id"]
        .as_i64()
        .unwrap();
    let res = server
        .put_json(&format!("/api/prompts/{}", prompt_id), json!({ "content": null }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "Content is required");

    let res = server.get(&uri).await;
    assert_eq!(res.json()["prompts"][0]["content"], "keep");
}

#[tokio::test]
async fn test_concepts_are_separate_from_prompts() {
    let server = TestServer::start().await;
    let (_, session_id) = server.start_session("p1@example.com", ABLATED).await;

    let res = server
        .post_json(
            &format!("/api/session/{}/concepts", session_id),
            json!({ "content": "Rest as resistance", "title": "Resistance" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let concept_id = res.json()["id"].as_i64().unwrap();

    let concepts = server
        .get(&format!("/api/session/{}/concepts", session_id))
        .await
        .json();
    assert_eq!(concepts["concepts"].as_array().unwrap().len(), 1);
    let prompts = server
        .get(&format!("/api/session/{}/prompts", session_id))
        .await
        .json();
    assert!(prompts["prompts"].as_array().unwrap().is_empty());

    let res = server
        .put_json(&format!("/api/concepts/{}", concept_id), json!({ "content": "Rest, refined" }))
        .await;
    assert_eq!(res.json()["content"], "Rest, refined");

    let res = server.delete(&format!("/api/concepts/{}", concept_id)).await;
    assert_eq!(res.status, StatusCode::OK);
}

// =============================================================================
// Image generation
// =============================================================================

async fn add_prompt(server: &TestServer, session_id: i64, content: &str) -> i64 {
    server
        .post_json(
            &format!("/api/session/{}/prompts", session_id),
            json!({ "content": content }),
        )
        .await
        .json()["id"]
        .as_i64()
        .unwrap()
}

#[tokio::test]
async fn test_generate_images_without_prompts() {
    let server = TestServer::start().await;
    let (_, session_id) = server.start_session("p1@example.com", LLAMA).await;

    let body = server
        .post_json(&format!("/api/generate-images/{}", session_id), json!({}))
        .await
        .json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "No prompts to generate images for");
    assert!(body["images"].as_array().unwrap().is_empty());

    let res = server.post_json("/api/generate-images/999", json!({})).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generate_images_stores_and_reuses() {
    let server = TestServer::start().await;
    let (_, session_id) = server.start_session("p1@example.com", LLAMA).await;
    let prompt_id = add_prompt(&server, session_id, "a reclining stool").await;
    add_prompt(&server, session_id, "a floor cushion").await;

    let uri = format!("/api/generate-images/{}", session_id);
    let body = server.post_json(&uri, json!({})).await.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["generated"], 2);
    assert_eq!(body["total"], 2);
    assert!(body.get("errors").is_none());
    assert_eq!(server.images.call_count(), 2);

    let sent = server.images.prompts.lock().unwrap().clone();
    assert!(sent[0].ends_with(", a reclining stool"));
    assert!(sent[0].starts_with("A professional product design photograph"));

    let stored = server
        .root
        .path()
        .join(format!("images/session_{}/prompt_{}.png", session_id, prompt_id));
    assert_eq!(std::fs::read(stored).unwrap(), FAKE_PNG);

    // Second call reuses the rows
    let body = server.post_json(&uri, json!({})).await.json();
    assert_eq!(body["generated"], 2);
    assert_eq!(server.images.call_count(), 2);

    let gallery = server.get(&format!("/api/images/{}", session_id)).await.json();
    let images = gallery["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    let image_url = images[0]["image_url"].as_str().unwrap().to_string();

    let res = server.get(&image_url).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.content_type.as_deref(), Some("image/png"));
    assert_eq!(res.body, FAKE_PNG);
}

#[tokio::test]
async fn test_generate_images_reports_failures() {
    let server = TestServer::with_fakes(
        FakeProvider::replying(&["ok"]),
        FakeImageGenerator::failing_on("forbidden"),
    )
    .await;
    let (_, session_id) = server.start_session("p1@example.com", LLAMA).await;
    add_prompt(&server, session_id, "a forbidden chair").await;
    let ok_prompt = add_prompt(&server, session_id, "a daybed").await;

    let body = server
        .post_json(&format!("/api/generate-images/{}", session_id), json!({}))
        .await
        .json();
    assert_eq!(body["success"], true);
    assert_eq!(body["generated"], 1);
    assert_eq!(body["total"], 2);
    assert_eq!(body["images"][0]["prompt_id"], ok_prompt);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_image_file_missing() {
    let server = TestServer::start().await;
    let (_, session_id) = server.start_session("p1@example.com", LLAMA).await;
    let prompt_id = add_prompt(&server, session_id, "a nap pod").await;

    let res = server.get("/api/image-file/12345").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["error"], "Image not found");

    let row = db::images::insert(&server.db, session_id, prompt_id, "images/gone.png")
        .await
        .unwrap();
    let res = server.get(&format!("/api/image-file/{}", row.id)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["error"], "Image file not found");
}

// =============================================================================
// Moodboard
// =============================================================================

#[tokio::test]
async fn test_moodboard_upload_list_serve_delete() {
    let server = TestServer::start().await;
    let user_id = server.login("mood@example.com").await;
    let uid = user_id.to_string();

    let res = server
        .post_multipart(
            "/api/moodboard/upload",
            &[("user_id", uid.as_str())],
            Some(("my lounge.JPG", b"jpeg-bytes")),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.text());
    let image = res.json()["image"].clone();
    let image_id = image["id"].as_i64().unwrap();
    assert_eq!(image["original_filename"], "my_lounge.JPG");
    let path = image["image_path"].as_str().unwrap();
    assert!(path.starts_with(&format!("moodboard/user_{}/", user_id)));
    assert!(path.ends_with(".jpg"));

    let list = server.get(&format!("/api/moodboard/{}", user_id)).await.json();
    assert_eq!(list["images"].as_array().unwrap().len(), 1);

    let res = server.get(&format!("/api/moodboard/image/{}", image_id)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(res.body, b"jpeg-bytes");

    let res = server.delete(&format!("/api/moodboard/image/{}", image_id)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(!server.root.path().join(path).exists());

    let res = server.get(&format!("/api/moodboard/image/{}", image_id)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_moodboard_upload_validation() {
    let server = TestServer::start().await;
    let user_id = server.login("mood@example.com").await;
    let uid = user_id.to_string();
    let upload = "/api/moodboard/upload";

    let res = server.post_multipart(upload, &[], Some(("a.png", b"x"))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "User ID is required");

    let res = server
        .post_multipart(upload, &[("user_id", "abc")], Some(("a.png", b"x")))
        .await;
    assert_eq!(res.json()["error"], "Invalid user ID");

    let res = server
        .post_multipart(upload, &[("user_id", "9999")], Some(("a.png", b"x")))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = server.post_multipart(upload, &[("user_id", uid.as_str())], None).await;
    assert_eq!(res.json()["error"], "No file provided");

    let res = server
        .post_multipart(upload, &[("user_id", uid.as_str())], Some(("", b"x")))
        .await;
    assert_eq!(res.json()["error"], "No file selected");

    let res = server
        .post_multipart(upload, &[("user_id", uid.as_str())], Some(("notes.txt", b"x")))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.json()["error"].as_str().unwrap().starts_with("File type not allowed"));

    let big = vec![0u8; 10 * 1024 * 1024 + 1];
    let res = server
        .post_multipart(upload, &[("user_id", uid.as_str())], Some(("big.png", &big)))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.json()["error"].as_str().unwrap().starts_with("File too large"));
}

#[tokio::test]
async fn test_moodboard_clear() {
    let server = TestServer::start().await;
    let user_id = server.login("mood@example.com").await;
    let uid = user_id.to_string();
    for name in ["a.png", "b.webp", "c.gif"] {
        server
            .post_multipart("/api/moodboard/upload", &[("user_id", uid.as_str())], Some((name, b"img")))
            .await;
    }

    let res = server.delete(&format!("/api/moodboard/clear/{}", user_id)).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["deleted_count"], 3);
    assert_eq!(body["message"], "Cleared 3 images");

    let list = server.get(&format!("/api/moodboard/{}", user_id)).await.json();
    assert!(list["images"].as_array().unwrap().is_empty());

    let res = server.delete("/api/moodboard/clear/9999").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Questionnaires and study progress
// =============================================================================

#[tokio::test]
async fn test_questionnaire_submit_and_query() {
    let server = TestServer::start().await;
    let (user_id, session_id) = server.start_session("q@example.com", LLAMA).await;

    let res = server
        .post_json(
            "/api/questionnaire/submit",
            json!({ "user_id": user_id, "questionnaire_type": "pre-activity", "responses": { "q1": 4 } }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let pre_id = res.json()["response_id"].as_i64().unwrap();

    let res = server
        .post_json(
            "/api/questionnaire/submit",
            json!({
                "user_id": user_id,
                "session_id": session_id,
                "questionnaire_type": "post-activity",
                "responses": { "enjoyment": "high" }
            }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let all = server
        .get(&format!("/api/questionnaire/user/{}", user_id))
        .await
        .json();
    let responses = all["responses"].as_array().unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["questionnaire_type"], "post-activity");

    let pre_only = server
        .get(&format!(
            "/api/questionnaire/user/{}?questionnaire_type=pre-activity",
            user_id
        ))
        .await
        .json();
    assert_eq!(pre_only["responses"].as_array().unwrap().len(), 1);

    let one = server.get(&format!("/api/questionnaire/{}", pre_id)).await.json();
    assert_eq!(one["response"]["responses"]["q1"], 4);

    let res = server.get("/api/questionnaire/9999").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let check = server
        .post_json(
            "/api/questionnaire/check",
            json!({ "user_id": user_id, "questionnaire_type": "post-activity", "session_id": session_id }),
        )
        .await
        .json();
    assert_eq!(check["completed"], true);
    assert!(check["response_id"].is_i64());

    let check = server
        .post_json(
            "/api/questionnaire/check",
            json!({ "user_id": user_id, "questionnaire_type": "post-activity", "session_id": 424242 }),
        )
        .await
        .json();
    assert_eq!(check["completed"], false);
    assert!(check.get("response_id").is_none());
}

#[tokio::test]
async fn test_questionnaire_validation() {
    let server = TestServer::start().await;
    let (user_id, _) = server.start_session("q@example.com", LLAMA).await;
    let (_, foreign_session) = server.start_session("other@example.com", LLAMA).await;
    let submit = "/api/questionnaire/submit";

    let res = server
        .post_json(submit, json!({ "user_id": user_id, "questionnaire_type": "mid", "responses": {} }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = server
        .post_json(submit, json!({ "user_id": user_id, "questionnaire_type": "pre-activity", "responses": [1, 2] }))
        .await;
    assert_eq!(res.json()["error"], "responses must be a dictionary");

    let res = server
        .post_json(submit, json!({ "user_id": user_id, "questionnaire_type": "post-activity", "responses": {} }))
        .await;
    assert_eq!(
        res.json()["error"],
        "session_id is required for post-activity questionnaires"
    );

    let res = server
        .post_json(submit, json!({ "user_id": 9999, "questionnaire_type": "pre-activity", "responses": {} }))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = server
        .post_json(
            submit,
            json!({ "user_id": user_id, "session_id": foreign_session, "questionnaire_type": "post-activity", "responses": {} }),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.json()["error"], "Session does not belong to this user");
}

#[tokio::test]
async fn test_study_status_follows_model_order() {
    let server = TestServer::start().await;
    let user_id = server.login("status@example.com").await;

    let status = server.get(&format!("/api/study-status/{}", user_id)).await.json();
    assert_eq!(status["pre_activity_completed"], false);
    assert_eq!(status["completed_activities"], 0);
    assert_eq!(status["study_completed"], false);
    let order: Vec<String> = status["model_order"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(order.len(), 2);
    assert_eq!(status["next_model"], order[0].as_str());

    server
        .post_json(
            "/api/questionnaire/submit",
            json!({ "user_id": user_id, "questionnaire_type": "pre-activity", "responses": {} }),
        )
        .await;
    let session_id = server
        .post_json("/api/session", json!({ "user_id": user_id, "model_name": order[0] }))
        .await
        .json()["id"]
        .as_i64()
        .unwrap();
    server
        .post_json(
            "/api/questionnaire/submit",
            json!({ "user_id": user_id, "session_id": session_id, "questionnaire_type": "post-activity", "responses": {} }),
        )
        .await;

    let status = server.get(&format!("/api/study-status/{}", user_id)).await.json();
    assert_eq!(status["pre_activity_completed"], true);
    assert_eq!(status["completed_activities"], 1);
    assert_eq!(status["completed_models"], json!([order[0]]));
    assert_eq!(status["next_model"], order[1].as_str());

    let completed = server
        .get(&format!("/api/completed-models/{}", user_id))
        .await
        .json();
    assert_eq!(completed["completed_models"], json!([order[0]]));

    let res = server.get("/api/study-status/9999").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_resubmitted_post_activity_lists_model_once() {
    let server = TestServer::start().await;
    let (user_id, session_id) = server.start_session("twice@example.com", LLAMA).await;

    for _ in 0..2 {
        let res = server
            .post_json(
                "/api/questionnaire/submit",
                json!({ "user_id": user_id, "session_id": session_id, "questionnaire_type": "post-activity", "responses": {} }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
    }

    let completed = server
        .get(&format!("/api/completed-models/{}", user_id))
        .await
        .json();
    assert_eq!(completed["completed_models"], json!([LLAMA]));

    let status = server.get(&format!("/api/study-status/{}", user_id)).await.json();
    assert_eq!(status["completed_models"], json!([LLAMA]));
    assert_eq!(status["completed_activities"], 2);
}

// =============================================================================
// Admin
// =============================================================================

#[tokio::test]
async fn test_admin_export_and_stats() {
    let server = TestServer::start().await;
    let (_, llama_session) = server.start_session("a@example.com", LLAMA).await;
    let (_, ablated_session) = server.start_session("b@example.com", ABLATED).await;

    let reply_id = server
        .post_json("/api/chat", json!({ "session_id": ablated_session, "message": "hi" }))
        .await
        .json()["message_id"]
        .as_i64()
        .unwrap();
    server
        .post_json(
            &format!("/api/session/{}/concepts", ablated_session),
            json!({ "content": "idea", "source_message_id": reply_id }),
        )
        .await;
    add_prompt(&server, llama_session, "a lounge").await;

    let export = server.get("/admin/export").await.json();
    assert_eq!(export["summary"]["total_users"], 2);
    assert_eq!(export["summary"]["total_sessions"], 2);
    assert_eq!(export["summary"]["total_messages"], 2);
    assert_eq!(export["summary"]["total_concepts"], 1);
    assert_eq!(export["summary"]["sessions_by_model"][ABLATED], 1);

    let user_b = &export["users"][1];
    assert_eq!(user_b["email"], "b@example.com");
    let concept = &user_b["sessions"][0]["concepts"][0];
    assert_eq!(concept["source_message_role"], "assistant");
    assert_eq!(concept["source_message_excerpt"], "Hello there.");

    let stats = server.get("/admin/stats").await.json();
    assert_eq!(stats["total_users"], 2);
    assert_eq!(stats["total_prompts"], 1);
    assert_eq!(stats["sessions_by_model"][LLAMA], 1);
    assert_eq!(stats["concepts_by_model"][ABLATED], 1);
    assert_eq!(stats["prompts_by_model"][LLAMA], 1);
}
