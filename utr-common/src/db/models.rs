//! Database row models
//!
//! Each struct maps one table row and serializes to the JSON shape the
//! browser frontend and the admin export consume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::config::parse_model_order;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub model_order: Option<String>,
    #[serde(with = "crate::time::api_format")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Model ids in the order this participant should see them
    pub fn model_order_list(&self) -> Vec<String> {
        self.model_order
            .as_deref()
            .map(parse_model_order)
            .unwrap_or_default()
    }
}

/// Chat session: one conversation with one model
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub model_name: String,
    #[serde(with = "crate::time::api_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub session_id: i64,
    pub role: String,
    pub content: String,
    #[serde(with = "crate::time::api_format")]
    pub timestamp: DateTime<Utc>,
}

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Text captured from a chat session: a prompt or a concept.
///
/// Both tables share this layout; `source_message_id`, when present, points
/// at a message in the same session.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Capture {
    pub id: i64,
    pub session_id: i64,
    pub title: Option<String>,
    pub content: String,
    pub source_message_id: Option<i64>,
    #[serde(with = "crate::time::api_format")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::time::api_format")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GeneratedImage {
    pub id: i64,
    pub session_id: i64,
    pub prompt_id: i64,
    /// Relative to the root folder
    pub image_path: String,
    #[serde(with = "crate::time::api_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MoodboardImage {
    pub id: i64,
    pub user_id: i64,
    /// Relative to the root folder
    pub image_path: String,
    pub original_filename: String,
    #[serde(with = "crate::time::api_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionnaireResponse {
    pub id: i64,
    pub user_id: i64,
    pub session_id: Option<i64>,
    pub questionnaire_type: String,
    pub responses: Json<serde_json::Value>,
    #[serde(with = "crate::time::api_format")]
    pub created_at: DateTime<Utc>,
}

/// Which questionnaire a response belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionnaireType {
    #[serde(rename = "pre-activity")]
    PreActivity,
    #[serde(rename = "post-activity")]
    PostActivity,
}

impl QuestionnaireType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionnaireType::PreActivity => "pre-activity",
            QuestionnaireType::PostActivity => "post-activity",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pre-activity" => Some(QuestionnaireType::PreActivity),
            "post-activity" => Some(QuestionnaireType::PostActivity),
            _ => None,
        }
    }
}
