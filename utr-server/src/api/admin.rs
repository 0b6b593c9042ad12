//! Admin export and statistics
//!
//! Unauthenticated; the study runs on a closed network and the team pulls
//! the export at the end of each day.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;
use utr_common::db::{
    Capture, GeneratedImage, Message, MoodboardImage, QuestionnaireResponse, Session, User,
};

use crate::db;
use crate::db::captures::CaptureKind;
use crate::error::ApiResult;
use crate::AppState;

/// Characters of the source message kept alongside an exported capture
pub const SOURCE_EXCERPT_CHARS: usize = 200;

/// Every row of the study, loaded in creation order
#[derive(Debug, Default)]
pub struct StudyRows {
    pub users: Vec<User>,
    pub sessions: Vec<Session>,
    pub messages: Vec<Message>,
    pub concepts: Vec<Capture>,
    pub prompts: Vec<Capture>,
    pub images: Vec<GeneratedImage>,
    pub moodboard: Vec<MoodboardImage>,
    pub questionnaires: Vec<QuestionnaireResponse>,
}

impl StudyRows {
    pub async fn load(state: &AppState) -> ApiResult<Self> {
        let pool = &state.db;
        Ok(Self {
            users: db::users::list_all(pool).await?,
            sessions: db::sessions::list_all(pool).await?,
            messages: db::sessions::list_all_messages(pool).await?,
            concepts: db::captures::list_all(pool, CaptureKind::Concept).await?,
            prompts: db::captures::list_all(pool, CaptureKind::Prompt).await?,
            images: db::images::list_all(pool).await?,
            moodboard: db::moodboard::list_all(pool).await?,
            questionnaires: db::questionnaires::list_all(pool).await?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ExportSummary {
    pub total_users: usize,
    pub total_sessions: usize,
    pub total_messages: usize,
    pub total_concepts: usize,
    pub total_prompts: usize,
    pub total_images: usize,
    pub total_moodboard_images: usize,
    pub total_questionnaires: usize,
    pub sessions_by_model: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
pub struct ExportMessage {
    pub id: i64,
    pub role: String,
    #[serde(with = "utr_common::time::api_format")]
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ExportCapture {
    pub id: i64,
    pub title: Option<String>,
    pub content: String,
    #[serde(with = "utr_common::time::api_format")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "utr_common::time::api_format")]
    pub updated_at: DateTime<Utc>,
    pub source_message_id: Option<i64>,
    pub source_message_excerpt: Option<String>,
    pub source_message_role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExportSession {
    pub id: i64,
    pub model_name: String,
    #[serde(with = "utr_common::time::api_format")]
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
    pub messages: Vec<ExportMessage>,
    pub concept_count: usize,
    pub concepts: Vec<ExportCapture>,
    pub prompt_count: usize,
    pub prompts: Vec<ExportCapture>,
    pub images: Vec<GeneratedImage>,
}

#[derive(Debug, Serialize)]
pub struct ExportUser {
    pub id: i64,
    pub email: String,
    pub model_order: Vec<String>,
    #[serde(with = "utr_common::time::api_format")]
    pub created_at: DateTime<Utc>,
    pub session_count: usize,
    pub concept_count: usize,
    pub sessions: Vec<ExportSession>,
    pub moodboard_images: Vec<MoodboardImage>,
    pub questionnaire_responses: Vec<QuestionnaireResponse>,
}

#[derive(Debug, Serialize)]
pub struct StudyExport {
    pub summary: ExportSummary,
    pub users: Vec<ExportUser>,
}

fn export_capture(capture: Capture, messages: &HashMap<i64, (String, String)>) -> ExportCapture {
    let source = capture.source_message_id.and_then(|id| messages.get(&id));
    ExportCapture {
        id: capture.id,
        title: capture.title,
        content: capture.content,
        created_at: capture.created_at,
        updated_at: capture.updated_at,
        source_message_id: capture.source_message_id,
        source_message_excerpt: source
            .map(|(_, content)| content.chars().take(SOURCE_EXCERPT_CHARS).collect()),
        source_message_role: source.map(|(role, _)| role.clone()),
    }
}

/// Nest the flat row lists into the per-participant export tree
pub fn assemble_export(rows: StudyRows) -> StudyExport {
    let mut sessions_by_model = BTreeMap::new();
    for session in &rows.sessions {
        *sessions_by_model.entry(session.model_name.clone()).or_insert(0) += 1;
    }

    let summary = ExportSummary {
        total_users: rows.users.len(),
        total_sessions: rows.sessions.len(),
        total_messages: rows.messages.len(),
        total_concepts: rows.concepts.len(),
        total_prompts: rows.prompts.len(),
        total_images: rows.images.len(),
        total_moodboard_images: rows.moodboard.len(),
        total_questionnaires: rows.questionnaires.len(),
        sessions_by_model,
    };

    let message_index: HashMap<i64, (String, String)> = rows
        .messages
        .iter()
        .map(|m| (m.id, (m.role.clone(), m.content.clone())))
        .collect();

    let mut sessions: BTreeMap<i64, ExportSession> = BTreeMap::new();
    let mut session_owner: HashMap<i64, i64> = HashMap::new();
    let mut session_order: Vec<i64> = Vec::new();
    for session in rows.sessions {
        session_owner.insert(session.id, session.user_id);
        session_order.push(session.id);
        sessions.insert(
            session.id,
            ExportSession {
                id: session.id,
                model_name: session.model_name,
                created_at: session.created_at,
                message_count: 0,
                messages: Vec::new(),
                concept_count: 0,
                concepts: Vec::new(),
                prompt_count: 0,
                prompts: Vec::new(),
                images: Vec::new(),
            },
        );
    }

    for message in rows.messages {
        if let Some(session) = sessions.get_mut(&message.session_id) {
            session.messages.push(ExportMessage {
                id: message.id,
                role: message.role,
                timestamp: message.timestamp,
                content: message.content,
            });
        }
    }
    for concept in rows.concepts {
        if let Some(session) = sessions.get_mut(&concept.session_id) {
            session.concepts.push(export_capture(concept, &message_index));
        }
    }
    for prompt in rows.prompts {
        if let Some(session) = sessions.get_mut(&prompt.session_id) {
            session.prompts.push(export_capture(prompt, &message_index));
        }
    }
    for image in rows.images {
        if let Some(session) = sessions.get_mut(&image.session_id) {
            session.images.push(image);
        }
    }

    let mut sessions_by_user: HashMap<i64, Vec<ExportSession>> = HashMap::new();
    for id in session_order {
        if let (Some(mut session), Some(owner)) = (sessions.remove(&id), session_owner.get(&id)) {
            session.message_count = session.messages.len();
            session.concept_count = session.concepts.len();
            session.prompt_count = session.prompts.len();
            sessions_by_user.entry(*owner).or_default().push(session);
        }
    }

    let mut moodboard_by_user: HashMap<i64, Vec<MoodboardImage>> = HashMap::new();
    for image in rows.moodboard {
        moodboard_by_user.entry(image.user_id).or_default().push(image);
    }
    let mut questionnaires_by_user: HashMap<i64, Vec<QuestionnaireResponse>> = HashMap::new();
    for response in rows.questionnaires {
        questionnaires_by_user
            .entry(response.user_id)
            .or_default()
            .push(response);
    }

    let users = rows
        .users
        .into_iter()
        .map(|user| {
            let sessions = sessions_by_user.remove(&user.id).unwrap_or_default();
            ExportUser {
                model_order: user.model_order_list(),
                id: user.id,
                email: user.email,
                created_at: user.created_at,
                session_count: sessions.len(),
                concept_count: sessions.iter().map(|s| s.concept_count).sum(),
                sessions,
                moodboard_images: moodboard_by_user.remove(&user.id).unwrap_or_default(),
                questionnaire_responses: questionnaires_by_user
                    .remove(&user.id)
                    .unwrap_or_default(),
            }
        })
        .collect();

    StudyExport { summary, users }
}

/// GET /admin/export
pub async fn export(State(state): State<AppState>) -> ApiResult<Json<StudyExport>> {
    let rows = StudyRows::load(&state).await?;
    let export = assemble_export(rows);
    info!(
        users = export.summary.total_users,
        sessions = export.summary.total_sessions,
        "Study data exported"
    );
    Ok(Json(export))
}

#[derive(Debug, Serialize)]
pub struct StudyStats {
    pub total_users: i64,
    pub total_sessions: i64,
    pub total_messages: i64,
    pub total_concepts: i64,
    pub total_prompts: i64,
    pub total_images: i64,
    pub total_moodboard_images: i64,
    pub total_questionnaires: i64,
    pub sessions_by_model: BTreeMap<String, i64>,
    pub concepts_by_model: BTreeMap<String, i64>,
    pub prompts_by_model: BTreeMap<String, i64>,
}

/// GET /admin/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<StudyStats>> {
    let pool = &state.db;
    Ok(Json(StudyStats {
        total_users: db::stats::count_rows(pool, "users").await?,
        total_sessions: db::stats::count_rows(pool, "sessions").await?,
        total_messages: db::stats::count_rows(pool, "messages").await?,
        total_concepts: db::stats::count_rows(pool, "concepts").await?,
        total_prompts: db::stats::count_rows(pool, "prompts").await?,
        total_images: db::stats::count_rows(pool, "generated_images").await?,
        total_moodboard_images: db::stats::count_rows(pool, "moodboard_images").await?,
        total_questionnaires: db::stats::count_rows(pool, "questionnaire_responses").await?,
        sessions_by_model: db::stats::sessions_by_model(pool).await?,
        concepts_by_model: db::stats::rows_by_model(pool, "concepts").await?,
        prompts_by_model: db::stats::rows_by_model(pool, "prompts").await?,
    }))
}
