//! Questionnaire response queries

use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use utr_common::db::{QuestionnaireResponse, QuestionnaireType};
use utr_common::Result;

const RESPONSE_COLUMNS: &str =
    "id, user_id, session_id, questionnaire_type, responses, created_at";

pub async fn insert(
    pool: &SqlitePool,
    user_id: i64,
    session_id: Option<i64>,
    questionnaire_type: QuestionnaireType,
    responses: &serde_json::Value,
) -> Result<QuestionnaireResponse> {
    let row = sqlx::query_as::<_, QuestionnaireResponse>(&format!(
        "INSERT INTO questionnaire_responses \
         (user_id, session_id, questionnaire_type, responses, created_at) \
         VALUES (?, ?, ?, ?, ?) RETURNING {}",
        RESPONSE_COLUMNS
    ))
    .bind(user_id)
    .bind(session_id)
    .bind(questionnaire_type.as_str())
    .bind(Json(responses))
    .bind(utr_common::time::now())
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn get(pool: &SqlitePool, response_id: i64) -> Result<Option<QuestionnaireResponse>> {
    let row = sqlx::query_as::<_, QuestionnaireResponse>(&format!(
        "SELECT {} FROM questionnaire_responses WHERE id = ?",
        RESPONSE_COLUMNS
    ))
    .bind(response_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Optional filters for listing one participant's responses.
/// `questionnaire_type` is matched verbatim.
#[derive(Debug, Clone, Default)]
pub struct ResponseFilter {
    pub questionnaire_type: Option<String>,
    pub session_id: Option<i64>,
}

/// Newest first
pub async fn list_for_user(
    pool: &SqlitePool,
    user_id: i64,
    filter: &ResponseFilter,
) -> Result<Vec<QuestionnaireResponse>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM questionnaire_responses WHERE user_id = ",
        RESPONSE_COLUMNS
    ));
    query.push_bind(user_id);

    if let Some(kind) = &filter.questionnaire_type {
        query.push(" AND questionnaire_type = ").push_bind(kind.clone());
    }
    if let Some(session_id) = filter.session_id {
        query.push(" AND session_id = ").push_bind(session_id);
    }
    query.push(" ORDER BY created_at DESC, id DESC");

    let rows = query
        .build_query_as::<QuestionnaireResponse>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// First matching response id, if the questionnaire was completed
pub async fn find_completed(
    pool: &SqlitePool,
    user_id: i64,
    questionnaire_type: &str,
    session_id: Option<i64>,
) -> Result<Option<i64>> {
    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id FROM questionnaire_responses WHERE user_id = ");
    query.push_bind(user_id);
    query
        .push(" AND questionnaire_type = ")
        .push_bind(questionnaire_type.to_string());
    if let Some(session_id) = session_id {
        query.push(" AND session_id = ").push_bind(session_id);
    }
    query.push(" ORDER BY id LIMIT 1");

    let id = query
        .build_query_scalar::<i64>()
        .fetch_optional(pool)
        .await?;
    Ok(id)
}

pub async fn count_for_user(
    pool: &SqlitePool,
    user_id: i64,
    questionnaire_type: QuestionnaireType,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM questionnaire_responses WHERE user_id = ? AND questionnaire_type = ?",
    )
    .bind(user_id)
    .bind(questionnaire_type.as_str())
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Model names of the sessions this participant filed a post-activity
/// questionnaire for, once per session in session order
pub async fn completed_models(pool: &SqlitePool, user_id: i64) -> Result<Vec<String>> {
    let models: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT s.model_name
        FROM sessions s
        WHERE s.id IN (
            SELECT session_id FROM questionnaire_responses
            WHERE user_id = ? AND questionnaire_type = 'post-activity'
        )
        ORDER BY s.created_at, s.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(models)
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<QuestionnaireResponse>> {
    let rows = sqlx::query_as::<_, QuestionnaireResponse>(&format!(
        "SELECT {} FROM questionnaire_responses ORDER BY created_at, id",
        RESPONSE_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
