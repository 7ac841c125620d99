//! Structured-thinking session endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ApiJson, ApiQuery, AppState, AuthUser};
use crate::error::AppError;
use crate::models::{NewThinkingRecord, round1};

const MAX_LIST_LIMIT: u32 = 100;
const MAX_STATS_DAYS: u32 = 365;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/thinking/records",
            get(list_records).post(create_record),
        )
        .route(
            "/api/thinking/records/{id}",
            get(get_record).delete(delete_record),
        )
        .route("/api/thinking/records/{id}/answers", put(update_answer))
        .route("/api/thinking/records/{id}/summary", post(update_summary))
        .route("/api/thinking/records/{id}/complete", post(complete_record))
        .route("/api/thinking/statistics", get(statistics))
}

async fn create_record(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(new): ApiJson<NewThinkingRecord>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let record = state.db.create_thinking_record(user.user_id, &new)?;

    tracing::info!(
        user_id = user.user_id,
        record_id = record.id,
        template = %record.template_id,
        "Thinking record created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Thinking record created",
            "record_id": record.id,
            "record": record,
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
    template_id: Option<String>,
}

fn default_limit() -> u32 {
    20
}

async fn list_records(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Value>, AppError> {
    if !(1..=MAX_LIST_LIMIT).contains(&query.limit) {
        return Err(AppError::validation(format!(
            "limit must be between 1 and {MAX_LIST_LIMIT}"
        )));
    }
    let (records, total) = state.db.list_thinking_records(
        user.user_id,
        query.limit,
        query.offset,
        query.template_id.as_deref(),
    )?;
    let has_more = i64::from(query.offset) + (records.len() as i64) < total;
    Ok(Json(json!({
        "success": true,
        "records": records,
        "total_count": total,
        "has_more": has_more,
    })))
}

async fn get_record(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let record = state.db.get_thinking_record(user.user_id, id)?;
    let progress = json!({
        "total_questions": record.questions.len(),
        "answered_questions": record.answered(),
        "completion_rate": round1(record.completion_rate() * 100.0),
        "is_completed": record.is_completed,
        "time_spent": record.total_time_spent,
    });
    Ok(Json(json!({
        "success": true,
        "record": record,
        "progress": progress,
    })))
}

#[derive(Debug, Deserialize)]
struct AnswerBody {
    question_index: Option<usize>,
    #[serde(default)]
    answer: String,
}

async fn update_answer(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<AnswerBody>,
) -> Result<Json<Value>, AppError> {
    let index = body
        .question_index
        .ok_or_else(|| AppError::validation("question_index is required"))?;
    let record = state
        .db
        .update_thinking_answer(user.user_id, id, index, &body.answer)?;
    Ok(Json(json!({
        "success": true,
        "message": "Answer saved",
        "record": record,
    })))
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    insights: String,
}

async fn update_summary(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<SummaryBody>,
) -> Result<Json<Value>, AppError> {
    let record =
        state
            .db
            .update_thinking_summary(user.user_id, id, &body.summary, &body.insights)?;
    Ok(Json(json!({
        "success": true,
        "message": "Summary saved",
        "record": record,
    })))
}

#[derive(Debug, Deserialize)]
struct CompleteBody {
    #[serde(default)]
    time_spent: i64,
}

async fn complete_record(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    body: Option<ApiJson<CompleteBody>>,
) -> Result<Json<Value>, AppError> {
    let time_spent = body.map_or(0, |ApiJson(body)| body.time_spent);
    let record = state
        .db
        .complete_thinking_record(user.user_id, id, time_spent)?;
    Ok(Json(json!({
        "success": true,
        "message": "Thinking session completed",
        "record": record,
    })))
}

async fn delete_record(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state.db.delete_thinking_record(user.user_id, id)?;
    Ok(Json(json!({ "success": true, "message": "Thinking record deleted" })))
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    #[serde(default = "default_days")]
    days: u32,
}

fn default_days() -> u32 {
    30
}

async fn statistics(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<StatsQuery>,
) -> Result<Json<Value>, AppError> {
    if !(1..=MAX_STATS_DAYS).contains(&query.days) {
        return Err(AppError::validation(format!(
            "days must be between 1 and {MAX_STATS_DAYS}"
        )));
    }
    let stats = state.db.thinking_stats(user.user_id, query.days, Utc::now())?;
    Ok(Json(json!({ "success": true, "statistics": stats })))
}
