//! Pomodoro task endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ApiJson, AppState, AuthUser};
use crate::error::AppError;
use crate::models::{NewPomodoroTask, PomodoroAction};

/// Longest single focus block accepted by `complete`
const MAX_FOCUS_MINUTES: i64 = 600;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/pomodoro/tasks",
            get(list_tasks).post(create_task).delete(clear_tasks),
        )
        .route("/api/pomodoro/tasks/add-single", post(add_single_task))
        .route("/api/pomodoro/tasks/{id}/start", post(start_task))
        .route("/api/pomodoro/tasks/{id}/complete", post(complete_task))
        .route("/api/pomodoro/tasks/{id}/skip", post(skip_task))
        .route("/api/pomodoro/tasks/{id}/reset", post(reset_task))
        .route("/api/pomodoro/tasks/{id}/delete", delete(delete_task))
        .route("/api/pomodoro/stats", get(stats))
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AppError> {
    let tasks = state.db.list_pomodoro_tasks(user.user_id)?;
    Ok(Json(json!({
        "success": true,
        "data": { "count": tasks.len(), "tasks": tasks },
    })))
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(new): ApiJson<NewPomodoroTask>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let new = new.validate()?;
    let task = state.db.create_pomodoro_task(user.user_id, &new)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Pomodoro task created",
            "data": task,
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct AddSingleBody {
    record_id: Option<i64>,
}

async fn add_single_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<AddSingleBody>,
) -> Result<Json<Value>, AppError> {
    let record_id = body
        .record_id
        .ok_or_else(|| AppError::validation("record_id is required"))?;
    let task = state.db.add_record_to_pomodoro(user.user_id, record_id)?;

    tracing::info!(
        user_id = user.user_id,
        record_id,
        task_id = task.id,
        "Record promoted to pomodoro task"
    );

    Ok(Json(json!({
        "success": true,
        "message": "Task added to pomodoro list and started",
        "data": task,
    })))
}

async fn transition(
    state: &AppState,
    user_id: i64,
    id: i64,
    action: PomodoroAction,
    message: &str,
) -> Result<Json<Value>, AppError> {
    let task = state.db.transition_pomodoro(user_id, id, action)?;
    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": task,
    })))
}

async fn start_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    transition(&state, user.user_id, id, PomodoroAction::Start, "Task started").await
}

#[derive(Debug, Deserialize)]
struct CompleteBody {
    focus_minutes: Option<i64>,
}

async fn complete_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    body: Option<ApiJson<CompleteBody>>,
) -> Result<Json<Value>, AppError> {
    let focus_minutes = body
        .and_then(|ApiJson(body)| body.focus_minutes)
        .unwrap_or_else(|| i64::from(state.config.pomodoro.focus_minutes));
    if !(0..=MAX_FOCUS_MINUTES).contains(&focus_minutes) {
        return Err(AppError::validation(format!(
            "focus_minutes must be between 0 and {MAX_FOCUS_MINUTES}"
        )));
    }
    transition(
        &state,
        user.user_id,
        id,
        PomodoroAction::Complete { focus_minutes },
        "Pomodoro completed",
    )
    .await
}

async fn skip_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    transition(&state, user.user_id, id, PomodoroAction::Skip, "Task skipped").await
}

async fn reset_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    transition(&state, user.user_id, id, PomodoroAction::Reset, "Task reset").await
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state.db.delete_pomodoro_task(user.user_id, id)?;
    Ok(Json(json!({ "success": true, "message": "Task deleted" })))
}

async fn clear_tasks(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AppError> {
    let removed = state.db.clear_pomodoro_tasks(user.user_id)?;
    tracing::info!(user_id = user.user_id, removed, "Pomodoro list cleared");
    Ok(Json(json!({
        "success": true,
        "message": format!("Removed {removed} tasks"),
        "data": { "removed": removed },
    })))
}

async fn stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AppError> {
    let stats = state.db.pomodoro_stats(user.user_id, Utc::now())?;
    Ok(Json(json!({ "success": true, "data": stats })))
}
