//! Task / quick-capture endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ApiJson, ApiQuery, AppState, AuthUser};
use crate::error::AppError;
use crate::models::{NewRecord, NewSubtask, RecordQuery, RecordUpdate, SubtaskSuggestion};

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/records", get(list_records).post(create_record))
        .route("/api/records/search", get(search_records))
        .route("/api/records/stats", get(record_stats))
        .route(
            "/api/records/{id}",
            get(get_record).put(update_record).delete(delete_record),
        )
        .route(
            "/api/records/{id}/subtasks",
            get(list_subtasks).post(create_subtask),
        )
        .route(
            "/api/records/{id}/create-subtasks-from-ai",
            post(create_subtasks_from_suggestions),
        )
}

async fn create_record(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(new): ApiJson<NewRecord>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let draft = new.validate()?;
    let record = state.db.create_record(user.user_id, &draft)?;

    tracing::info!(
        user_id = user.user_id,
        record_id = record.id,
        category = %record.category,
        "Record created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Record created",
            "record": record,
        })),
    ))
}

async fn list_records(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<RecordQuery>,
) -> Result<Json<Value>, AppError> {
    let page = state.db.list_records(user.user_id, &query)?;
    Ok(Json(json!({
        "records": page.items,
        "total": page.total,
        "page": page.page,
        "pages": page.pages(),
        "per_page": page.per_page,
    })))
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search_records(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<Json<Value>, AppError> {
    let records = state.db.search_records(user.user_id, &params.q)?;
    Ok(Json(json!({ "records": records })))
}

async fn record_stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AppError> {
    let stats = state.db.record_stats(user.user_id)?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

#[derive(Debug, Default, Deserialize)]
struct DetailParams {
    #[serde(default)]
    include_subtasks: bool,
}

async fn get_record(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    ApiQuery(params): ApiQuery<DetailParams>,
) -> Result<Json<Value>, AppError> {
    let record = state
        .db
        .get_record(user.user_id, id, params.include_subtasks)?;
    Ok(Json(json!({ "record": record })))
}

async fn update_record(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    ApiJson(update): ApiJson<RecordUpdate>,
) -> Result<Json<Value>, AppError> {
    let changes = update.validate()?;
    let record = state.db.update_record(user.user_id, id, &changes)?;

    tracing::info!(user_id = user.user_id, record_id = id, "Record updated");

    Ok(Json(json!({
        "success": true,
        "message": "Record updated",
        "record": record,
    })))
}

async fn delete_record(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state.db.delete_record(user.user_id, id)?;
    tracing::info!(user_id = user.user_id, record_id = id, "Record deleted");
    Ok(Json(json!({ "success": true, "message": "Record deleted" })))
}

async fn list_subtasks(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let (parent, subtasks) = state.db.subtasks(user.user_id, id)?;
    Ok(Json(json!({
        "parent_task": parent,
        "total": subtasks.len(),
        "subtasks": subtasks,
    })))
}

async fn create_subtask(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    ApiJson(new): ApiJson<NewSubtask>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (content, category) = new.validate()?;
    let (subtask, parent) = state.db.add_subtask(user.user_id, id, content, category)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Subtask created",
            "subtask": subtask,
            "parent_task": parent,
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct SuggestionsBody {
    #[serde(default)]
    subtask_suggestions: Vec<SubtaskSuggestion>,
}

async fn create_subtasks_from_suggestions(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<SuggestionsBody>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if body.subtask_suggestions.is_empty() {
        return Err(AppError::validation("subtask_suggestions must not be empty"));
    }
    let (created, parent) =
        state
            .db
            .create_subtasks_from_suggestions(user.user_id, id, &body.subtask_suggestions)?;

    tracing::info!(
        user_id = user.user_id,
        parent_id = id,
        created = created.len(),
        "Subtasks created from suggestions"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": format!("Created {} subtasks", created.len()),
            "created_subtasks": created,
            "parent_task": parent,
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    async fn create(app: &axum::Router, body: serde_json::Value) -> i64 {
        let (status, body) = send(app, "POST", "/api/records", Some(USER_TOKEN), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["record"]["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn create_list_and_filter() {
        let (app, _) = app();
        create(&app, json!({"content": "Write docs", "category": "task", "priority": "high"})).await;
        create(&app, json!({"content": "Random idea", "category": "idea"})).await;

        let (status, body) = send(&app, "GET", "/api/records", Some(USER_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["pages"], 1);

        let (_, body) = send(
            &app,
            "GET",
            "/api/records?priority=high&per_page=1",
            Some(USER_TOKEN),
            None,
        )
        .await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["records"][0]["content"], "Write docs");
    }

    #[tokio::test]
    async fn blank_content_is_a_validation_error() {
        let (app, _) = app();
        let (status, body) =
            send(&app, "POST", "/api/records", Some(USER_TOKEN), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn other_users_get_not_found() {
        let (app, _) = app();
        let id = create(&app, json!({"content": "Private"})).await;
        let uri = format!("/api/records/{id}");

        let (status, _) = send(&app, "GET", &uri, Some(OTHER_TOKEN), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "DELETE", &uri, Some(OTHER_TOKEN), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "GET", &uri, Some(USER_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn update_then_soft_delete() {
        let (app, _) = app();
        let id = create(&app, json!({"content": "Paint fence", "category": "task"})).await;
        let uri = format!("/api/records/{id}");

        let (status, body) = send(
            &app,
            "PUT",
            &uri,
            Some(USER_TOKEN),
            Some(json!({"status": "paused", "progress": 30})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["record"]["status"], "paused");
        assert_eq!(body["record"]["progress"], 30);

        let (status, _) = send(
            &app,
            "PUT",
            &uri,
            Some(USER_TOKEN),
            Some(json!({"priority": "whenever"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        send(&app, "DELETE", &uri, Some(USER_TOKEN), None).await;
        let (_, body) = send(&app, "GET", "/api/records", Some(USER_TOKEN), None).await;
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn subtasks_only_under_tasks() {
        let (app, _) = app();
        let task = create(&app, json!({"content": "Move house", "category": "task"})).await;
        let note = create(&app, json!({"content": "Note", "category": "note"})).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/records/{task}/subtasks"),
            Some(USER_TOKEN),
            Some(json!({"content": "Book van", "category": "bogus"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["subtask"]["category"], "task");
        assert_eq!(body["parent_task"]["subtask_count"], 1);

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/records/{note}/subtasks"),
            Some(USER_TOKEN),
            Some(json!({"content": "Nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(
            &app,
            "GET",
            &format!("/api/records/{task}/subtasks"),
            Some(USER_TOKEN),
            None,
        )
        .await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["subtasks"][0]["content"], "Book van");
    }

    #[tokio::test]
    async fn suggestions_become_subtasks() {
        let (app, _) = app();
        let task = create(&app, json!({"content": "Launch", "category": "task"})).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/records/{task}/create-subtasks-from-ai"),
            Some(USER_TOKEN),
            Some(json!({"subtask_suggestions": [
                {"title": "Landing page", "description": "hero and pricing", "priority": "high"},
                {"title": "  "},
                {"title": "Announce"}
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["created_subtasks"].as_array().unwrap().len(), 2);
        assert_eq!(
            body["created_subtasks"][0]["content"],
            "Landing page - hero and pricing"
        );
        assert_eq!(body["parent_task"]["subtasks"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn search_and_stats() {
        let (app, _) = app();
        create(&app, json!({"content": "Buy 100% cotton shirt"})).await;
        create(&app, json!({"content": "Buy milk", "task_type": "life"})).await;

        let (_, body) = send(&app, "GET", "/api/records/search?q=100%25", Some(USER_TOKEN), None).await;
        assert_eq!(body["records"].as_array().unwrap().len(), 1);

        let (_, body) = send(&app, "GET", "/api/records/search", Some(USER_TOKEN), None).await;
        assert!(body["records"].as_array().unwrap().is_empty());

        let (_, body) = send(&app, "GET", "/api/records/stats", Some(USER_TOKEN), None).await;
        assert_eq!(body["stats"]["total"], 2);
        assert_eq!(body["stats"]["by_task_type"]["life"], 1);
    }
}
