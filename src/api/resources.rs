//! Info-resource library endpoints. Guests share the unowned library.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ApiJson, ApiQuery, AppState, MaybeUser};
use crate::error::AppError;
use crate::models::{NewResource, ResourceQuery, ResourceStatus, ResourceUpdate};

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/info-resources",
            get(list_resources).post(create_resource),
        )
        .route("/api/info-resources/stats", get(resource_stats))
        .route(
            "/api/info-resources/{id}",
            get(get_resource)
                .put(update_resource)
                .delete(delete_resource),
        )
        .route("/api/info-resources/{id}/archive", post(archive_resource))
        .route("/api/info-resources/{id}/restore", post(restore_resource))
}

async fn create_resource(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
    ApiJson(new): ApiJson<NewResource>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let draft = new.validate()?;
    let resource = state.db.create_resource(caller.owner(), &draft)?;

    tracing::info!(
        resource_id = resource.id,
        owner = ?caller.owner(),
        "Info resource created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Info resource created",
            "info_resource": resource,
        })),
    ))
}

async fn list_resources(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
    ApiQuery(query): ApiQuery<ResourceQuery>,
) -> Result<Json<Value>, AppError> {
    let page = state.db.list_resources(caller.owner(), &query)?;
    Ok(Json(json!({
        "info_resources": page.items,
        "total": page.total,
        "page": page.page,
        "pages": page.pages(),
        "per_page": page.per_page,
    })))
}

async fn resource_stats(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
) -> Result<Json<Value>, AppError> {
    let stats = state.db.resource_stats(caller.owner(), Utc::now())?;
    Ok(Json(json!({ "success": true, "data": stats })))
}

async fn get_resource(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let resource = state.db.get_resource(caller.owner(), id)?;
    Ok(Json(json!({ "info_resource": resource })))
}

async fn update_resource(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
    Path(id): Path<i64>,
    ApiJson(update): ApiJson<ResourceUpdate>,
) -> Result<Json<Value>, AppError> {
    let changes = update.validate()?;
    let resource = state.db.update_resource(caller.owner(), id, &changes)?;
    Ok(Json(json!({
        "success": true,
        "message": "Info resource updated",
        "info_resource": resource,
    })))
}

async fn delete_resource(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state
        .db
        .set_resource_status(caller.owner(), id, ResourceStatus::Deleted)?;
    Ok(Json(json!({ "success": true, "message": "Info resource deleted" })))
}

async fn archive_resource(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let resource = state
        .db
        .set_resource_status(caller.owner(), id, ResourceStatus::Archived)?;
    Ok(Json(json!({
        "success": true,
        "message": "Info resource archived",
        "info_resource": resource,
    })))
}

async fn restore_resource(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let resource = state
        .db
        .set_resource_status(caller.owner(), id, ResourceStatus::Active)?;
    Ok(Json(json!({
        "success": true,
        "message": "Info resource restored",
        "info_resource": resource,
    })))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn guests_and_users_have_separate_libraries() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/info-resources",
            None,
            Some(json!({"title": "Shared", "content": "for everyone"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["info_resource"]["user_id"].is_null());
        let guest_id = body["info_resource"]["id"].as_i64().unwrap();

        send(
            &app,
            "POST",
            "/api/info-resources",
            Some(USER_TOKEN),
            Some(json!({"title": "Mine", "content": "private", "resource_type": "article"})),
        )
        .await;

        let (_, body) = send(&app, "GET", "/api/info-resources", None, None).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["info_resources"][0]["title"], "Shared");

        let (_, body) = send(&app, "GET", "/api/info-resources", Some(USER_TOKEN), None).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["info_resources"][0]["title"], "Mine");

        let (status, _) = send(
            &app,
            "GET",
            &format!("/api/info-resources/{guest_id}"),
            Some(USER_TOKEN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn archive_restore_delete_and_stats() {
        let (app, _) = app();
        let mut ids = Vec::new();
        for (title, kind) in [("A", "note"), ("B", "note"), ("C", "tutorial")] {
            let (_, body) = send(
                &app,
                "POST",
                "/api/info-resources",
                Some(USER_TOKEN),
                Some(json!({"title": title, "content": "text", "resource_type": kind})),
            )
            .await;
            ids.push(body["info_resource"]["id"].as_i64().unwrap());
        }

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/info-resources/{}/archive", ids[0]),
            Some(USER_TOKEN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info_resource"]["status"], "archived");
        send(
            &app,
            "DELETE",
            &format!("/api/info-resources/{}", ids[1]),
            Some(USER_TOKEN),
            None,
        )
        .await;

        let (_, body) = send(&app, "GET", "/api/info-resources/stats", Some(USER_TOKEN), None).await;
        assert_eq!(
            body["data"],
            json!({
                "total": 2,
                "active": 1,
                "archived": 1,
                "by_type": {"note": 1, "tutorial": 1},
                "this_week": 2
            })
        );

        let (_, body) = send(
            &app,
            "POST",
            &format!("/api/info-resources/{}/restore", ids[0]),
            Some(USER_TOKEN),
            None,
        )
        .await;
        assert_eq!(body["info_resource"]["status"], "active");
    }

    #[tokio::test]
    async fn invalid_title_is_rejected() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/info-resources",
            None,
            Some(json!({"title": "x".repeat(201), "content": "c"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "VALIDATION_ERROR");
    }
}
