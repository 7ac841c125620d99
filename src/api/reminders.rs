//! Reminder endpoints. Guests share the unowned reminders.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ApiJson, ApiQuery, AppState, MaybeUser};
use crate::error::AppError;
use crate::models::{NewReminder, ReminderQuery, ReminderStatus, ReminderUpdate};

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/reminders", get(list_reminders).post(create_reminder))
        .route("/api/reminders/due", get(due_reminders))
        .route(
            "/api/reminders/{id}",
            put(update_reminder).delete(delete_reminder),
        )
        .route("/api/reminders/{id}/pause", post(pause_reminder))
        .route("/api/reminders/{id}/resume", post(resume_reminder))
        .route("/api/reminders/{id}/acknowledge", post(acknowledge_reminder))
}

async fn create_reminder(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
    ApiJson(new): ApiJson<NewReminder>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let draft = new.validate()?;
    let reminder = state.db.create_reminder(caller.owner(), &draft)?;

    tracing::info!(
        reminder_id = reminder.id,
        owner = ?caller.owner(),
        frequency = %reminder.frequency,
        "Reminder created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Reminder created",
            "reminder": reminder,
        })),
    ))
}

async fn list_reminders(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
    ApiQuery(query): ApiQuery<ReminderQuery>,
) -> Result<Json<Value>, AppError> {
    let reminders = state.db.list_reminders(caller.owner(), &query)?;
    Ok(Json(json!({
        "total": reminders.len(),
        "reminders": reminders,
    })))
}

async fn due_reminders(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
) -> Result<Json<Value>, AppError> {
    let reminders = state.db.due_reminders(caller.owner(), Utc::now())?;
    Ok(Json(json!({
        "count": reminders.len(),
        "reminders": reminders,
    })))
}

async fn update_reminder(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
    Path(id): Path<i64>,
    ApiJson(update): ApiJson<ReminderUpdate>,
) -> Result<Json<Value>, AppError> {
    let reminder = state.db.update_reminder(caller.owner(), id, update)?;
    Ok(Json(json!({
        "success": true,
        "message": "Reminder updated",
        "reminder": reminder,
    })))
}

async fn delete_reminder(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state
        .db
        .set_reminder_status(caller.owner(), id, ReminderStatus::Deleted)?;
    Ok(Json(json!({ "success": true, "message": "Reminder deleted" })))
}

async fn pause_reminder(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let reminder = state
        .db
        .set_reminder_status(caller.owner(), id, ReminderStatus::Paused)?;
    Ok(Json(json!({
        "success": true,
        "message": "Reminder paused",
        "reminder": reminder,
    })))
}

async fn resume_reminder(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let reminder = state
        .db
        .set_reminder_status(caller.owner(), id, ReminderStatus::Active)?;
    Ok(Json(json!({
        "success": true,
        "message": "Reminder resumed",
        "reminder": reminder,
    })))
}

async fn acknowledge_reminder(
    State(state): State<Arc<AppState>>,
    caller: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let today = Utc::now().date_naive();
    let reminder = state.db.acknowledge_reminder(caller.owner(), id, today)?;
    Ok(Json(json!({
        "success": true,
        "message": "Reminder acknowledged",
        "reminder": reminder,
    })))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    async fn create(app: &axum::Router, token: Option<&str>, body: Value) -> Value {
        let (status, body) = send(app, "POST", "/api/reminders", token, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["reminder"].clone()
    }

    #[tokio::test]
    async fn guest_reminders_are_shared_and_separate_from_users() {
        let (app, _) = app();
        create(
            &app,
            None,
            json!({"content": "Drink water", "remind_time": "10:00"}),
        )
        .await;
        create(
            &app,
            Some(USER_TOKEN),
            json!({
                "content": "Weekly review",
                "frequency": "weekly",
                "day_of_week": 4,
                "remind_time": "16:00"
            }),
        )
        .await;

        let (status, body) = send(&app, "GET", "/api/reminders", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["reminders"][0]["frequency"], "daily");

        let (_, body) = send(&app, "GET", "/api/reminders", Some(USER_TOKEN), None).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["reminders"][0]["day_of_week"], 4);

        let (status, _) = send(&app, "GET", "/api/reminders", Some("qc_bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_validates_schedule() {
        let (app, _) = app();
        for body in [
            json!({"content": "", "remind_time": "10:00"}),
            json!({"content": "x", "remind_time": "25:00"}),
            json!({"content": "x", "remind_time": "10:00", "frequency": "monthly"}),
            json!({"content": "x", "remind_time": "10:00", "frequency": "weekly"}),
        ] {
            let (status, resp) =
                send(&app, "POST", "/api/reminders", None, Some(body.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(resp["error_code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn lifecycle_pause_resume_update_delete() {
        let (app, _) = app();
        let reminder = create(
            &app,
            Some(USER_TOKEN),
            json!({"content": "Stretch", "remind_time": "00:00"}),
        )
        .await;
        let id = reminder["id"].as_i64().unwrap();

        // A midnight daily reminder is always due until acknowledged
        let (_, body) = send(&app, "GET", "/api/reminders/due", Some(USER_TOKEN), None).await;
        assert_eq!(body["count"], 1);

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/reminders/{id}/acknowledge"),
            Some(USER_TOKEN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["reminder"]["last_triggered_date"].is_string());
        let (_, body) = send(&app, "GET", "/api/reminders/due", Some(USER_TOKEN), None).await;
        assert_eq!(body["count"], 0);

        let (_, body) = send(
            &app,
            "POST",
            &format!("/api/reminders/{id}/pause"),
            Some(USER_TOKEN),
            None,
        )
        .await;
        assert_eq!(body["reminder"]["status"], "paused");
        let (_, body) = send(&app, "GET", "/api/reminders", Some(USER_TOKEN), None).await;
        assert_eq!(body["total"], 0);
        let (_, body) = send(
            &app,
            "GET",
            "/api/reminders?status=all",
            Some(USER_TOKEN),
            None,
        )
        .await;
        assert_eq!(body["total"], 1);

        let (_, body) = send(
            &app,
            "POST",
            &format!("/api/reminders/{id}/resume"),
            Some(USER_TOKEN),
            None,
        )
        .await;
        assert_eq!(body["reminder"]["status"], "active");

        let uri = format!("/api/reminders/{id}");
        let (status, body) = send(
            &app,
            "PUT",
            &uri,
            Some(USER_TOKEN),
            Some(json!({"frequency": "weekly", "day_of_week": 2, "content": "Stretch more"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reminder"]["frequency"], "weekly");
        assert_eq!(body["reminder"]["day_of_week"], 2);

        let (status, _) = send(
            &app,
            "PUT",
            &uri,
            Some(USER_TOKEN),
            Some(json!({"status": "snoozed"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "DELETE", &uri, Some(OTHER_TOKEN), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "DELETE", &uri, Some(USER_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "DELETE", &uri, Some(USER_TOKEN), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
