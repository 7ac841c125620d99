//! Weekly report endpoints

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ApiJson, ApiQuery, AppState, AuthUser};
use crate::error::AppError;
use crate::models::TaskType;
use crate::report::{
    MAX_WEEK_OFFSET, SummaryInput, basic_summary, build_weekly_report, parse_sections,
};

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/weekly-report", get(weekly_report))
        .route("/api/weekly-report/task-summary", post(task_summary))
}

#[derive(Debug, Default, Deserialize)]
struct ReportQuery {
    task_type: Option<String>,
    #[serde(default)]
    week_offset: i64,
}

async fn weekly_report(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> Result<Json<Value>, AppError> {
    if !(-MAX_WEEK_OFFSET..=MAX_WEEK_OFFSET).contains(&query.week_offset) {
        return Err(AppError::validation(format!(
            "week_offset must be between -{MAX_WEEK_OFFSET} and {MAX_WEEK_OFFSET}"
        )));
    }
    let filter = query.task_type.as_deref().unwrap_or("all");
    let task_type = match filter {
        "all" => None,
        other => Some(
            TaskType::parse(other).ok_or_else(|| AppError::validation("invalid task type"))?,
        ),
    };

    let records = state.db.task_records(user.user_id, task_type)?;
    let report = build_weekly_report(records, Utc::now(), query.week_offset, filter);

    tracing::debug!(
        user_id = user.user_id,
        week_offset = query.week_offset,
        new = report.summary.total_new,
        completed = report.summary.total_completed,
        "Weekly report built"
    );

    Ok(Json(json!({ "success": true, "data": report })))
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    report_data: Option<SummaryInput>,
}

async fn task_summary(
    AuthUser(_user): AuthUser,
    ApiJson(body): ApiJson<SummaryBody>,
) -> Result<Json<Value>, AppError> {
    let input = body
        .report_data
        .ok_or_else(|| AppError::validation("report_data is required"))?;
    let summary = basic_summary(&input);
    let sections = parse_sections(&summary);
    Ok(Json(json!({
        "success": true,
        "task_summary": summary,
        "sections": sections,
    })))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn current_week_lists_new_tasks() {
        let (app, _) = app();
        for (content, task_type) in [("Ship release", "work"), ("Paint fence", "hobby")] {
            send(
                &app,
                "POST",
                "/api/records",
                Some(USER_TOKEN),
                Some(json!({"content": content, "category": "task", "task_type": task_type})),
            )
            .await;
        }
        send(
            &app,
            "POST",
            "/api/records",
            Some(USER_TOKEN),
            Some(json!({"content": "just a thought", "category": "idea"})),
        )
        .await;

        let (status, body) = send(&app, "GET", "/api/weekly-report", Some(USER_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["summary"]["total_new"], 2);
        assert_eq!(body["data"]["week_info"]["is_current_week"], true);
        assert_eq!(body["data"]["task_type_filter"], "all");

        let (_, body) = send(
            &app,
            "GET",
            "/api/weekly-report?task_type=work",
            Some(USER_TOKEN),
            None,
        )
        .await;
        assert_eq!(body["data"]["summary"]["total_new"], 1);
        assert_eq!(body["data"]["new_tasks"][0]["content"], "Ship release");

        let (_, body) = send(
            &app,
            "GET",
            "/api/weekly-report?week_offset=-1",
            Some(USER_TOKEN),
            None,
        )
        .await;
        assert_eq!(body["data"]["summary"]["total_new"], 0);
        assert_eq!(body["data"]["week_info"]["is_current_week"], false);
    }

    #[tokio::test]
    async fn unknown_task_type_and_guest_are_rejected() {
        let (app, _) = app();
        let (status, _) = send(
            &app,
            "GET",
            "/api/weekly-report?task_type=chores",
            Some(USER_TOKEN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "GET", "/api/weekly-report", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn week_offset_out_of_range_is_rejected() {
        let (app, _) = app();
        for offset in ["9223372036854775807", "-9223372036854775808", "521"] {
            let (status, body) = send(
                &app,
                "GET",
                &format!("/api/weekly-report?week_offset={offset}"),
                Some(USER_TOKEN),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{offset}");
            assert_eq!(body["error_code"], "VALIDATION_ERROR");
        }

        let (status, _) = send(
            &app,
            "GET",
            "/api/weekly-report?week_offset=-520",
            Some(USER_TOKEN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn task_summary_returns_text_and_sections() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/weekly-report/task-summary",
            Some(USER_TOKEN),
            Some(json!({"report_data": {
                "completed_tasks": [{"content": "Write docs", "subtask_count": 2}],
                "new_tasks": [
                    {"content": "Refactor", "priority": "low"},
                    {"content": "Fix outage", "priority": "urgent"}
                ]
            }})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let text = body["task_summary"].as_str().unwrap();
        assert!(text.contains("Completed \"Write docs\" (with 2 subtasks)"));
        assert!(
            text.find("Fix outage").unwrap() < text.find("Refactor").unwrap(),
            "{text}"
        );
        assert_eq!(body["sections"].as_array().unwrap().len(), 2);
        assert_eq!(body["sections"][0]["heading"], "Completed this week");

        let (status, body) = send(
            &app,
            "POST",
            "/api/weekly-report/task-summary",
            Some(USER_TOKEN),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "VALIDATION_ERROR");
    }
}
