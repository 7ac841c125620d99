//! Progress monitoring endpoints

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
use crate::progress::{ProgressAnalysis, analyze};

/// Longest window of the focused views
const MAX_VIEW_DAYS: u32 = 90;
/// Longest window of a full analysis
const MAX_ANALYSIS_DAYS: u32 = 365;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/progress/analyze", post(full_analysis))
        .route("/api/progress/summary", get(summary))
        .route("/api/progress/bottlenecks", get(bottlenecks))
        .route("/api/progress/trends", get(trends))
        .route("/api/progress/efficiency", get(efficiency))
}

#[derive(Debug, Deserialize)]
struct DaysQuery {
    days: Option<u32>,
}

fn run(
    state: &AppState,
    user_id: i64,
    days: Option<u32>,
    default: u32,
    max: u32,
) -> Result<ProgressAnalysis, AppError> {
    let days = days.unwrap_or(default);
    if !(1..=max).contains(&days) {
        return Err(AppError::validation(format!(
            "days must be between 1 and {max}"
        )));
    }
    let records = state.db.task_records(user_id, None)?;
    let analysis = analyze(&records, Utc::now(), days);

    tracing::debug!(
        user_id,
        days,
        tasks = analysis.basic_statistics.total_tasks,
        "Progress analyzed"
    );
    Ok(analysis)
}

async fn full_analysis(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    body: Option<ApiJson<DaysQuery>>,
) -> Result<Json<Value>, AppError> {
    let days = body.and_then(|ApiJson(body)| body.days);
    let analysis = run(&state, user.user_id, days, 30, MAX_ANALYSIS_DAYS)?;
    Ok(Json(json!({ "success": true, "data": analysis })))
}

async fn summary(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<DaysQuery>,
) -> Result<Json<Value>, AppError> {
    let analysis = run(&state, user.user_id, query.days, 7, MAX_VIEW_DAYS)?;
    let basic = &analysis.basic_statistics;
    Ok(Json(json!({
        "success": true,
        "data": {
            "analysis_period": analysis.analysis_period,
            "basic_stats": {
                "total_tasks": basic.total_tasks,
                "completed_tasks": basic.completed_tasks,
                "completion_rate": basic.completion_rate,
                "active_tasks": basic.active_tasks,
            },
            "efficiency_score": analysis.efficiency_analysis.efficiency_score,
            "trend_direction": analysis.trends.trend_direction,
            "bottleneck_score": analysis.bottlenecks.bottleneck_score,
        },
    })))
}

async fn bottlenecks(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<DaysQuery>,
) -> Result<Json<Value>, AppError> {
    let analysis = run(&state, user.user_id, query.days, 30, MAX_VIEW_DAYS)?;
    Ok(Json(json!({ "success": true, "data": analysis.bottlenecks })))
}

async fn trends(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<DaysQuery>,
) -> Result<Json<Value>, AppError> {
    let analysis = run(&state, user.user_id, query.days, 30, MAX_VIEW_DAYS)?;
    let trends = analysis.trends;
    let completion = analysis.completion_analysis;
    Ok(Json(json!({
        "success": true,
        "data": {
            "daily_statistics": trends.daily_statistics,
            "weekly_completion_trends": completion.weekly_trends,
            "trend_direction": trends.trend_direction,
            "trend_strength": trends.trend_strength,
            "recent_performance": {
                "recent_week_avg": trends.recent_week_avg_completion,
                "previous_week_avg": trends.previous_week_avg_completion,
            },
            "completion_time_distribution": completion.completion_time_distribution,
        },
    })))
}

async fn efficiency(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<DaysQuery>,
) -> Result<Json<Value>, AppError> {
    let analysis = run(&state, user.user_id, query.days, 30, MAX_VIEW_DAYS)?;
    let efficiency = analysis.efficiency_analysis;
    Ok(Json(json!({
        "success": true,
        "data": {
            "efficiency_score": efficiency.efficiency_score,
            "progress_distribution": efficiency.progress_distribution,
            "stalled_tasks": efficiency.stalled_tasks,
            "average_completion_time": analysis.completion_analysis.average_completion_time_days,
            "priority_performance": analysis.basic_statistics.priority_distribution,
            "type_performance": analysis.basic_statistics.type_distribution,
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    async fn add_task(app: &axum::Router, content: &str, priority: &str) -> i64 {
        let (status, body) = send(
            app,
            "POST",
            "/api/records",
            Some(USER_TOKEN),
            Some(json!({"content": content, "category": "task", "priority": priority})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["record"]["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn summary_reflects_recent_tasks() {
        let (app, state) = app();
        let done = add_task(&app, "Ship release", "high").await;
        add_task(&app, "Write notes", "low").await;
        let stale = add_task(&app, "Migrate server", "urgent").await;
        send(
            &app,
            "PUT",
            &format!("/api/records/{done}"),
            Some(USER_TOKEN),
            Some(json!({"status": "completed", "progress": 100})),
        )
        .await;
        state.db.set_record_times(
            stale,
            "2026-01-01T00:00:00.000Z",
            "2026-01-01T00:00:00.000Z",
        );

        let (status, body) =
            send(&app, "GET", "/api/progress/summary", Some(USER_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let data = &body["data"];
        assert_eq!(data["analysis_period"]["days"], 7);
        assert_eq!(data["basic_stats"]["total_tasks"], 2);
        assert_eq!(data["basic_stats"]["completed_tasks"], 1);
        assert_eq!(data["basic_stats"]["completion_rate"], 50.0);

        let (_, body) = send(
            &app,
            "GET",
            "/api/progress/bottlenecks",
            Some(USER_TOKEN),
            None,
        )
        .await;
        let stuck = &body["data"]["stuck_high_priority_tasks"];
        assert_eq!(stuck.as_array().unwrap().len(), 1);
        assert_eq!(stuck[0]["content"], "Migrate server");
        assert_eq!(body["data"]["bottleneck_score"], 15);

        let (_, body) = send(&app, "GET", "/api/progress/summary", Some(OTHER_TOKEN), None).await;
        assert_eq!(body["data"]["basic_stats"]["total_tasks"], 0);
    }

    #[tokio::test]
    async fn views_share_the_analysis() {
        let (app, _) = app();
        add_task(&app, "Plan trip", "medium").await;

        let (_, body) = send(
            &app,
            "GET",
            "/api/progress/trends?days=14",
            Some(USER_TOKEN),
            None,
        )
        .await;
        let data = &body["data"];
        assert_eq!(data["daily_statistics"].as_array().unwrap().len(), 14);
        assert_eq!(data["weekly_completion_trends"].as_array().unwrap().len(), 2);
        assert_eq!(data["trend_direction"], "stable");

        let (_, body) = send(
            &app,
            "GET",
            "/api/progress/efficiency",
            Some(USER_TOKEN),
            None,
        )
        .await;
        assert_eq!(body["data"]["type_performance"]["work"]["total"], 1);
        assert_eq!(body["data"]["priority_performance"]["medium"]["completed"], 0);

        let (status, body) = send(
            &app,
            "POST",
            "/api/progress/analyze",
            Some(USER_TOKEN),
            Some(json!({"days": 120})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["analysis_period"]["days"], 120);
        assert_eq!(body["data"]["basic_statistics"]["total_tasks"], 1);
    }

    #[tokio::test]
    async fn days_are_bounded_and_login_required() {
        let (app, _) = app();
        for uri in [
            "/api/progress/summary?days=0",
            "/api/progress/trends?days=91",
            "/api/progress/efficiency?days=abc",
        ] {
            let (status, body) = send(&app, "GET", uri, Some(USER_TOKEN), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["error_code"], "VALIDATION_ERROR");
        }
        let (status, _) = send(
            &app,
            "POST",
            "/api/progress/analyze",
            Some(USER_TOKEN),
            Some(json!({"days": 366})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "GET", "/api/progress/summary", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
