//! Fragmented-time suggestions

use axum::{Json, Router, routing::get};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ApiQuery, AppState, AuthUser};
use crate::error::AppError;
use crate::fragmented::{TIME_CONTEXTS, current_context, quick_actions};

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/fragmented-time/quick-actions", get(list_quick_actions))
        .route("/api/fragmented-time/time-contexts", get(time_contexts))
}

#[derive(Debug, Deserialize)]
struct QuickActionQuery {
    #[serde(default = "default_minutes")]
    available_minutes: u32,
    #[serde(default = "default_environment")]
    environment: String,
}

fn default_minutes() -> u32 {
    15
}

fn default_environment() -> String {
    "mobile".to_string()
}

async fn list_quick_actions(
    AuthUser(_user): AuthUser,
    ApiQuery(query): ApiQuery<QuickActionQuery>,
) -> Result<Json<Value>, AppError> {
    let actions = quick_actions(query.available_minutes, &query.environment);
    Ok(Json(json!({
        "success": true,
        "data": {
            "context": {
                "available_minutes": query.available_minutes,
                "environment": query.environment,
                "total_suggestions": actions.len(),
            },
            "quick_actions": actions,
        },
    })))
}

async fn time_contexts() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "time_contexts": TIME_CONTEXTS,
            "current_context": current_context(Utc::now()),
        },
    }))
}
