//! Administrative endpoints

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;

use super::{AdminUser, AppState};
use crate::error::AppError;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/admin/overview", get(overview))
}

async fn overview(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
) -> Result<Json<Value>, AppError> {
    let tables = state.db.table_counts()?;
    tracing::info!(user_id = admin.user_id, "Admin overview requested");
    Ok(Json(json!({
        "success": true,
        "data": {
            "tables": tables,
            "tokens": state.config.tokens.len(),
        },
    })))
}
