//! HTTP API for the quickcap server

use axum::{
    Json, Router,
    extract::{FromRequest, FromRequestParts, OptionalFromRequest, Query, Request, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::{Database, Owner};
use crate::error::AppError;
use crate::models::now_timestamp;

mod admin;
mod fragmented;
mod pomodoro;
mod progress;
mod records;
mod reminders;
mod report;
mod resources;
mod thinking;

/// Application state shared across handlers
pub struct AppState {
    pub db: Database,
    pub config: Config,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Arc<Self> {
        Arc::new(Self { db, config })
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.allowed_origins);

    Router::new()
        .route("/health", get(health))
        .merge(records::routes())
        .merge(resources::routes())
        .merge(reminders::routes())
        .merge(pomodoro::routes())
        .merge(report::routes())
        .merge(progress::routes())
        .merge(thinking::routes())
        .merge(fragmented::routes())
        .merge(admin::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}

/// Health check endpoint (no auth required)
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "quickcap",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Identity behind a valid bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub admin: bool,
}

/// Auth middleware - resolves an optional Bearer token to a [`Principal`].
///
/// Requests without an Authorization header pass through as guests; the
/// extractors below decide whether a route needs more.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    // Skip auth for health check
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let Some(value) = request.headers().get(header::AUTHORIZATION) else {
        return next.run(request).await;
    };

    let token = match value.to_str().ok().and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if !token.is_empty() => token,
        _ => {
            return AppError::Unauthorized("Malformed Authorization header".to_string())
                .into_response();
        }
    };

    let Some(entry) = state.config.authenticate(token) else {
        tracing::warn!(path = %request.uri().path(), "Rejected unknown API token");
        return AppError::Unauthorized("Invalid API token".to_string()).into_response();
    };

    request.extensions_mut().insert(Principal {
        user_id: entry.user_id,
        admin: entry.admin,
    });
    next.run(request).await
}

/// Caller that presented a valid token
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .copied()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Guest or authenticated caller
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<Principal>);

impl MaybeUser {
    pub fn owner(self) -> Owner {
        match self.0 {
            Some(principal) => Owner::User(principal.user_id),
            None => Owner::Guest,
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<Principal>().copied()))
    }
}

/// Authenticated caller whose token carries the admin flag
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(principal) = AuthUser::from_request_parts(parts, state).await?;
        if principal.admin {
            Ok(AdminUser(principal))
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// JSON body whose rejections use the API error format
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = <Json<T> as FromRequest<S>>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}

/// Optional JSON body: absent without a Content-Type, validated otherwise
impl<S, T> OptionalFromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        if !req.headers().contains_key(header::CONTENT_TYPE) {
            return Ok(None);
        }
        <Self as FromRequest<S>>::from_request(req, state)
            .await
            .map(Some)
    }
}

/// Query string whose rejections use the API error format
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(ApiQuery(value))
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.is_server_error() {
            tracing::error!(error = %self, "API error");
            "Internal server error".to_string()
        } else {
            tracing::debug!(error = %self, code = self.code(), "Request rejected");
            self.to_string()
        };

        (
            self.status(),
            Json(serde_json::json!({
                "success": false,
                "error_code": self.code(),
                "error": message,
                "timestamp": now_timestamp(),
            })),
        )
            .into_response()
    }
}
