//! Error taxonomy shared by the database layer and the HTTP API

use thiserror::Error;

/// Errors surfaced to API callers.
///
/// Each variant maps to one HTTP status and one stable `error_code`
/// (see [`AppError::code`]).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("admin privileges required")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("cannot {action} a task that is {from}")]
    InvalidTransition {
        action: &'static str,
        from: &'static str,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized(_) => "AUTHENTICATION_ERROR",
            AppError::Forbidden => "AUTHORIZATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidTransition { .. } => "INVALID_POMODORO_STATE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "UNKNOWN_ERROR",
        }
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Internal(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
