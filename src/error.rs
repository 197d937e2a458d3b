//! Application error type and its HTTP mapping.
//!
//! Internal failures are logged with their detail and answered with a bare
//! 500 so that database or template internals never reach the browser.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tracing::error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("username is already taken")]
    DuplicateUsername,

    /// Missing task, or a task owned by someone else.
    #[error("not found")]
    NotFound,

    #[error("authentication required")]
    Unauthenticated,

    #[error("malformed date: {0}")]
    InvalidDate(#[from] chrono::ParseError),

    #[error("malformed form data: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),

    #[error(transparent)]
    Template(#[from] tera::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("authentication backend: {0}")]
    Auth(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<axum_login::Error<crate::authentication::Backend>> for AppError {
    fn from(err: axum_login::Error<crate::authentication::Backend>) -> Self {
        AppError::Auth(Box::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
            AppError::Unauthenticated => Redirect::to("/login").into_response(),
            AppError::DuplicateUsername => {
                (StatusCode::CONFLICT, "username is already taken").into_response()
            }
            AppError::Multipart(err) => err.into_response(),
            other => {
                error!(error = %other, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}
