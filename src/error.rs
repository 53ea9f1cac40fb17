use crate::repositories::account_repository::RepositoryError;
use crate::services::{AccountServiceError, AuthServiceError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failures that escape a handler. Business outcomes (bad form input, wrong
/// token, cooldown) are rendered by the handlers and never reach this type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Account service error: {0}")]
    AccountService(#[from] AccountServiceError),

    #[error("Auth service error: {0}")]
    AuthService(#[from] AuthServiceError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("request failed: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
    }
}
