//! 错误类型

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// 外部服务 (提取 / 对话) 调用错误, 均可重试
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("external service timed out after {0:?}")]
    Timeout(Duration),

    #[error("external service transport error: {0}")]
    Transport(String),

    #[error("external service not configured: {0}")]
    Unavailable(String),

    #[error("external service returned an empty reply")]
    EmptyReply,

    #[error("external service returned an unreadable response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CollaboratorError::InvalidResponse(err.to_string())
        } else {
            CollaboratorError::Transport(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Collaborator(CollaboratorError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Collaborator(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Csv(_) | AppError::Config(_) | AppError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 调用方可以原样重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Collaborator(_))
    }
}

/// 错误响应体
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
            retryable: self.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}
