// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::StoreError;

/// Description returned for every server-side failure.
pub const GENERIC_FAILURE: &str = "something went wrong, Please try again";

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Transition not allowed: {0}")]
    InvalidState(String),

    #[error("A pending or active match already exists with this user")]
    DuplicateRequest,

    #[error("Cannot send a match request to yourself")]
    InvalidTarget,

    /// Field validation failure, reported with a machine-readable code.
    #[error("{description}")]
    Validation {
        code: &'static str,
        description: String,
    },

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(code: &'static str, description: impl Into<String>) -> Self {
        AppError::Validation {
            code,
            description: description.into(),
        }
    }

    /// Status and code pair used in the response.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
            AppError::DuplicateRequest => (StatusCode::CONFLICT, "DUPLICATE_REQUEST"),
            AppError::InvalidTarget => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_TARGET"),
            AppError::Validation { code, .. } => (StatusCode::UNPROCESSABLE_ENTITY, code),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "ENTITY_ALREADY_EXISTS"),
            AppError::Database(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR")
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::Conflict(what) => AppError::Conflict(what),
            StoreError::Backend(msg) => AppError::Database(msg),
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    description: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let description = match &self {
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                GENERIC_FAILURE.to_string()
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                GENERIC_FAILURE.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse { code, description })).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
