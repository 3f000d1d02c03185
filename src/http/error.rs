//! HTTP error mapping.
//!
//! Folds the domain error types into responses with the status codes and
//! JSON shapes the clients expect. Nothing is swallowed: every failure
//! reaching a handler boundary turns into a specific status and message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::error::{AuthError, PathError, QuotaError, StorageError, StoreError};
use crate::users::account::format_remaining;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    TooLarge {
        message: String,
        attempted: u64,
        limit: u64,
    },
    Banned {
        reason: String,
        until: DateTime<Utc>,
    },
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, json!({ "error": m })),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, json!({ "error": m })),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, json!({ "error": m })),
            ApiError::TooLarge {
                message,
                attempted,
                limit,
            } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({
                    "error": message,
                    "sizeMB": mib(attempted),
                    "limitMB": mib(limit),
                }),
            ),
            ApiError::Banned { reason, until } => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": format!(
                        "You are banned for {}. Reason: {}",
                        format_remaining(Utc::now(), until),
                        reason
                    ),
                    "banned": true,
                    "bannedUntil": until.timestamp_millis(),
                    "banReason": reason,
                }),
            ),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": m })),
        };
        (status, Json(body)).into_response()
    }
}

fn mib(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UsernameTaken(_) => ApiError::Conflict("User exists".to_string()),
            StoreError::UsernameInvalid(_) => ApiError::BadRequest(
                "Username must be lowercase letters and numbers only".to_string(),
            ),
            StoreError::InvalidEmail(_) => {
                ApiError::BadRequest("Invalid email address.".to_string())
            }
            StoreError::CapacityReached(_) => {
                ApiError::BadRequest("User limit reached".to_string())
            }
            StoreError::UserNotFound(_) => ApiError::NotFound("User not found".to_string()),
            StoreError::AlreadyVerified(_) => {
                ApiError::BadRequest("Already verified".to_string())
            }
            StoreError::InvalidCode(_) => {
                ApiError::BadRequest("Invalid verification code.".to_string())
            }
            StoreError::CodeExpired(_) => {
                ApiError::BadRequest("Verification expired. Account deleted.".to_string())
            }
            StoreError::OwnerImmutable => {
                ApiError::BadRequest("Cannot modify owner account".to_string())
            }
            StoreError::HashingFailed(e) | StoreError::Corrupt(e) => ApiError::Internal(e),
            StoreError::IoError(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid credentials".to_string())
            }
            AuthError::Banned { reason, until } => ApiError::Banned { reason, until },
            AuthError::NotVerified => ApiError::Forbidden(
                "Account not verified. Please enter your verification code.".to_string(),
            ),
            AuthError::NotApproved => ApiError::Forbidden(
                "Account not approved yet. Please wait for owner approval.".to_string(),
            ),
            AuthError::Disabled => ApiError::Forbidden("User disabled".to_string()),
            AuthError::LoginDisabled => ApiError::Forbidden("Login disabled".to_string()),
            AuthError::TokenMissing => ApiError::Unauthorized("No token".to_string()),
            AuthError::TokenInvalid => ApiError::Unauthorized("Invalid token".to_string()),
        }
    }
}

impl From<PathError> for ApiError {
    fn from(_: PathError) -> Self {
        // Deliberately unspecific: the caller learns nothing about the tree.
        ApiError::Forbidden("Forbidden".to_string())
    }
}

impl From<QuotaError> for ApiError {
    fn from(error: QuotaError) -> Self {
        match error {
            QuotaError::QuotaExceeded { attempted, limit } => ApiError::TooLarge {
                message: "Storage quota exceeded".to_string(),
                attempted,
                limit,
            },
            QuotaError::FileTooLarge { attempted, limit } => ApiError::TooLarge {
                message: format!("File too large. Limit is {} MB.", limit / (1024 * 1024)),
                attempted,
                limit,
            },
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(_) => ApiError::NotFound("Not found".to_string()),
            StorageError::NotADirectory(_) => {
                ApiError::BadRequest("Not a directory".to_string())
            }
            StorageError::NotAFile(_) => ApiError::BadRequest("Not a file".to_string()),
            StorageError::IoError(e) => ApiError::Internal(e.to_string()),
        }
    }
}
