// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::models::Provider;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;

/// Failure to bring up the database connection. Retryable: the next
/// bootstrap call starts a fresh attempt.
///
/// `Clone` because every concurrent waiter on an attempt receives the same error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectionError {
    #[error("Database connection failed: {0}")]
    Failed(String),

    #[error("Database connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection attempt aborted: {0}")]
    Aborted(String),
}

/// External handshake failure (transport, timeout, non-2xx, bad payload).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Http { provider: Provider, message: String },

    #[error("{provider} request timed out")]
    Timeout { provider: Provider },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: Provider,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an invalid response: {message}")]
    InvalidResponse { provider: Provider, message: String },

    #[error("{provider} rejected the authorization: {message}")]
    Denied { provider: Provider, message: String },
}

impl ProviderError {
    /// Classify a reqwest transport error for `provider`.
    pub fn from_reqwest(provider: Provider, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout { provider }
        } else {
            ProviderError::Http {
                provider,
                message: err.to_string(),
            }
        }
    }
}

/// Identity store failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint (email, provider link) was hit by a concurrent write.
    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Backend(String),
}

/// Failure while resolving an external identity to a local user.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The email matched an account already linked to another id at the same provider.
    #[error("User {user_id} is already linked to a different {provider} account")]
    ProviderConflict { provider: Provider, user_id: String },
}

/// Session credential rejection. Callers only ever see "unauthorized";
/// the variant is kept for logging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("session token expired")]
    Expired,

    #[error("session token signature mismatch")]
    BadSignature,

    #[error("malformed session token: {0}")]
    Malformed(String),
}

impl ValidationError {
    /// Short tag for structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::Expired => "expired",
            ValidationError::BadSignature => "bad_signature",
            ValidationError::Malformed(_) => "malformed",
        }
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid session: {0}")]
    InvalidSession(#[from] ValidationError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("{} OAuth is not configured", .provider.display_name())]
    NotConfigured {
        provider: Provider,
        has_client_id: bool,
        has_client_secret: bool,
    },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error("Database error: {0}")]
    Database(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct NotConfiguredDebug {
    has_client_id: bool,
    has_client_secret: bool,
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<Provider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<NotConfiguredDebug>,
}

impl ErrorResponse {
    fn new(error: &str, details: Option<String>) -> Self {
        Self {
            error: error.to_string(),
            details,
            provider: None,
            debug: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("unauthorized", None),
            ),
            AppError::InvalidSession(reason) => {
                tracing::debug!(reason = reason.reason(), "Rejected session credential");
                (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse::new("unauthorized", None),
                )
            }
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("not_found", Some(msg.clone())),
            ),
            AppError::NotConfigured {
                provider,
                has_client_id,
                has_client_secret,
            } => (
                StatusCode::NOT_IMPLEMENTED,
                ErrorResponse {
                    error: self.to_string(),
                    details: None,
                    provider: Some(*provider),
                    debug: Some(NotConfiguredDebug {
                        has_client_id: *has_client_id,
                        has_client_secret: *has_client_secret,
                    }),
                },
            ),
            AppError::Connection(err) => {
                tracing::error!(error = %err, "Database unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new("database_unavailable", None),
                )
            }
            AppError::Resolver(err) => {
                tracing::error!(error = %err, "Identity resolution failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "Authentication failed",
                        Some("Could not complete sign-in".to_string()),
                    ),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("database_error", None),
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("internal_error", None),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
