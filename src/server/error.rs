//! Error types for the REST API server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::selection::SelectionError;
use crate::session::SessionError;
use crate::symbol::SymbolError;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Invalid parameter in request
    InvalidParameter(String),
    /// Invalid or inverted date range
    InvalidDateRange(String),
    /// Symbol does not occur in the dataset
    UnknownSymbol(String),
    /// Dashboard session not found
    SessionNotFound(Uuid),
    /// Too many concurrent sessions
    SessionLimitReached,
    /// Internal server error
    InternalError(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            ApiError::InvalidDateRange(msg) => write!(f, "Invalid date range: {}", msg),
            ApiError::UnknownSymbol(symbol) => write!(f, "Unknown symbol: {}", symbol),
            ApiError::SessionNotFound(id) => write!(f, "Session not found: {}", id),
            ApiError::SessionLimitReached => write!(f, "Session limit reached"),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::InvalidParameter(msg) => {
                (StatusCode::BAD_REQUEST, "InvalidParameter", msg.clone())
            }
            ApiError::InvalidDateRange(msg) => {
                (StatusCode::BAD_REQUEST, "InvalidDateRange", msg.clone())
            }
            ApiError::UnknownSymbol(symbol) => (
                StatusCode::BAD_REQUEST,
                "UnknownSymbol",
                format!("Symbol '{}' does not occur in the dataset", symbol),
            ),
            ApiError::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                "SessionNotFound",
                format!("Dashboard session '{}' not found", id),
            ),
            ApiError::SessionLimitReached => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SessionLimitReached",
                "Maximum number of concurrent sessions reached".to_string(),
            ),
            ApiError::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalError",
                msg.clone(),
            ),
        };

        let body = Json(json!({
            "error": error_type,
            "message": message,
        }));

        (status, body).into_response()
    }
}

// Conversions from other error types

impl From<SelectionError> for ApiError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::InvalidRange { .. } => ApiError::InvalidDateRange(err.to_string()),
            SelectionError::UnknownSymbol(symbol) => ApiError::UnknownSymbol(symbol.to_string()),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<SymbolError> for ApiError {
    fn from(err: SymbolError) -> Self {
        ApiError::InvalidParameter(err.to_string())
    }
}

impl From<chrono::ParseError> for ApiError {
    fn from(err: chrono::ParseError) -> Self {
        ApiError::InvalidDateRange(format!("Date parse error: {}", err))
    }
}
