//! Error types for the cache
//!
//! Provides unified error handling using thiserror. None of these errors
//! escape the public `CacheService` API; they are logged and absorbed there.
//! `CacheError` is surfaced only by the HTTP inspection layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Storage Error Enum ==
/// Failure of the underlying durable key/value primitive.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Writing would exceed the backend's quota
    #[error("Storage quota exceeded: {requested} bytes requested, {quota} bytes allowed")]
    QuotaExceeded { requested: usize, quota: usize },

    /// Filesystem failure
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend refused access
    #[error("Storage access denied: {0}")]
    AccessDenied(String),
}

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Durable backend failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Payload or record could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cross-context transport failure
    #[error("Broadcast error: {0}")]
    Broadcast(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::Serialization(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::Storage(StorageError::QuotaExceeded { .. }) => {
                StatusCode::INSUFFICIENT_STORAGE
            }
            CacheError::Storage(_) | CacheError::Broadcast(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
