use axum::http::StatusCode;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No matching row, or the row is logically expired/consumed.
    #[error("resource not found")]
    NotFound,
    #[error("a user with that email already exists")]
    DuplicateEmail,
    #[error("a user with that username already exists")]
    DuplicateUsername,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    /// `now + ttl` falls outside the representable timestamp range.
    #[error("invitation lifetime is out of range")]
    InvalidExpiry,
    /// The fixed per-call ceiling elapsed before the backend answered.
    #[error("storage call timed out")]
    Timeout,
    #[error("storage failure: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage(Box::new(err))
    }

    /// True for backend failures, timeouts included.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Timeout)
    }
}

/// Maps a store error onto the `(status, message)` pair handlers return.
pub fn into_response(err: StoreError) -> (StatusCode, String) {
    if err.is_storage() {
        error!(error = %err, "storage failure");
    }
    match err {
        StoreError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        StoreError::DuplicateEmail | StoreError::DuplicateUsername => {
            (StatusCode::CONFLICT, err.to_string())
        }
        StoreError::Timeout => (StatusCode::GATEWAY_TIMEOUT, err.to_string()),
        StoreError::Hashing(_) | StoreError::InvalidExpiry => {
            error!(error = %err, "internal error");
            internal()
        }
        StoreError::Storage(_) => internal(),
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "the server encountered a problem".into(),
    )
}
