//! Engine error types

use thiserror::Error;

/// Engine-wide error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Price not found: {0}")]
    PriceNotFound(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl EngineError {
    /// Stable machine-readable code, used in per-marketplace error maps.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Database(_) => "DATABASE_ERROR",
            EngineError::Serialization(_) => "SERIALIZATION_ERROR",
            EngineError::Http(_) | EngineError::FetchFailed(_) => "FETCH_FAILED",
            EngineError::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
            EngineError::PriceNotFound(_) => "PRICE_NOT_FOUND",
            EngineError::InvalidUrl(_) => "INVALID_URL",
            EngineError::Cache(_) => "CACHE_ERROR",
            EngineError::Notification(_) => "NOTIFICATION_ERROR",
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::NotFound(_) => "NOT_FOUND",
        }
    }

    /// Expected, non-fatal conditions (e.g. missing credentials) that callers
    /// treat as "this source contributes nothing" rather than a failure.
    pub fn is_expected(&self) -> bool {
        matches!(self, EngineError::SourceUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
