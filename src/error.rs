//! Dealroom error types

use thiserror::Error;

/// Dealroom error type
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown deal or artefact
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or malformed caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Memo synthesis failed or returned unusable output
    #[error("Generation error: {0}")]
    Generation(String),

    /// Backing store unreachable or rejected the request
    #[error("Storage error: {0}")]
    Storage(String),

    /// Concurrent write lost a precondition race, or an id already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential resolution or token exchange failed
    #[error("Auth error: {0}")]
    Auth(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a missing deal
    pub fn deal_not_found(id: &str) -> Self {
        Self::NotFound(format!("Deal {} not found", id))
    }

    /// Stable machine-readable code used by the HTTP boundary
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Generation(_) => "GENERATION_ERROR",
            Self::Storage(_) | Self::Io(_) | Self::Http(_) => "STORAGE_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Auth(_) => "AUTH_ERROR",
            Self::Serialization(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type alias for Dealroom operations
pub type Result<T> = std::result::Result<T, Error>;
