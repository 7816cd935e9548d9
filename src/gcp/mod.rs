//! Google Cloud plumbing shared by the managed backends
//!
//! Provides access-token sources (static, emulator, service account) and the
//! error envelope parsing used by the Firestore and Cloud Storage clients.

pub mod auth;

pub use auth::{token_source_from_config, ServiceAccountTokenSource, StaticTokenSource, TokenSource};

use serde::Deserialize;

/// Error envelope returned by Google JSON APIs
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleApiError {
    pub error: GoogleApiErrorDetail,
}

/// Error detail inside [`GoogleApiError`]
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleApiErrorDetail {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// A failed API call: HTTP status plus the parsed canonical status, if any
#[derive(Debug, Clone)]
pub struct ApiFailure {
    pub http_status: reqwest::StatusCode,
    pub status: Option<String>,
    pub message: String,
}

impl ApiFailure {
    /// Read a non-success response body into a failure description
    pub async fn from_response(response: reqwest::Response) -> Self {
        let http_status = response.status();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<GoogleApiError>(&body) {
            Ok(parsed) => Self {
                http_status,
                status: parsed.error.status,
                message: parsed.error.message,
            },
            Err(_) => Self {
                http_status,
                status: None,
                message: body,
            },
        }
    }

    /// Whether the canonical status matches `expected`
    pub fn is(&self, expected: &str) -> bool {
        self.status.as_deref() == Some(expected)
    }
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.status {
            Some(status) => write!(f, "{} {}: {}", self.http_status, status, self.message),
            None => write!(f, "{}: {}", self.http_status, self.message),
        }
    }
}
