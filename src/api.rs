//! Unified API router for Dealroom
//!
//! Merges the module routers into a single axum `Router` with CORS, request
//! tracing, an upload size limit and the JSON error envelope.
//!
//! ## Endpoint Map
//!
//! | Prefix            | Module | Description                              |
//! |-------------------|--------|------------------------------------------|
//! | `/health`         | api    | Load balancer health probe               |
//! | `/api/v1/deals/*` | deals  | Intake, memos, founder invites and chat  |

use crate::config::ServerConfig;
use crate::deals::{deals_router, DealsState};
use crate::error::Error;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Error envelope returned by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

/// API error detail
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl From<&Error> for ApiError {
    fn from(err: &Error) -> Self {
        Self {
            error: ApiErrorDetail {
                code: err.code().to_string(),
                message: err.to_string(),
            },
        }
    }
}

/// HTTP status for an error
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::Generation(_) => StatusCode::BAD_GATEWAY,
        Error::Storage(_) | Error::Io(_) | Error::Http(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Config(_) | Error::Auth(_) | Error::Serialization(_) | Error::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(code = self.code(), "Request failed: {}", self);
        } else {
            tracing::debug!(code = self.code(), "Request rejected: {}", self);
        }
        (status, Json(ApiError::from(&self))).into_response()
    }
}

/// Build the complete Dealroom HTTP application
pub fn build_app(deals_state: DealsState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(deals_router(deals_state))
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(&server.cors_origins))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .expose_headers([header::CONTENT_DISPOSITION]);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(parsed)
    }
}
