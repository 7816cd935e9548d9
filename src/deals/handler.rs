//! HTTP handlers for the Deals API
//!
//! - POST   /api/v1/deals                        create from multipart upload
//! - GET    /api/v1/deals                        list deals, oldest first
//! - GET    /api/v1/deals/:id                    deal detail
//! - DELETE /api/v1/deals/:id                    delete deal and artefacts
//! - POST   /api/v1/deals/:id/memo               regenerate memo
//! - GET    /api/v1/deals/:id/memo               current memo document
//! - GET    /api/v1/deals/:id/materials/:index   original upload
//! - POST   /api/v1/deals/:id/founder_invite     issue founder invite
//! - POST   /api/v1/deals/:id/founder_chat       append chat message

use crate::artefacts::Artefact;
use crate::deals::manager::DealManager;
use crate::deals::types::*;
use crate::error::{Error, Result};
use crate::memo::Weightings;
use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::collections::BTreeMap;
use std::sync::Arc;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Shared state for deal handlers
#[derive(Clone)]
pub struct DealsState {
    pub manager: Arc<DealManager>,
}

/// Create the deals router
pub fn deals_router(state: DealsState) -> Router {
    Router::new()
        .route("/api/v1/deals", post(create_deal).get(list_deals))
        .route("/api/v1/deals/:id", get(get_deal).delete(delete_deal))
        .route("/api/v1/deals/:id/memo", post(regenerate_memo).get(download_memo))
        .route("/api/v1/deals/:id/materials/:index", get(download_material))
        .route("/api/v1/deals/:id/founder_invite", post(issue_invite))
        .route("/api/v1/deals/:id/founder_chat", post(append_chat))
        .with_state(state)
}

/// POST /api/v1/deals
async fn create_deal(
    State(state): State<DealsState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut materials = Vec::new();
    let mut weightings = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("upload-{}", materials.len() + 1));
                let content_type = field
                    .content_type()
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    Error::Validation(format!("Failed to read upload '{}': {}", filename, e))
                })?;
                materials.push(NewMaterial::new(filename, content_type, bytes));
            }
            "weightings" => {
                let raw = field.bytes().await.map_err(|e| {
                    Error::Validation(format!("Failed to read weightings: {}", e))
                })?;
                weightings = Some(parse_weightings(&raw)?);
            }
            other => tracing::debug!(field = %other, "Ignoring unknown multipart field"),
        }
    }

    let deal = state.manager.create_deal(materials, weightings).await?;
    Ok((StatusCode::CREATED, Json(deal)))
}

/// GET /api/v1/deals
async fn list_deals(State(state): State<DealsState>) -> Result<Json<Vec<Deal>>> {
    Ok(Json(state.manager.list_deals().await?))
}

/// GET /api/v1/deals/:id
async fn get_deal(
    State(state): State<DealsState>,
    Path(id): Path<String>,
) -> Result<Json<Deal>> {
    Ok(Json(state.manager.get_deal(&id).await?))
}

/// DELETE /api/v1/deals/:id
async fn delete_deal(
    State(state): State<DealsState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.manager.delete_deal(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/deals/:id/memo
///
/// The body is optional; an empty body regenerates with the stored weightings.
async fn regenerate_memo(
    State(state): State<DealsState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Deal>> {
    let weightings = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let request: RegenerateMemoRequest = serde_json::from_slice(&body)
            .map_err(|e| Error::Validation(format!("Invalid request body: {}", e)))?;
        request.weightings.map(Weightings::from_raw).transpose()?
    };
    Ok(Json(state.manager.regenerate_memo(&id, weightings).await?))
}

/// GET /api/v1/deals/:id/memo
async fn download_memo(
    State(state): State<DealsState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let artefact = state.manager.download_memo(&id).await?;
    let filename = artefact.meta.reference.filename().to_string();
    Ok(attachment(artefact, &filename))
}

/// GET /api/v1/deals/:id/materials/:index
async fn download_material(
    State(state): State<DealsState>,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Response> {
    let (material, artefact) = state.manager.download_material(&id, index).await?;
    let filename = artefact.meta.reference.filename().to_string();
    tracing::debug!(deal_id = %id, original = %material.filename, "Serving material");
    Ok(attachment(artefact, &filename))
}

/// POST /api/v1/deals/:id/founder_invite
async fn issue_invite(
    State(state): State<DealsState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<FounderInvite>> {
    let request: InviteRequest = if body.iter().all(u8::is_ascii_whitespace) {
        InviteRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| Error::Validation(format!("Invalid request body: {}", e)))?
    };
    Ok(Json(state.manager.issue_founder_invite(&id, request).await?))
}

/// POST /api/v1/deals/:id/founder_chat
async fn append_chat(
    State(state): State<DealsState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Deal>> {
    let request: ChatMessageRequest = serde_json::from_slice(&body)
        .map_err(|e| Error::Validation(format!("Invalid request body: {}", e)))?;
    Ok(Json(
        state.manager.append_founder_chat(&id, request.into()).await?,
    ))
}

fn parse_weightings(raw: &[u8]) -> Result<Weightings> {
    let map: BTreeMap<String, f64> = serde_json::from_slice(raw)
        .map_err(|e| Error::Validation(format!("weightings must be a JSON object of numbers: {}", e)))?;
    Weightings::from_raw(map)
}

fn attachment(artefact: Artefact, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, artefact.meta.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        artefact.bytes,
    )
        .into_response()
}
