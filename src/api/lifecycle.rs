use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::auth::identity::Actor;
use crate::db::document_store::DocumentPatch;
use crate::error::AppError;
use crate::lifecycle::service::NewDraft;
use crate::models::document::{DocStatus, Document};
use crate::state::AppState;

/// `POST /api/v1/drafts`: create a draft owned by the caller.
pub async fn create_draft_handler(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<NewDraft>,
) -> Result<Json<Document>, AppError> {
    let doc = state.lifecycle.create_draft(request, actor.email()).await?;
    Ok(Json(doc))
}

/// `GET /api/v1/documents/{doc_id}`: fetch one document.
pub async fn get_document_handler(
    State(state): State<AppState>,
    _actor: Actor,
    Path(doc_id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let doc = state.lifecycle.get(&doc_id).await?;
    Ok(Json(doc))
}

/// `POST /api/v1/reviews/{doc_id}`: publish a draft for review.
pub async fn publish_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(doc_id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let doc = state.lifecycle.publish(&doc_id, actor.email()).await?;
    Ok(Json(doc))
}

/// `POST /api/v1/approvals/{doc_id}`: record the caller's approval.
pub async fn approve_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(doc_id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let doc = state.lifecycle.approve(&doc_id, actor.email()).await?;
    Ok(Json(doc))
}

/// `DELETE /api/v1/approvals/{doc_id}`: request changes (withdraws any
/// prior approval by the caller).
pub async fn request_changes_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(doc_id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let doc = state
        .lifecycle
        .request_changes(&doc_id, actor.email())
        .await?;
    Ok(Json(doc))
}

/// `POST /api/v1/documents/{doc_id}/archive`: archive a document.
pub async fn archive_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(doc_id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let doc = state.lifecycle.archive(&doc_id, actor.email()).await?;
    Ok(Json(doc))
}

/// The PATCH payload: optional metadata fields plus the manual status
/// override used by privileged editors.
#[derive(Debug, Deserialize)]
pub struct PatchRequest {
    #[serde(default)]
    pub status: Option<DocStatus>,
    #[serde(flatten)]
    pub fields: DocumentPatch,
}

/// `PATCH /api/v1/documents/{doc_id}`: edit metadata and/or move status.
pub async fn patch_document_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(doc_id): Path<String>,
    Json(request): Json<PatchRequest>,
) -> Result<Json<Document>, AppError> {
    if request.status.is_none() && request.fields.is_empty() {
        return Err(AppError::BadRequest("empty patch".into()));
    }
    let doc = state
        .lifecycle
        .patch(&doc_id, actor.email(), &request.fields, request.status)
        .await?;
    Ok(Json(doc))
}
