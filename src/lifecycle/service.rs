use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::db::document_store::{DocumentPatch, DocumentStore};
use crate::db::draft_store::DraftStore;
use crate::error::AppError;
use crate::lifecycle::machine::{self, Action};
use crate::models::document::{DocStatus, Document, FieldValue};
use crate::search::client::PublishedIndex;

/// The request payload for creating a draft.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDraft {
    pub title: String,
    pub doc_type: String,
    pub product: String,
    #[serde(default)]
    pub approvers: Vec<String>,
    #[serde(default)]
    pub contributors: Vec<String>,
    #[serde(default)]
    pub custom_fields: HashMap<String, FieldValue>,
}

/// Applies lifecycle transitions against the document store and keeps the
/// published index in sync.
///
/// The store is the authority: every transition is validated against a
/// fresh read for a precise error, then applied with a conditional update
/// so a concurrent writer cannot cause a lost update. Index sync after a
/// successful store write is non-fatal; the index catches up on the next
/// write, and search freshness is already eventual.
pub struct LifecycleService {
    store: Arc<dyn DocumentStore>,
    drafts: Arc<dyn DraftStore>,
    index: Arc<dyn PublishedIndex>,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        drafts: Arc<dyn DraftStore>,
        index: Arc<dyn PublishedIndex>,
    ) -> Self {
        Self {
            store,
            drafts,
            index,
        }
    }

    async fn sync_index(&self, doc: &Document) {
        if let Err(e) = self.index.index_document(doc).await {
            tracing::warn!(doc_id = %doc.id, error = %e, "failed to sync document to search index");
        }
    }

    async fn get_or_not_found(&self, doc_id: &str) -> Result<Document, AppError> {
        self.store
            .get(doc_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("document {doc_id}")))
    }

    /// Fetch one document, falling back to the draft store for ids that
    /// have not been published yet.
    pub async fn get(&self, doc_id: &str) -> Result<Document, AppError> {
        if let Some(doc) = self.store.get(doc_id).await? {
            return Ok(doc);
        }
        self.drafts
            .get(doc_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("document {doc_id}")))
    }

    /// Create a new draft owned by the caller. Drafts stay out of the
    /// published index until published.
    pub async fn create_draft(&self, req: NewDraft, actor: &str) -> Result<Document, AppError> {
        if req.title.trim().is_empty() {
            return Err(AppError::BadRequest("title cannot be empty".into()));
        }

        let doc = Document {
            id: uuid::Uuid::new_v4().to_string(),
            title: req.title,
            doc_type: req.doc_type,
            product: req.product,
            status: DocStatus::Wip,
            owners: vec![actor.to_string()],
            contributors: req.contributors,
            approvers: req.approvers,
            approved_by: vec![],
            changes_requested_by: vec![],
            created_time: chrono::Utc::now().timestamp(),
            modified_time: None,
            locked: false,
            app_created: true,
            custom_fields: req.custom_fields,
        };

        self.drafts.upsert(doc.clone()).await?;
        tracing::info!(doc_id = %doc.id, actor, "draft created");
        Ok(doc)
    }

    /// Publish a draft: Draft → InReview. The document leaves the draft
    /// store and enters the document store and published index. Retryable:
    /// a publish that failed between steps can be issued again.
    pub async fn publish(&self, doc_id: &str, actor: &str) -> Result<Document, AppError> {
        let draft = self
            .drafts
            .get(doc_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("draft {doc_id}")))?;

        machine::check(&draft, &Action::Publish, actor)?;

        let mut doc = draft;
        doc.status = DocStatus::InReview;
        doc.modified_time = Some(chrono::Utc::now().timestamp());

        self.store.upsert(doc.clone()).await?;
        self.index.index_document(&doc).await?;
        self.drafts.delete(doc_id).await?;

        tracing::info!(doc_id = %doc.id, actor, "document published for review");
        Ok(doc)
    }

    /// Record the caller's approval. Idempotent: re-approving is a no-op
    /// success. The document becomes Approved once every listed approver
    /// has approved.
    pub async fn approve(&self, doc_id: &str, actor: &str) -> Result<Document, AppError> {
        // Fall back to the draft store so approving an unpublished draft is
        // a precondition failure, not a 404.
        let doc = self.get(doc_id).await?;
        machine::check(&doc, &Action::Approve, actor)?;

        if doc.has_approved(actor) {
            // Safe double-submit: the approval is already recorded.
            return Ok(doc);
        }

        let updated = match self.store.approve(doc_id, actor).await? {
            Some(updated) => updated,
            // The conditional write found the precondition gone: the
            // document changed between our read and the update.
            None => {
                return Err(AppError::precondition(
                    doc_id,
                    "approve",
                    "document changed concurrently; retry",
                ))
            }
        };

        let finished = if updated.status == DocStatus::InReview && updated.fully_approved() {
            match self
                .store
                .set_status(doc_id, &[DocStatus::InReview], DocStatus::Approved)
                .await?
            {
                Some(doc) => doc,
                // Another approver's call flipped the status first.
                None => self.get_or_not_found(doc_id).await?,
            }
        } else {
            updated
        };

        self.sync_index(&finished).await;
        tracing::info!(doc_id, actor, status = finished.status.wire_name(), "approval recorded");
        Ok(finished)
    }

    /// Record a change request. Withdraws the caller's approval if present;
    /// idempotent on double-submit.
    pub async fn request_changes(&self, doc_id: &str, actor: &str) -> Result<Document, AppError> {
        let doc = self.get(doc_id).await?;
        machine::check(&doc, &Action::RequestChanges, actor)?;

        if doc.has_requested_changes(actor) {
            return Ok(doc);
        }

        let updated = match self.store.request_changes(doc_id, actor).await? {
            Some(updated) => updated,
            None => {
                return Err(AppError::precondition(
                    doc_id,
                    "request changes for",
                    "document changed concurrently; retry",
                ))
            }
        };

        self.sync_index(&updated).await;
        tracing::info!(doc_id, actor, "changes requested");
        Ok(updated)
    }

    /// Archive: InReview/Approved → Obsolete. Irreversible.
    pub async fn archive(&self, doc_id: &str, actor: &str) -> Result<Document, AppError> {
        let doc = self.get(doc_id).await?;
        machine::check(&doc, &Action::Archive, actor)?;

        let updated = match self
            .store
            .set_status(
                doc_id,
                &[DocStatus::InReview, DocStatus::Approved],
                DocStatus::Obsolete,
            )
            .await?
        {
            Some(updated) => updated,
            None => {
                return Err(AppError::precondition(
                    doc_id,
                    "archive",
                    "document changed concurrently; retry",
                ))
            }
        };

        self.sync_index(&updated).await;
        tracing::info!(doc_id, actor, "document archived");
        Ok(updated)
    }

    /// Apply a metadata patch and/or a manual status move.
    ///
    /// The status move is the explicit override path (InReview → Approved
    /// without approver counting) and needs edit privilege; plain metadata
    /// edits are gated by `can_edit`.
    pub async fn patch(
        &self,
        doc_id: &str,
        actor: &str,
        patch: &DocumentPatch,
        move_to: Option<DocStatus>,
    ) -> Result<Document, AppError> {
        let doc = self.get_or_not_found(doc_id).await?;

        let mut current = doc;

        if let Some(to) = move_to {
            machine::check(&current, &Action::MoveToStatus(to), actor)?;
            current = match self
                .store
                .set_status(doc_id, &[DocStatus::InReview], to)
                .await?
            {
                Some(updated) => updated,
                None => {
                    return Err(AppError::precondition(
                        doc_id,
                        "move",
                        "document changed concurrently; retry",
                    ))
                }
            };
        }

        if !patch.is_empty() {
            if !machine::can_edit(&current, actor) {
                return Err(AppError::Forbidden(format!(
                    "{actor} may not edit document {doc_id}"
                )));
            }
            current = self
                .store
                .patch(doc_id, patch)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("document {doc_id}")))?;
        }

        self.sync_index(&current).await;
        Ok(current)
    }
}
