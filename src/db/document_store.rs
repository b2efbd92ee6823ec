use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Source};
use crate::models::document::{DocStatus, Document, FieldValue};

/// Metadata fields a caller may rewrite on a document. Everything else is
/// owned by the lifecycle transitions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub product: Option<String>,
    pub approvers: Option<Vec<String>>,
    pub contributors: Option<Vec<String>>,
    pub custom_fields: Option<HashMap<String, FieldValue>>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.product.is_none()
            && self.approvers.is_none()
            && self.contributors.is_none()
            && self.custom_fields.is_none()
    }
}

/// Repository trait for published documents.
///
/// The store is the authority on document state. Every mutation here is a
/// conditional update: the filter re-checks the precondition so concurrent
/// writers cannot cause lost updates. `None` from a conditional op means
/// the condition no longer held (or the document is gone); the caller
/// decides which error that is.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Document>, AppError>;

    /// Insert a newly published document, or replace it when retrying a
    /// publish that previously failed partway.
    async fn upsert(&self, doc: Document) -> Result<(), AppError>;

    /// Apply a metadata patch, returning the updated document.
    async fn patch(&self, id: &str, patch: &DocumentPatch) -> Result<Option<Document>, AppError>;

    /// Record an approval: adds `approver` to `approved_by` exactly once and
    /// drops any pending change request from the same email. Conditional on
    /// status In-Review/Approved and the caller being a listed approver.
    async fn approve(&self, id: &str, approver: &str) -> Result<Option<Document>, AppError>;

    /// Record a change request: adds `approver` to `changes_requested_by`
    /// exactly once and withdraws any prior approval from the same email.
    /// Conditional on status In-Review and the caller being a listed approver.
    async fn request_changes(&self, id: &str, approver: &str)
        -> Result<Option<Document>, AppError>;

    /// Move `status` to `to`, conditional on the current status being one of
    /// `from`.
    async fn set_status(
        &self,
        id: &str,
        from: &[DocStatus],
        to: DocStatus,
    ) -> Result<Option<Document>, AppError>;
}

/// MongoDB implementation of the DocumentStore.
pub struct MongoDocumentStore {
    collection: mongodb::Collection<Document>,
}

impl MongoDocumentStore {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("documents"),
        }
    }

    async fn find_and_update(
        &self,
        filter: mongodb::bson::Document,
        update: mongodb::bson::Document,
    ) -> Result<Option<Document>, AppError> {
        use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.collection
            .find_one_and_update(filter, update)
            .with_options(options)
            .await
            .map_err(|e| AppError::unavailable(Source::DocumentStore, e.to_string()))
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

fn wire_names(statuses: &[DocStatus]) -> Vec<&'static str> {
    statuses.iter().map(|s| s.wire_name()).collect()
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn get(&self, id: &str) -> Result<Option<Document>, AppError> {
        use mongodb::bson::doc;

        self.collection
            .find_one(doc! { "id": id })
            .await
            .map_err(|e| AppError::unavailable(Source::DocumentStore, e.to_string()))
    }

    async fn upsert(&self, doc: Document) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::options::ReplaceOptions;

        let filter = doc! { "id": &doc.id };
        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection
            .replace_one(filter, &doc)
            .with_options(options)
            .await
            .map_err(|e| AppError::unavailable(Source::DocumentStore, e.to_string()))?;

        Ok(())
    }

    async fn patch(&self, id: &str, patch: &DocumentPatch) -> Result<Option<Document>, AppError> {
        use mongodb::bson::{doc, to_bson};

        let mut set = doc! { "modifiedTime": now_unix() };
        if let Some(title) = &patch.title {
            set.insert("title", title.clone());
        }
        if let Some(product) = &patch.product {
            set.insert("product", product.clone());
        }
        if let Some(approvers) = &patch.approvers {
            set.insert("approvers", approvers.clone());
        }
        if let Some(contributors) = &patch.contributors {
            set.insert("contributors", contributors.clone());
        }
        if let Some(fields) = &patch.custom_fields {
            let value = to_bson(fields)
                .map_err(|e| AppError::Internal(format!("custom field encoding: {e}")))?;
            set.insert("customFields", value);
        }

        self.find_and_update(doc! { "id": id }, doc! { "$set": set }).await
    }

    async fn approve(&self, id: &str, approver: &str) -> Result<Option<Document>, AppError> {
        use mongodb::bson::doc;

        // $addToSet keeps the approval idempotent; the status condition is
        // re-checked server-side so two approvers can act concurrently
        // without losing either entry.
        let filter = doc! {
            "id": id,
            "status": { "$in": wire_names(&[DocStatus::InReview, DocStatus::Approved]) },
            "approvers": approver,
        };
        let update = doc! {
            "$addToSet": { "approvedBy": approver },
            "$pull": { "changesRequestedBy": approver },
            "$set": { "modifiedTime": now_unix() },
        };

        self.find_and_update(filter, update).await
    }

    async fn request_changes(
        &self,
        id: &str,
        approver: &str,
    ) -> Result<Option<Document>, AppError> {
        use mongodb::bson::doc;

        let filter = doc! {
            "id": id,
            "status": DocStatus::InReview.wire_name(),
            "approvers": approver,
        };
        let update = doc! {
            "$addToSet": { "changesRequestedBy": approver },
            "$pull": { "approvedBy": approver },
            "$set": { "modifiedTime": now_unix() },
        };

        self.find_and_update(filter, update).await
    }

    async fn set_status(
        &self,
        id: &str,
        from: &[DocStatus],
        to: DocStatus,
    ) -> Result<Option<Document>, AppError> {
        use mongodb::bson::doc;

        let filter = doc! {
            "id": id,
            "status": { "$in": wire_names(from) },
        };
        let update = doc! {
            "$set": { "status": to.wire_name(), "modifiedTime": now_unix() },
        };

        self.find_and_update(filter, update).await
    }
}
