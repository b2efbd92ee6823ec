use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Document lifecycle status.
///
/// Serialized with the wire names used by the published index. `In Review`
/// (space-separated) is accepted on input for legacy index records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocStatus {
    /// Unpublished draft, visible only to its owners and contributors.
    #[serde(rename = "WIP")]
    Wip,
    #[serde(rename = "In-Review", alias = "In Review")]
    InReview,
    Approved,
    Obsolete,
}

impl DocStatus {
    /// Parse a wire-format status string, tolerating the legacy spelling.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "WIP" => Some(DocStatus::Wip),
            "In-Review" | "In Review" => Some(DocStatus::InReview),
            "Approved" => Some(DocStatus::Approved),
            "Obsolete" => Some(DocStatus::Obsolete),
            _ => None,
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            DocStatus::Wip => "WIP",
            DocStatus::InReview => "In-Review",
            DocStatus::Approved => "Approved",
            DocStatus::Obsolete => "Obsolete",
        }
    }
}

/// A custom metadata field value. The discriminant is explicit so consumers
/// never have to sniff the shape of the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    #[serde(rename = "STRING")]
    String(String),
    #[serde(rename = "PEOPLE")]
    People(Vec<String>),
}

/// A document as held by the document store and the published index.
///
/// The core never owns one of these long-term: documents are read from the
/// external store and conditionally rewritten through lifecycle transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Opaque, stable identifier.
    pub id: String,
    pub title: String,
    pub doc_type: String,
    pub product: String,
    pub status: DocStatus,
    /// Ordered; index 0 is the primary owner.
    pub owners: Vec<String>,
    #[serde(default)]
    pub contributors: Vec<String>,
    #[serde(default)]
    pub approvers: Vec<String>,
    #[serde(default)]
    pub approved_by: Vec<String>,
    #[serde(default)]
    pub changes_requested_by: Vec<String>,
    /// Unix seconds.
    pub created_time: i64,
    /// Unix seconds. Absent on drafts that have not been indexed yet.
    #[serde(default)]
    pub modified_time: Option<i64>,
    /// Externally-set editor lock, orthogonal to status.
    #[serde(default)]
    pub locked: bool,
    /// False for documents authored outside this system. Such documents are
    /// read-only here regardless of the caller's role.
    #[serde(default = "default_app_created")]
    pub app_created: bool,
    #[serde(default)]
    pub custom_fields: HashMap<String, FieldValue>,
}

fn default_app_created() -> bool {
    true
}

impl Document {
    pub fn is_draft(&self) -> bool {
        self.status == DocStatus::Wip
    }

    pub fn primary_owner(&self) -> Option<&str> {
        self.owners.first().map(String::as_str)
    }

    pub fn is_owner(&self, email: &str) -> bool {
        self.owners.iter().any(|o| o == email)
    }

    pub fn is_contributor(&self, email: &str) -> bool {
        self.contributors.iter().any(|c| c == email)
    }

    pub fn is_approver(&self, email: &str) -> bool {
        self.approvers.iter().any(|a| a == email)
    }

    pub fn has_approved(&self, email: &str) -> bool {
        self.approved_by.iter().any(|a| a == email)
    }

    pub fn has_requested_changes(&self, email: &str) -> bool {
        self.changes_requested_by.iter().any(|a| a == email)
    }

    /// True once every listed approver appears in `approved_by`.
    pub fn fully_approved(&self) -> bool {
        !self.approvers.is_empty() && self.approvers.iter().all(|a| self.has_approved(a))
    }
}
