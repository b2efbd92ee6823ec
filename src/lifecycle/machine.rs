use crate::error::AppError;
use crate::models::document::{DocStatus, Document};

/// A lifecycle action requested against a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Draft → InReview. The document leaves the draft store and enters
    /// the published index.
    Publish,
    /// Record the caller's approval. The document becomes Approved once
    /// every listed approver has approved.
    Approve,
    /// Record that the caller wants changes before approving.
    RequestChanges,
    /// InReview/Approved → Obsolete. Irreversible.
    Archive,
    /// Manual status override by a privileged editor, bypassing
    /// per-approver counting. Only InReview → Approved is legal.
    MoveToStatus(DocStatus),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Publish => "publish",
            Action::Approve => "approve",
            Action::RequestChanges => "request changes for",
            Action::Archive => "archive",
            Action::MoveToStatus(_) => "move",
        }
    }
}

/// True for users allowed to override document state directly: the primary
/// owner holds edit privilege.
pub fn has_edit_privilege(doc: &Document, user: &str) -> bool {
    doc.primary_owner() == Some(user)
}

/// Whether `user` may edit the document's metadata.
///
/// Owners, contributors and approvers may edit while the document is a
/// draft or in review. Once Approved or Obsolete, editing is exclusive to
/// the privileged editor. A locked document is never editable, and neither
/// is a document authored outside this system (`app_created == false`):
/// externally-authored documents are read-only here regardless of role.
pub fn can_edit(doc: &Document, user: &str) -> bool {
    if doc.locked || !doc.app_created {
        return false;
    }
    if !(doc.is_owner(user) || doc.is_contributor(user) || doc.is_approver(user)) {
        return false;
    }
    match doc.status {
        DocStatus::Wip | DocStatus::InReview => true,
        DocStatus::Approved | DocStatus::Obsolete => has_edit_privilege(doc, user),
    }
}

fn precondition(doc: &Document, action: &Action, message: impl Into<String>) -> AppError {
    AppError::precondition(doc.id.as_str(), action.name(), message)
}

/// Validate a transition without applying it. Role failures are
/// `Forbidden`; state failures are `PreconditionFailed`. Never mutates.
pub fn check(doc: &Document, action: &Action, actor: &str) -> Result<(), AppError> {
    match action {
        Action::Publish => {
            if doc.status != DocStatus::Wip {
                return Err(precondition(doc, action, "only drafts can be published"));
            }
            if !(doc.is_owner(actor) || doc.is_contributor(actor)) {
                return Err(AppError::Forbidden(format!(
                    "{actor} is not an owner or contributor of document {}",
                    doc.id
                )));
            }
            if doc.approvers.is_empty() {
                return Err(precondition(
                    doc,
                    action,
                    "at least one approver is required before publishing",
                ));
            }
            Ok(())
        }
        Action::Approve => {
            if !matches!(doc.status, DocStatus::InReview | DocStatus::Approved) {
                return Err(precondition(
                    doc,
                    action,
                    "document status must be \"In-Review\" or \"Approved\" to approve",
                ));
            }
            if !doc.is_approver(actor) {
                return Err(AppError::Forbidden(format!(
                    "{actor} is not an approver of document {}",
                    doc.id
                )));
            }
            Ok(())
        }
        Action::RequestChanges => {
            if doc.status != DocStatus::InReview {
                return Err(precondition(
                    doc,
                    action,
                    "changes can only be requested of documents in review",
                ));
            }
            if !doc.is_approver(actor) {
                return Err(AppError::Forbidden(format!(
                    "{actor} is not an approver of document {}",
                    doc.id
                )));
            }
            Ok(())
        }
        Action::Archive => {
            if !matches!(doc.status, DocStatus::InReview | DocStatus::Approved) {
                return Err(precondition(
                    doc,
                    action,
                    "only in-review or approved documents can be archived",
                ));
            }
            if !has_edit_privilege(doc, actor) {
                return Err(AppError::Forbidden(format!(
                    "only the document owner can archive document {}",
                    doc.id
                )));
            }
            Ok(())
        }
        Action::MoveToStatus(to) => {
            if !(doc.status == DocStatus::InReview && *to == DocStatus::Approved) {
                return Err(precondition(
                    doc,
                    action,
                    format!(
                        "cannot move from \"{}\" to \"{}\"",
                        doc.status.wire_name(),
                        to.wire_name()
                    ),
                ));
            }
            if !has_edit_privilege(doc, actor) {
                return Err(AppError::Forbidden(format!(
                    "{actor} may not change the status of document {}",
                    doc.id
                )));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "meg@example.com";
    const CONTRIBUTOR: &str = "ali@example.com";
    const APPROVER: &str = "bob@example.com";
    const STRANGER: &str = "eve@example.com";

    fn doc(status: DocStatus) -> Document {
        Document {
            id: "doc-1".to_string(),
            title: "RFC".to_string(),
            doc_type: "RFC".to_string(),
            product: "Consul".to_string(),
            status,
            owners: vec![OWNER.to_string()],
            contributors: vec![CONTRIBUTOR.to_string()],
            approvers: vec![APPROVER.to_string()],
            approved_by: vec![],
            changes_requested_by: vec![],
            created_time: 0,
            modified_time: None,
            locked: false,
            app_created: true,
            custom_fields: Default::default(),
        }
    }

    #[test]
    fn publish_requires_draft_status() {
        let err = check(&doc(DocStatus::InReview), &Action::Publish, OWNER).unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed { .. }));
        assert!(check(&doc(DocStatus::Wip), &Action::Publish, OWNER).is_ok());
        assert!(check(&doc(DocStatus::Wip), &Action::Publish, CONTRIBUTOR).is_ok());
    }

    #[test]
    fn publish_requires_approvers() {
        let mut draft = doc(DocStatus::Wip);
        draft.approvers.clear();
        let err = check(&draft, &Action::Publish, OWNER).unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed { .. }));
    }

    #[test]
    fn publish_rejects_non_collaborators() {
        let err = check(&doc(DocStatus::Wip), &Action::Publish, STRANGER).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn approve_rejected_on_draft() {
        let err = check(&doc(DocStatus::Wip), &Action::Approve, APPROVER).unwrap_err();
        match err {
            AppError::PreconditionFailed { doc_id, action, .. } => {
                assert_eq!(doc_id, "doc-1");
                assert_eq!(action, "approve");
            }
            other => panic!("expected PreconditionFailed, got {other:?}"),
        }
    }

    #[test]
    fn approve_requires_approver_role() {
        let err = check(&doc(DocStatus::InReview), &Action::Approve, OWNER).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(check(&doc(DocStatus::InReview), &Action::Approve, APPROVER).is_ok());
    }

    #[test]
    fn request_changes_only_in_review() {
        assert!(check(&doc(DocStatus::InReview), &Action::RequestChanges, APPROVER).is_ok());
        let err = check(&doc(DocStatus::Approved), &Action::RequestChanges, APPROVER).unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed { .. }));
    }

    #[test]
    fn archive_is_owner_only_and_needs_live_status() {
        assert!(check(&doc(DocStatus::InReview), &Action::Archive, OWNER).is_ok());
        assert!(check(&doc(DocStatus::Approved), &Action::Archive, OWNER).is_ok());

        let err = check(&doc(DocStatus::Approved), &Action::Archive, APPROVER).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = check(&doc(DocStatus::Obsolete), &Action::Archive, OWNER).unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed { .. }));
    }

    #[test]
    fn manual_move_only_in_review_to_approved() {
        let action = Action::MoveToStatus(DocStatus::Approved);
        assert!(check(&doc(DocStatus::InReview), &action, OWNER).is_ok());

        let err = check(&doc(DocStatus::InReview), &action, APPROVER).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let bad = Action::MoveToStatus(DocStatus::Wip);
        let err = check(&doc(DocStatus::InReview), &bad, OWNER).unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed { .. }));
    }

    #[test]
    fn edit_gate_matrix() {
        let live = doc(DocStatus::InReview);
        assert!(can_edit(&live, OWNER));
        assert!(can_edit(&live, CONTRIBUTOR));
        assert!(can_edit(&live, APPROVER));
        assert!(!can_edit(&live, STRANGER));

        let approved = doc(DocStatus::Approved);
        assert!(can_edit(&approved, OWNER), "owner keeps editing after approval");
        assert!(!can_edit(&approved, CONTRIBUTOR));
        assert!(!can_edit(&approved, APPROVER));
    }

    #[test]
    fn locked_documents_are_read_only() {
        let mut locked = doc(DocStatus::InReview);
        locked.locked = true;
        assert!(!can_edit(&locked, OWNER));
    }

    #[test]
    fn externally_authored_documents_are_read_only() {
        let mut external = doc(DocStatus::Wip);
        external.app_created = false;
        assert!(!can_edit(&external, OWNER), "off-app drafts are read-only for everyone");
    }
}
