use thiserror::Error;

/// The external collaborators a request can fail against.
///
/// Carried inside `AppError::SourceUnavailable` so callers can apply
/// per-source degradation policy: a draft-store outage is survivable on
/// best-effort views, a published-index outage is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    PublishedIndex,
    DraftStore,
    DocumentStore,
    PeopleDirectory,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Source::PublishedIndex => "published index",
            Source::DraftStore => "draft store",
            Source::DocumentStore => "document store",
            Source::PeopleDirectory => "people directory",
        };
        f.write_str(name)
    }
}

impl std::error::Error for Source {}

/// Application-wide error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{source} unavailable: {message}")]
    SourceUnavailable { source: Source, message: String },

    /// An illegal lifecycle transition or gated edit. Carries the document
    /// id and the attempted action so the caller can render a useful
    /// notification.
    #[error("cannot {action} document {doc_id}: {message}")]
    PreconditionFailed {
        doc_id: String,
        action: String,
        message: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unavailable(source: Source, message: impl Into<String>) -> Self {
        AppError::SourceUnavailable {
            source,
            message: message.into(),
        }
    }

    pub fn precondition(
        doc_id: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        AppError::PreconditionFailed {
            doc_id: doc_id.into(),
            action: action.into(),
            message: message.into(),
        }
    }

    /// True when the error is an outage of the given source.
    pub fn is_unavailable(&self, which: Source) -> bool {
        matches!(self, AppError::SourceUnavailable { source, .. } if *source == which)
    }
}

/// Helper conversion from anyhow::Error
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
