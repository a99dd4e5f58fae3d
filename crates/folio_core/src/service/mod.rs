//! Use-case services over the repository layer.
//!
//! # Responsibility
//! - Own transaction scope: one `BEGIN IMMEDIATE` transaction per mutation.
//! - Validate requests before anything is written.
//! - Shape entity states and revision views for front-ends.
//!
//! # Invariants
//! - Every error path drops the open transaction, rolling back all writes.
//! - Callers authenticate through `session` before calling a mutation.

pub mod entity_service;
pub mod revision_service;
pub mod revision_view;
pub mod session;

use crate::model::entity::{Bbid, EntityKind};
use crate::model::identifier::IdentifierTypeId;
use crate::model::revision::RevisionId;
use crate::repo::RepoError;
use crate::versioning::SetError;
use session::SessionError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Request content rejected before any write.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("alias {index} has a blank {field}")]
    BlankAliasField { index: usize, field: &'static str },
    #[error("more than one alias is nominated as default")]
    MultipleDefaults,
    #[error("unknown language: {0}")]
    UnknownLanguage(i64),
    #[error("unknown identifier type: {0}")]
    UnknownIdentifierType(IdentifierTypeId),
    #[error("`{value}` is not a valid {type_label}")]
    InvalidIdentifierValue { type_label: String, value: String },
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("note content cannot be blank")]
    BlankNote,
    #[error("{0} is not a publisher")]
    NotAPublisher(Bbid),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Set(#[from] SetError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("entity not found: {0}")]
    EntityNotFound(Bbid),
    #[error("entity {0} is deleted")]
    EntityDeleted(Bbid),
    #[error("entity {bbid} is a {actual}, not a {expected}")]
    KindMismatch {
        bbid: Bbid,
        expected: EntityKind,
        actual: EntityKind,
    },
    #[error("edit of {0} changes nothing")]
    NothingChanged(Bbid),
    #[error("revision not found: {0}")]
    RevisionNotFound(RevisionId),
    #[error("inconsistent state: {0}")]
    InconsistentState(&'static str),
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

impl ServiceError {
    /// Stable machine-readable code for logs and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Session(_) => "session_rejected",
            Self::Validation(_) => "invalid_request",
            Self::Set(SetError::Repo(_)) | Self::Repo(_) => "persistence_failed",
            Self::Set(_) => "set_integrity",
            Self::Encode(_) => "encode_failed",
            Self::EntityNotFound(_) | Self::RevisionNotFound(_) => "not_found",
            Self::EntityDeleted(_) => "entity_deleted",
            Self::KindMismatch { .. } => "kind_mismatch",
            Self::NothingChanged(_) => "nothing_changed",
            Self::InconsistentState(_) => "inconsistent_state",
        }
    }
}
