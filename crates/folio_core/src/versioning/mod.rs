//! Versioned set reconciliation.
//!
//! # Responsibility
//! - Compare submitted alias/identifier collections with published sets.
//! - Materialize new immutable sets inside the caller's transaction.
//!
//! # Invariants
//! - A published set is never modified; every change yields a new set id.
//! - Builder failures propagate unchanged so the enclosing revision rolls back.

pub mod set_builder;
pub mod set_diff;

use crate::model::SetId;
use crate::repo::RepoError;
use thiserror::Error;

pub type SetResult<T> = Result<T, SetError>;

#[derive(Debug, Error)]
pub enum SetError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    /// A non-empty alias list without any member flagged `default`.
    #[error("{set} has members but none is nominated as default")]
    NoDefaultNominated { set: &'static str },
    /// The nominated default did not survive set construction.
    #[error("nominated default `{name}` not found in {set} {set_id}")]
    DefaultNotFound {
        set: &'static str,
        set_id: SetId,
        name: String,
    },
    /// An old member selected for reuse carries no stored id.
    #[error("{set} member selected for reuse has no stored id")]
    UnpersistedMember { set: &'static str },
}
