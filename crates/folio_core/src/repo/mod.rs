//! Repository layer: SQL access for the revision engine.
//!
//! # Responsibility
//! - Keep SQL details inside the persistence boundary.
//! - Provide connection-scoped repositories that work equally on a plain
//!   `Connection` or inside a `Transaction`.
//!
//! # Invariants
//! - Repositories never open, commit or roll back transactions themselves;
//!   transaction scope is owned by the service layer.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::entity::Bbid;
use thiserror::Error;
use uuid::Uuid;

pub mod editor_repo;
pub mod entity_repo;
pub mod revision_repo;
pub mod set_repo;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl RepoError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn parse_bbid(value: &str, column: &'static str) -> RepoResult<Bbid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
