//! Core of the Folio revisioned catalog.
//! This crate is the single source of truth for revision and set invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod versioning;

pub use config::FolioConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::alias::{Alias, AliasSet};
pub use model::entity::{
    Bbid, CreatorProps, EditionProps, EntityKind, EntityRevision, EntityRow, EntityState,
    PublisherProps, WorkProps,
};
pub use model::identifier::{Identifier, IdentifierSet};
pub use model::revision::{Editor, Note, Revision};
pub use repo::editor_repo::SqliteEditorRepository;
pub use repo::{RepoError, RepoResult};
pub use rusqlite::Connection;
pub use service::revision_service::{
    create_entity, delete_entity, no_hook, update_entity, EntityHook, EntityRequest,
};
pub use service::revision_view::{
    add_note, entity_revisions, format_revision_text, revision_view, RevisionView,
};
pub use service::session::{authenticate, AuthenticatedEditor, SessionError};
pub use service::{ServiceError, ServiceResult, ValidationError};
pub use versioning::set_diff::{changed_or_new, has_changed, unchanged};
pub use versioning::{SetError, SetResult};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
