//! Caller identity checks performed before any write transaction.

use crate::model::revision::EditorId;
use crate::repo::editor_repo::SqliteEditorRepository;
use crate::repo::RepoError;
use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no editor identity supplied")]
    MissingIdentity,
    #[error("unknown editor: {0}")]
    UnknownEditor(EditorId),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// An editor id proven to exist. Only `authenticate` constructs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedEditor {
    id: EditorId,
}

impl AuthenticatedEditor {
    pub fn id(&self) -> EditorId {
        self.id
    }
}

/// Resolves the caller-supplied editor id into an authenticated editor.
pub fn authenticate(
    conn: &Connection,
    editor_id: Option<EditorId>,
) -> Result<AuthenticatedEditor, SessionError> {
    let id = editor_id.ok_or(SessionError::MissingIdentity)?;
    match SqliteEditorRepository::new(conn).get_editor(id)? {
        Some(editor) => Ok(AuthenticatedEditor { id: editor.id }),
        None => Err(SessionError::UnknownEditor(id)),
    }
}
