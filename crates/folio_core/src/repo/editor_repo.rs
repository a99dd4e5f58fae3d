//! Editor persistence and revision counters.
//!
//! # Invariants
//! - Counters only move forward, by exactly one per committed revision.

use crate::model::revision::{Editor, EditorId};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const EDITOR_SELECT_SQL: &str = "SELECT
    id,
    name,
    total_revisions,
    revisions_applied,
    created_at
FROM editors";

pub struct SqliteEditorRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEditorRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Registers a new editor with zeroed counters.
    pub fn create_editor(&self, name: &str) -> RepoResult<Editor> {
        self.conn
            .execute("INSERT INTO editors (name) VALUES (?1);", [name])?;
        let id = self.conn.last_insert_rowid();
        self.get_editor(id)?
            .ok_or_else(|| RepoError::not_found("editor", id))
    }

    pub fn get_editor(&self, id: EditorId) -> RepoResult<Option<Editor>> {
        let editor = self
            .conn
            .query_row(
                &format!("{EDITOR_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_editor_row,
            )
            .optional()?;
        Ok(editor)
    }

    pub fn list_editors(&self) -> RepoResult<Vec<Editor>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{EDITOR_SELECT_SQL} ORDER BY id ASC;"))?;
        let editors = stmt
            .query_map([], parse_editor_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(editors)
    }

    /// Loads the editor and bumps both revision counters by one.
    ///
    /// Must run on the same transaction as the revision it accounts for.
    pub fn record_applied_revision(&self, id: EditorId) -> RepoResult<Editor> {
        let mut editor = self
            .get_editor(id)?
            .ok_or_else(|| RepoError::not_found("editor", id))?;
        editor.total_revisions += 1;
        editor.revisions_applied += 1;

        self.conn.execute(
            "UPDATE editors
             SET total_revisions = ?2,
                 revisions_applied = ?3
             WHERE id = ?1;",
            params![editor.id, editor.total_revisions, editor.revisions_applied],
        )?;
        Ok(editor)
    }
}

fn parse_editor_row(row: &Row<'_>) -> rusqlite::Result<Editor> {
    Ok(Editor {
        id: row.get("id")?,
        name: row.get("name")?,
        total_revisions: row.get("total_revisions")?,
        revisions_applied: row.get("revisions_applied")?,
        created_at: row.get("created_at")?,
    })
}
