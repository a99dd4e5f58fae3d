//! Revision bookkeeping persistence.
//!
//! # Responsibility
//! - Insert and read revisions, notes, annotations and disambiguations.
//! - Maintain entity identity rows, entity-revision joins and headers.
//!
//! # Invariants
//! - Revisions, notes, annotations, disambiguations and entity-revision rows
//!   are insert-only.
//! - `entity_headers` holds exactly one row per entity; writes replace the
//!   master revision pointer.

use crate::model::entity::{Bbid, EntityHeader, EntityKind, EntityRevision};
use crate::model::revision::{
    Annotation, Disambiguation, EditorId, Note, NoteId, Revision, RevisionId,
};
use crate::repo::{parse_bbid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    author_id,
    revision_id,
    content,
    posted_at
FROM notes";

/// One row of an entity's revision history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionHistoryItem {
    pub revision: Revision,
    pub author_name: String,
    /// `None` for the deletion revision.
    pub data_id: Option<i64>,
}

pub struct SqliteRevisionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRevisionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn insert_revision(&self, author_id: EditorId) -> RepoResult<Revision> {
        self.conn
            .execute("INSERT INTO revisions (author_id) VALUES (?1);", [author_id])?;
        let id = self.conn.last_insert_rowid();
        self.get_revision(id)?
            .ok_or_else(|| RepoError::not_found("revision", id))
    }

    pub fn get_revision(&self, id: RevisionId) -> RepoResult<Option<Revision>> {
        let revision = self
            .conn
            .query_row(
                "SELECT id, author_id, created_at FROM revisions WHERE id = ?1;",
                [id],
                parse_revision_row,
            )
            .optional()?;
        Ok(revision)
    }

    pub fn insert_note(
        &self,
        author_id: EditorId,
        revision_id: RevisionId,
        content: &str,
    ) -> RepoResult<Note> {
        self.conn.execute(
            "INSERT INTO notes (author_id, revision_id, content) VALUES (?1, ?2, ?3);",
            params![author_id, revision_id, content],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_note(id)?
            .ok_or_else(|| RepoError::not_found("note", id))
    }

    pub fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        let note = self
            .conn
            .query_row(
                &format!("{NOTE_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_note_row,
            )
            .optional()?;
        Ok(note)
    }

    /// Lists notes of one revision in posting order.
    pub fn list_notes(&self, revision_id: RevisionId) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL} WHERE revision_id = ?1 ORDER BY id ASC;"
        ))?;
        let notes = stmt
            .query_map([revision_id], parse_note_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    pub fn insert_annotation(
        &self,
        content: &str,
        revision_id: RevisionId,
    ) -> RepoResult<Annotation> {
        self.conn.execute(
            "INSERT INTO annotations (content, last_revision_id) VALUES (?1, ?2);",
            params![content, revision_id],
        )?;
        Ok(Annotation {
            id: self.conn.last_insert_rowid(),
            content: content.to_string(),
            last_revision_id: revision_id,
        })
    }

    pub fn get_annotation(&self, id: i64) -> RepoResult<Option<Annotation>> {
        let annotation = self
            .conn
            .query_row(
                "SELECT id, content, last_revision_id FROM annotations WHERE id = ?1;",
                [id],
                |row| {
                    Ok(Annotation {
                        id: row.get("id")?,
                        content: row.get("content")?,
                        last_revision_id: row.get("last_revision_id")?,
                    })
                },
            )
            .optional()?;
        Ok(annotation)
    }

    pub fn insert_disambiguation(&self, comment: &str) -> RepoResult<Disambiguation> {
        self.conn.execute(
            "INSERT INTO disambiguations (comment) VALUES (?1);",
            [comment],
        )?;
        Ok(Disambiguation {
            id: self.conn.last_insert_rowid(),
            comment: comment.to_string(),
        })
    }

    pub fn get_disambiguation(&self, id: i64) -> RepoResult<Option<Disambiguation>> {
        let disambiguation = self
            .conn
            .query_row(
                "SELECT id, comment FROM disambiguations WHERE id = ?1;",
                [id],
                |row| {
                    Ok(Disambiguation {
                        id: row.get("id")?,
                        comment: row.get("comment")?,
                    })
                },
            )
            .optional()?;
        Ok(disambiguation)
    }

    pub fn insert_entity(&self, bbid: Bbid, kind: EntityKind) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO entities (bbid, kind) VALUES (?1, ?2);",
            params![bbid.to_string(), kind.as_str()],
        )?;
        Ok(())
    }

    pub fn entity_kind(&self, bbid: Bbid) -> RepoResult<Option<EntityKind>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT kind FROM entities WHERE bbid = ?1;",
                [bbid.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        value
            .map(|text| {
                EntityKind::parse(&text).ok_or_else(|| {
                    RepoError::InvalidData(format!("invalid entity kind `{text}` in entities.kind"))
                })
            })
            .transpose()
    }

    pub fn insert_entity_revision(&self, entity_revision: &EntityRevision) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO entity_revisions (revision_id, bbid, data_id) VALUES (?1, ?2, ?3);",
            params![
                entity_revision.revision_id,
                entity_revision.bbid.to_string(),
                entity_revision.data_id,
            ],
        )?;
        Ok(())
    }

    pub fn get_entity_revision(
        &self,
        revision_id: RevisionId,
        bbid: Bbid,
    ) -> RepoResult<Option<EntityRevision>> {
        let row = self
            .conn
            .query_row(
                "SELECT revision_id, bbid, data_id
                 FROM entity_revisions
                 WHERE revision_id = ?1 AND bbid = ?2;",
                params![revision_id, bbid.to_string()],
                raw_entity_revision,
            )
            .optional()?;
        row.map(decode_entity_revision).transpose()
    }

    /// Lists the entities touched by one revision.
    pub fn entity_revisions_in(&self, revision_id: RevisionId) -> RepoResult<Vec<EntityRevision>> {
        let mut stmt = self.conn.prepare(
            "SELECT revision_id, bbid, data_id
             FROM entity_revisions
             WHERE revision_id = ?1
             ORDER BY bbid ASC;",
        )?;
        let rows = stmt
            .query_map([revision_id], raw_entity_revision)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode_entity_revision).collect()
    }

    /// Returns the latest entity revision of `bbid` strictly before `revision_id`.
    pub fn previous_entity_revision(
        &self,
        bbid: Bbid,
        revision_id: RevisionId,
    ) -> RepoResult<Option<EntityRevision>> {
        let row = self
            .conn
            .query_row(
                "SELECT revision_id, bbid, data_id
                 FROM entity_revisions
                 WHERE bbid = ?1 AND revision_id < ?2
                 ORDER BY revision_id DESC
                 LIMIT 1;",
                params![bbid.to_string(), revision_id],
                raw_entity_revision,
            )
            .optional()?;
        row.map(decode_entity_revision).transpose()
    }

    /// Lists all revisions of one entity, newest first.
    pub fn entity_history(&self, bbid: Bbid) -> RepoResult<Vec<RevisionHistoryItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                r.id AS id,
                r.author_id AS author_id,
                r.created_at AS created_at,
                e.name AS author_name,
                er.data_id AS data_id
             FROM entity_revisions er
             INNER JOIN revisions r ON r.id = er.revision_id
             INNER JOIN editors e ON e.id = r.author_id
             WHERE er.bbid = ?1
             ORDER BY r.id DESC;",
        )?;
        let items = stmt
            .query_map([bbid.to_string()], |row| {
                Ok(RevisionHistoryItem {
                    revision: parse_revision_row(row)?,
                    author_name: row.get("author_name")?,
                    data_id: row.get("data_id")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Points the entity header at `master_revision_id`, creating it if needed.
    pub fn set_header(&self, bbid: Bbid, master_revision_id: RevisionId) -> RepoResult<EntityHeader> {
        self.conn.execute(
            "INSERT INTO entity_headers (bbid, master_revision_id) VALUES (?1, ?2)
             ON CONFLICT(bbid) DO UPDATE SET master_revision_id = excluded.master_revision_id;",
            params![bbid.to_string(), master_revision_id],
        )?;
        Ok(EntityHeader {
            bbid,
            master_revision_id,
        })
    }

    pub fn get_header(&self, bbid: Bbid) -> RepoResult<Option<EntityHeader>> {
        let master_revision_id: Option<RevisionId> = self
            .conn
            .query_row(
                "SELECT master_revision_id FROM entity_headers WHERE bbid = ?1;",
                [bbid.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(master_revision_id.map(|master_revision_id| EntityHeader {
            bbid,
            master_revision_id,
        }))
    }
}

fn parse_revision_row(row: &Row<'_>) -> rusqlite::Result<Revision> {
    Ok(Revision {
        id: row.get("id")?,
        author_id: row.get("author_id")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_note_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get("id")?,
        author_id: row.get("author_id")?,
        revision_id: row.get("revision_id")?,
        content: row.get("content")?,
        posted_at: row.get("posted_at")?,
    })
}

type RawEntityRevision = (RevisionId, String, Option<i64>);

fn raw_entity_revision(row: &Row<'_>) -> rusqlite::Result<RawEntityRevision> {
    Ok((
        row.get("revision_id")?,
        row.get("bbid")?,
        row.get("data_id")?,
    ))
}

fn decode_entity_revision(raw: RawEntityRevision) -> RepoResult<EntityRevision> {
    let (revision_id, bbid_text, data_id) = raw;
    Ok(EntityRevision {
        revision_id,
        bbid: parse_bbid(&bbid_text, "entity_revisions.bbid")?,
        data_id,
    })
}
