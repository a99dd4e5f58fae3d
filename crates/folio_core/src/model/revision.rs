//! Editors, revisions, notes and the immutable text rows owned by revisions.

use serde::Serialize;

pub type EditorId = i64;
pub type RevisionId = i64;
pub type NoteId = i64;

/// Revision author with lifetime counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Editor {
    pub id: EditorId,
    pub name: String,
    /// Incremented once for every committed revision authored.
    pub total_revisions: i64,
    /// Incremented once for every committed revision that was applied.
    pub revisions_applied: i64,
    /// Epoch milliseconds.
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub id: RevisionId,
    pub author_id: EditorId,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Discussion note attached to a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub author_id: EditorId,
    pub revision_id: RevisionId,
    pub content: String,
    /// Epoch milliseconds.
    pub posted_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: i64,
    pub content: String,
    pub last_revision_id: RevisionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Disambiguation {
    pub id: i64,
    pub comment: String,
}
