//! Revision presentation.
//!
//! # Responsibility
//! - Diff every entity touched by a revision against its previous revision.
//! - List revision notes with their authors and append new notes.
//! - Render a revision view as plain text.
//!
//! # Invariants
//! - Read paths never write; `add_note` is the only mutation here.
//! - Field order is stable: shared fields first, then kind fields.

use crate::model::alias::Alias;
use crate::model::entity::{entity_title, Bbid, DataId, EntityKind, EntityRevision};
use crate::model::revision::{Editor, EditorId, Note, Revision, RevisionId};
use crate::repo::editor_repo::SqliteEditorRepository;
use crate::repo::entity_repo::{
    edition_publishers, load_data, CreatorModel, EditionModel, EntityKindModel, PublisherModel,
    WorkModel,
};
use crate::repo::revision_repo::{RevisionHistoryItem, SqliteRevisionRepository};
use crate::repo::set_repo::{get_identifier_type, language_name, load_alias_set, load_identifier_set};
use crate::repo::RepoError;
use crate::service::revision_service::present_text;
use crate::service::session::AuthenticatedEditor;
use crate::service::{ServiceError, ServiceResult, ValidationError};
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    #[serde(rename = "N")]
    New,
    #[serde(rename = "E")]
    Edited,
    #[serde(rename = "D")]
    Deleted,
}

impl ChangeKind {
    pub fn code(self) -> char {
        match self {
            Self::New => 'N',
            Self::Edited => 'E',
            Self::Deleted => 'D',
        }
    }
}

/// One changed field; `lhs` is the previous value list, `rhs` the new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub key: String,
    pub kind: ChangeKind,
    pub lhs: Vec<String>,
    pub rhs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDiff {
    pub bbid: Bbid,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub title: String,
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteView {
    #[serde(flatten)]
    pub note: Note,
    pub author_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionView {
    pub revision: Revision,
    pub author: Editor,
    pub diffs: Vec<EntityDiff>,
    pub notes: Vec<NoteView>,
}

/// Display values of one data row, keyed by field label.
#[derive(Debug, Default)]
struct FieldSnapshot {
    default_alias: Option<Alias>,
    fields: Vec<(String, Vec<String>)>,
}

/// Builds the full view of revision `revision_id`.
pub fn revision_view(conn: &Connection, revision_id: RevisionId) -> ServiceResult<RevisionView> {
    let revisions = SqliteRevisionRepository::new(conn);
    let revision = revisions
        .get_revision(revision_id)?
        .ok_or(ServiceError::RevisionNotFound(revision_id))?;
    let editors = SqliteEditorRepository::new(conn);
    let author = editors
        .get_editor(revision.author_id)?
        .ok_or_else(|| RepoError::not_found("editor", revision.author_id))?;

    let diffs = revisions
        .entity_revisions_in(revision_id)?
        .iter()
        .map(|entity_revision| entity_diff(conn, entity_revision))
        .collect::<ServiceResult<Vec<_>>>()?;

    let mut author_names: HashMap<EditorId, String> = HashMap::new();
    author_names.insert(author.id, author.name.clone());
    let mut notes = Vec::new();
    for note in revisions.list_notes(revision_id)? {
        let author_name = match author_names.get(&note.author_id) {
            Some(name) => name.clone(),
            None => {
                let name = editors
                    .get_editor(note.author_id)?
                    .ok_or_else(|| RepoError::not_found("editor", note.author_id))?
                    .name;
                author_names.insert(note.author_id, name.clone());
                name
            }
        };
        notes.push(NoteView { note, author_name });
    }

    Ok(RevisionView {
        revision,
        author,
        diffs,
        notes,
    })
}

/// Lists revisions of entity `bbid`, newest first.
pub fn entity_revisions(conn: &Connection, bbid: Bbid) -> ServiceResult<Vec<RevisionHistoryItem>> {
    let revisions = SqliteRevisionRepository::new(conn);
    if revisions.entity_kind(bbid)?.is_none() {
        return Err(ServiceError::EntityNotFound(bbid));
    }
    Ok(revisions.entity_history(bbid)?)
}

/// Appends a note by `author` to an existing revision.
pub fn add_note(
    conn: &mut Connection,
    author: &AuthenticatedEditor,
    revision_id: RevisionId,
    content: &str,
) -> ServiceResult<Note> {
    let started_at = Instant::now();
    info!(
        "event=revision_note module=service status=start revision_id={revision_id} editor_id={}",
        author.id()
    );

    let result = (|| -> ServiceResult<Note> {
        let content = present_text(Some(content)).ok_or(ValidationError::BlankNote)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let revisions = SqliteRevisionRepository::new(&tx);
        if revisions.get_revision(revision_id)?.is_none() {
            return Err(ServiceError::RevisionNotFound(revision_id));
        }
        let note = revisions.insert_note(author.id(), revision_id, content)?;
        tx.commit()?;
        Ok(note)
    })();

    match &result {
        Ok(note) => info!(
            "event=revision_note module=service status=ok revision_id={revision_id} note_id={} duration_ms={}",
            note.id,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=revision_note module=service status=error revision_id={revision_id} duration_ms={} error_code={} error={err}",
            started_at.elapsed().as_millis(),
            err.code()
        ),
    }
    result
}

/// Renders a revision view for terminals.
pub fn format_revision_text(view: &RevisionView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Revision #{}", view.revision.id);
    let _ = writeln!(
        out,
        "Created by {} (editor #{}) at {}",
        view.author.name, view.author.id, view.revision.created_at
    );

    for diff in &view.diffs {
        let _ = writeln!(out);
        let _ = writeln!(out, "{} [{}]", diff.title, diff.bbid);
        if diff.changes.is_empty() {
            let _ = writeln!(out, "  (no field changes)");
        }
        for change in &diff.changes {
            let _ = writeln!(
                out,
                "  {} {}: {} -> {}",
                change.kind.code(),
                change.key,
                format_values(&change.lhs),
                format_values(&change.rhs)
            );
        }
    }

    let _ = writeln!(out);
    if view.notes.is_empty() {
        let _ = writeln!(out, "No revision notes present");
    } else {
        let _ = writeln!(out, "Notes:");
        for note in &view.notes {
            let _ = writeln!(
                out,
                "  {} ({}): {}",
                note.author_name, note.note.posted_at, note.note.content
            );
        }
    }
    out
}

fn format_values(values: &[String]) -> String {
    if values.is_empty() {
        "—".to_string()
    } else {
        values.join(", ")
    }
}

fn entity_diff(conn: &Connection, entity_revision: &EntityRevision) -> ServiceResult<EntityDiff> {
    let revisions = SqliteRevisionRepository::new(conn);
    let bbid = entity_revision.bbid;
    let kind = revisions
        .entity_kind(bbid)?
        .ok_or(ServiceError::EntityNotFound(bbid))?;

    let previous_data_id = revisions
        .previous_entity_revision(bbid, entity_revision.revision_id)?
        .and_then(|previous| previous.data_id);
    let before = previous_data_id
        .map(|data_id| snapshot(conn, kind, data_id))
        .transpose()?
        .unwrap_or_default();
    let after = entity_revision
        .data_id
        .map(|data_id| snapshot(conn, kind, data_id))
        .transpose()?
        .unwrap_or_default();

    let title_alias = after.default_alias.as_ref().or(before.default_alias.as_ref());
    Ok(EntityDiff {
        bbid,
        kind,
        title: entity_title(kind, title_alias),
        changes: diff_fields(&before.fields, &after.fields),
    })
}

/// Field-level changes from `lhs` to `rhs`; keys keep `lhs` order, then new keys.
fn diff_fields(lhs: &[(String, Vec<String>)], rhs: &[(String, Vec<String>)]) -> Vec<FieldChange> {
    let mut keys: Vec<&str> = lhs.iter().map(|(key, _)| key.as_str()).collect();
    for (key, _) in rhs {
        if !keys.contains(&key.as_str()) {
            keys.push(key);
        }
    }

    let lookup = |fields: &[(String, Vec<String>)], key: &str| -> Vec<String> {
        fields
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, values)| values.clone())
            .unwrap_or_default()
    };

    keys.into_iter()
        .filter_map(|key| {
            let old = lookup(lhs, key);
            let new = lookup(rhs, key);
            let kind = match (old.is_empty(), new.is_empty()) {
                _ if old == new => return None,
                (true, false) => ChangeKind::New,
                (false, true) => ChangeKind::Deleted,
                _ => ChangeKind::Edited,
            };
            Some(FieldChange {
                key: key.to_string(),
                kind,
                lhs: old,
                rhs: new,
            })
        })
        .collect()
}

fn snapshot(conn: &Connection, kind: EntityKind, data_id: DataId) -> ServiceResult<FieldSnapshot> {
    match kind {
        EntityKind::Creator => snapshot_of::<CreatorModel>(conn, data_id),
        EntityKind::Work => snapshot_of::<WorkModel>(conn, data_id),
        EntityKind::Edition => snapshot_of::<EditionModel>(conn, data_id),
        EntityKind::Publisher => snapshot_of::<PublisherModel>(conn, data_id),
    }
}

fn snapshot_of<K: EntityKindModel>(conn: &Connection, data_id: DataId) -> ServiceResult<FieldSnapshot> {
    let (refs, props) = load_data::<K>(conn, data_id)?;
    let revisions = SqliteRevisionRepository::new(conn);
    let alias_set = load_alias_set(conn, refs.alias_set_id)?;
    let identifier_set = load_identifier_set(conn, refs.identifier_set_id)?;

    let mut fields = Vec::new();
    let default_alias = alias_set.default_alias().cloned();
    fields.push((
        "Default Alias".to_string(),
        match &default_alias {
            Some(alias) => vec![format_alias(conn, alias)?],
            None => Vec::new(),
        },
    ));
    fields.push((
        "Aliases".to_string(),
        alias_set
            .aliases
            .iter()
            .map(|alias| format_alias(conn, alias))
            .collect::<ServiceResult<Vec<_>>>()?,
    ));

    let mut identifiers = Vec::with_capacity(identifier_set.identifiers.len());
    for identifier in &identifier_set.identifiers {
        let label = get_identifier_type(conn, identifier.type_id)?
            .map_or_else(|| format!("type {}", identifier.type_id), |t| t.label);
        identifiers.push(format!("{label}: {}", identifier.value));
    }
    fields.push(("Identifiers".to_string(), identifiers));

    let annotation = match refs.annotation_id {
        Some(id) => revisions.get_annotation(id)?.map(|annotation| annotation.content),
        None => None,
    };
    fields.push(("Annotation".to_string(), annotation.into_iter().collect()));
    let disambiguation = match refs.disambiguation_id {
        Some(id) => revisions.get_disambiguation(id)?.map(|row| row.comment),
        None => None,
    };
    fields.push(("Disambiguation".to_string(), disambiguation.into_iter().collect()));

    for (label, value) in K::describe(&props) {
        fields.push((label.to_string(), value.into_iter().collect()));
    }
    if K::KIND == EntityKind::Edition {
        let publishers = edition_publishers(conn, data_id)?;
        fields.push((
            "Publishers".to_string(),
            publishers.iter().map(Bbid::to_string).collect(),
        ));
    }

    Ok(FieldSnapshot {
        default_alias,
        fields,
    })
}

fn format_alias(conn: &Connection, alias: &Alias) -> ServiceResult<String> {
    let mut text = format!("{} ({})", alias.name, alias.sort_name);
    if let Some(language_id) = alias.language_id {
        let language = language_name(conn, language_id)?
            .unwrap_or_else(|| format!("language {language_id}"));
        let _ = write!(text, " [{language}]");
    }
    if alias.primary {
        text.push_str(" primary");
    }
    Ok(text)
}
