//! Revision transactions for entity creation, edits and deletion.
//!
//! # Responsibility
//! - Bind editor counters, the revision row, an optional note, rebuilt sets,
//!   the data row, the entity-revision row and the header into one
//!   transaction.
//! - Run post-write hooks inside that same transaction.
//!
//! # Invariants
//! - Each call opens exactly one `BEGIN IMMEDIATE` transaction and commits
//!   only after every step, hook and read-back succeeded.
//! - Counters move by exactly one per committed revision.
//! - Published sets and data rows are never updated in place.

use crate::model::alias::Alias;
use crate::model::entity::{Bbid, EntityKind, EntityRevision, EntityRow, EntityState};
use crate::model::identifier::Identifier;
use crate::model::revision::{Revision, RevisionId};
use crate::repo::editor_repo::SqliteEditorRepository;
use crate::repo::entity_repo::{
    current_entity_revision, insert_data, load_state, DataRefs, EntityKindModel,
};
use crate::repo::revision_repo::SqliteRevisionRepository;
use crate::repo::set_repo::{AliasSets, IdentifierSets};
use crate::repo::RepoError;
use crate::service::session::AuthenticatedEditor;
use crate::service::{ServiceError, ServiceResult};
use crate::versioning::set_builder::{build_set, ExistingSet};
use log::{error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Deserialize;
use std::time::Instant;
use uuid::Uuid;

/// Kind-independent part of a create or edit request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRequest {
    #[serde(default)]
    pub aliases: Vec<Alias>,
    #[serde(default)]
    pub identifiers: Vec<Identifier>,
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(default)]
    pub disambiguation: Option<String>,
    /// Revision note; blank text means no note.
    #[serde(default)]
    pub note: Option<String>,
}

/// Extra work run on the revision transaction after the data row exists.
///
/// Any `FnOnce(&Transaction, &EntityRow) -> ServiceResult<()>` is a hook.
pub trait EntityHook {
    /// Whether running the hook on an edit alters what `previous` holds.
    fn changes(&self, _conn: &Connection, _previous: &EntityRow) -> ServiceResult<bool> {
        Ok(false)
    }

    fn run(self, tx: &Transaction<'_>, row: &EntityRow) -> ServiceResult<()>;
}

impl<F> EntityHook for F
where
    F: FnOnce(&Transaction<'_>, &EntityRow) -> ServiceResult<()>,
{
    fn run(self, tx: &Transaction<'_>, row: &EntityRow) -> ServiceResult<()> {
        self(tx, row)
    }
}

/// Hook that does nothing.
pub fn no_hook(_tx: &Transaction<'_>, _row: &EntityRow) -> ServiceResult<()> {
    Ok(())
}

/// Creates a new entity of kind `K` in one revision.
pub fn create_entity<K, H>(
    conn: &mut Connection,
    author: &AuthenticatedEditor,
    request: &EntityRequest,
    props: &K::Props,
    hook: H,
) -> ServiceResult<EntityState<K::Props>>
where
    K: EntityKindModel,
    H: EntityHook,
{
    let started_at = Instant::now();
    info!(
        "event=entity_create module=service status=start kind={} editor_id={}",
        K::KIND,
        author.id()
    );

    let result = create_in_transaction::<K, H>(conn, author, request, props, hook);
    match &result {
        Ok(state) => info!(
            "event=entity_create module=service status=ok kind={} bbid={} revision_id={} data_id={} duration_ms={}",
            K::KIND,
            state.bbid,
            state.revision_id,
            state.data_id,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=entity_create module=service status=error kind={} duration_ms={} error_code={} error={err}",
            K::KIND,
            started_at.elapsed().as_millis(),
            err.code()
        ),
    }
    result
}

/// Records an edit of entity `bbid` as a new revision.
///
/// # Errors
/// - `EntityNotFound`, `EntityDeleted` or `KindMismatch` for a bad target.
/// - `NothingChanged` when sets, texts, properties and hook output all match
///   the current revision.
pub fn update_entity<K, H>(
    conn: &mut Connection,
    author: &AuthenticatedEditor,
    bbid: Bbid,
    request: &EntityRequest,
    props: &K::Props,
    hook: H,
) -> ServiceResult<EntityState<K::Props>>
where
    K: EntityKindModel,
    H: EntityHook,
{
    let started_at = Instant::now();
    info!(
        "event=entity_update module=service status=start kind={} bbid={bbid} editor_id={}",
        K::KIND,
        author.id()
    );

    let result = update_in_transaction::<K, H>(conn, author, bbid, request, props, hook);
    match &result {
        Ok(state) => info!(
            "event=entity_update module=service status=ok kind={} bbid={bbid} revision_id={} data_id={} duration_ms={}",
            K::KIND,
            state.revision_id,
            state.data_id,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=entity_update module=service status=error kind={} bbid={bbid} duration_ms={} error_code={} error={err}",
            K::KIND,
            started_at.elapsed().as_millis(),
            err.code()
        ),
    }
    result
}

/// Records the deletion of entity `bbid` as a new revision with no data row.
pub fn delete_entity(
    conn: &mut Connection,
    author: &AuthenticatedEditor,
    bbid: Bbid,
    note: Option<&str>,
) -> ServiceResult<EntityRevision> {
    let started_at = Instant::now();
    info!(
        "event=entity_delete module=service status=start bbid={bbid} editor_id={}",
        author.id()
    );

    let result = delete_in_transaction(conn, author, bbid, note);
    match &result {
        Ok(entity_revision) => info!(
            "event=entity_delete module=service status=ok bbid={bbid} revision_id={} duration_ms={}",
            entity_revision.revision_id,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=entity_delete module=service status=error bbid={bbid} duration_ms={} error_code={} error={err}",
            started_at.elapsed().as_millis(),
            err.code()
        ),
    }
    result
}

fn create_in_transaction<K, H>(
    conn: &mut Connection,
    author: &AuthenticatedEditor,
    request: &EntityRequest,
    props: &K::Props,
    hook: H,
) -> ServiceResult<EntityState<K::Props>>
where
    K: EntityKindModel,
    H: EntityHook,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let revision = open_revision(&tx, author, request.note.as_deref())?;
    let revisions = SqliteRevisionRepository::new(&tx);

    let alias_set_id = build_set::<AliasSets>(&tx, None, &request.aliases)?
        .ok_or(ServiceError::InconsistentState("alias set not created"))?;
    let identifier_set_id = build_set::<IdentifierSets>(&tx, None, &request.identifiers)?
        .ok_or(ServiceError::InconsistentState("identifier set not created"))?;
    let refs = DataRefs {
        alias_set_id,
        identifier_set_id,
        relationship_set_id: None,
        annotation_id: match present_text(request.annotation.as_deref()) {
            Some(content) => Some(revisions.insert_annotation(content, revision.id)?.id),
            None => None,
        },
        disambiguation_id: match present_text(request.disambiguation.as_deref()) {
            Some(comment) => Some(revisions.insert_disambiguation(comment)?.id),
            None => None,
        },
    };
    let data_id = insert_data::<K>(&tx, &refs, props)?;

    let bbid = Uuid::new_v4();
    revisions.insert_entity(bbid, K::KIND)?;
    revisions.insert_entity_revision(&EntityRevision {
        revision_id: revision.id,
        bbid,
        data_id: Some(data_id),
    })?;
    revisions.set_header(bbid, revision.id)?;

    hook.run(&tx, &entity_row(bbid, K::KIND, revision.id, data_id, &refs))?;

    let state = load_state::<K>(&tx, bbid, revision.id, data_id)?;
    tx.commit()?;
    Ok(state)
}

fn update_in_transaction<K, H>(
    conn: &mut Connection,
    author: &AuthenticatedEditor,
    bbid: Bbid,
    request: &EntityRequest,
    props: &K::Props,
    hook: H,
) -> ServiceResult<EntityState<K::Props>>
where
    K: EntityKindModel,
    H: EntityHook,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = expect_live_entity(&tx, bbid, Some(K::KIND))?;
    let old_data_id = current
        .data_id
        .ok_or(ServiceError::InconsistentState("live entity without data row"))?;
    let old = load_state::<K>(&tx, bbid, current.revision_id, old_data_id)?;
    let old_refs = DataRefs {
        alias_set_id: old.alias_set.id,
        identifier_set_id: old.identifier_set.id,
        relationship_set_id: old.relationship_set_id,
        annotation_id: old.annotation.as_ref().map(|annotation| annotation.id),
        disambiguation_id: old.disambiguation.as_ref().map(|disambiguation| disambiguation.id),
    };

    let revision = open_revision(&tx, author, request.note.as_deref())?;
    let revisions = SqliteRevisionRepository::new(&tx);

    let alias_set_id = build_set::<AliasSets>(
        &tx,
        Some(&ExistingSet::from(&old.alias_set)),
        &request.aliases,
    )?
    .unwrap_or(old.alias_set.id);
    let identifier_set_id = build_set::<IdentifierSets>(
        &tx,
        Some(&ExistingSet::from(&old.identifier_set)),
        &request.identifiers,
    )?
    .unwrap_or(old.identifier_set.id);

    let annotation_id = match present_text(request.annotation.as_deref()) {
        None => None,
        Some(content) => match &old.annotation {
            Some(annotation) if annotation.content == content => Some(annotation.id),
            _ => Some(revisions.insert_annotation(content, revision.id)?.id),
        },
    };
    let disambiguation_id = match present_text(request.disambiguation.as_deref()) {
        None => None,
        Some(comment) => match &old.disambiguation {
            Some(disambiguation) if disambiguation.comment == comment => Some(disambiguation.id),
            _ => Some(revisions.insert_disambiguation(comment)?.id),
        },
    };

    let refs = DataRefs {
        alias_set_id,
        identifier_set_id,
        relationship_set_id: old.relationship_set_id,
        annotation_id,
        disambiguation_id,
    };
    let previous_row = entity_row(bbid, K::KIND, old.revision_id, old.data_id, &old_refs);
    if refs == old_refs && *props == old.props && !hook.changes(&tx, &previous_row)? {
        return Err(ServiceError::NothingChanged(bbid));
    }

    let data_id = insert_data::<K>(&tx, &refs, props)?;
    revisions.insert_entity_revision(&EntityRevision {
        revision_id: revision.id,
        bbid,
        data_id: Some(data_id),
    })?;
    revisions.set_header(bbid, revision.id)?;

    hook.run(&tx, &entity_row(bbid, K::KIND, revision.id, data_id, &refs))?;

    let state = load_state::<K>(&tx, bbid, revision.id, data_id)?;
    tx.commit()?;
    Ok(state)
}

fn delete_in_transaction(
    conn: &mut Connection,
    author: &AuthenticatedEditor,
    bbid: Bbid,
    note: Option<&str>,
) -> ServiceResult<EntityRevision> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    expect_live_entity(&tx, bbid, None)?;

    let revision = open_revision(&tx, author, note)?;
    let revisions = SqliteRevisionRepository::new(&tx);
    let entity_revision = EntityRevision {
        revision_id: revision.id,
        bbid,
        data_id: None,
    };
    revisions.insert_entity_revision(&entity_revision)?;
    revisions.set_header(bbid, revision.id)?;

    tx.commit()?;
    Ok(entity_revision)
}

/// Bumps the author's counters, inserts the revision and its optional note.
fn open_revision(
    tx: &Transaction<'_>,
    author: &AuthenticatedEditor,
    note: Option<&str>,
) -> ServiceResult<Revision> {
    SqliteEditorRepository::new(tx).record_applied_revision(author.id())?;
    let revisions = SqliteRevisionRepository::new(tx);
    let revision = revisions.insert_revision(author.id())?;
    if let Some(content) = present_text(note) {
        revisions.insert_note(author.id(), revision.id, content)?;
    }
    Ok(revision)
}

/// Returns the current entity revision of a live entity of `expected` kind.
fn expect_live_entity(
    conn: &Connection,
    bbid: Bbid,
    expected: Option<EntityKind>,
) -> ServiceResult<EntityRevision> {
    let actual = SqliteRevisionRepository::new(conn)
        .entity_kind(bbid)?
        .ok_or(ServiceError::EntityNotFound(bbid))?;
    if let Some(expected) = expected.filter(|expected| *expected != actual) {
        return Err(ServiceError::KindMismatch {
            bbid,
            expected,
            actual,
        });
    }

    let current = current_entity_revision(conn, bbid)?.ok_or_else(|| {
        ServiceError::Repo(RepoError::InvalidData(format!(
            "entity {bbid} has no header"
        )))
    })?;
    if current.data_id.is_none() {
        return Err(ServiceError::EntityDeleted(bbid));
    }
    Ok(current)
}

fn entity_row(
    bbid: Bbid,
    kind: EntityKind,
    revision_id: RevisionId,
    data_id: i64,
    refs: &DataRefs,
) -> EntityRow {
    EntityRow {
        bbid,
        kind,
        revision_id,
        data_id,
        alias_set_id: refs.alias_set_id,
        identifier_set_id: refs.identifier_set_id,
        relationship_set_id: refs.relationship_set_id,
        annotation_id: refs.annotation_id,
        disambiguation_id: refs.disambiguation_id,
    }
}

/// Trimmed text, or `None` when absent or blank.
pub(crate) fn present_text(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::present_text;

    #[test]
    fn blank_text_counts_as_absent() {
        assert_eq!(present_text(None), None);
        assert_eq!(present_text(Some("   \n")), None);
        assert_eq!(present_text(Some("  first edition ")), Some("first edition"));
    }
}
