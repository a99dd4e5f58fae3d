//! Construction of new immutable alias and identifier sets.
//!
//! # Responsibility
//! - Skip set creation when nothing changed.
//! - Link reusable rows, insert fresh rows for new content, resolve defaults.
//!
//! # Invariants
//! - Runs on the caller's transaction; it never commits or rolls back.
//! - `old = None` means no set exists yet and always yields a new set.

use crate::model::SetId;
use crate::repo::RepoResult;
use crate::versioning::set_diff::{project, SetDiff, SetMember};
use crate::versioning::{SetError, SetResult};
use log::debug;
use rusqlite::Connection;

type FieldOf<S> = <<S as VersionedSet>::Member as SetMember>::Field;

/// Storage contract for one kind of versioned set.
pub trait VersionedSet {
    type Member: SetMember;

    /// Short name used in logs and errors (`alias_set`, ...).
    const LABEL: &'static str;

    /// Fields compared to decide reuse.
    fn compare_fields() -> &'static [FieldOf<Self>];

    /// Fields used to find the default member after construction.
    ///
    /// Empty for sets without a default pointer.
    fn default_match_fields() -> &'static [FieldOf<Self>] {
        &[]
    }

    /// Member the caller nominated as default, if the set tracks one.
    fn nominated_default(_members: &[Self::Member]) -> Option<&Self::Member> {
        None
    }

    fn insert_set(conn: &Connection) -> RepoResult<SetId>;

    /// Inserts a fresh row from `member`, ignoring its id, and returns the new id.
    fn insert_member(conn: &Connection, member: &Self::Member) -> RepoResult<i64>;

    fn link_member(conn: &Connection, set_id: SetId, member_id: i64) -> RepoResult<()>;

    /// Loads the members currently linked to `set_id`.
    fn load_members(conn: &Connection, set_id: SetId) -> RepoResult<Vec<Self::Member>>;

    fn write_default(_conn: &Connection, _set_id: SetId, _member_id: i64) -> RepoResult<()> {
        Ok(())
    }
}

/// A published set as seen by the builder.
#[derive(Debug, Clone)]
pub struct ExistingSet<M> {
    pub id: SetId,
    pub members: Vec<M>,
    pub default_id: Option<i64>,
}

/// Builds a new set for `new_members`, or returns `None` to keep `old`.
///
/// # Errors
/// - `NoDefaultNominated` when a default-tracking set gets members but no default.
/// - `DefaultNotFound` when the nominated default is absent after linking.
/// - Repository errors from any insert or link.
pub fn build_set<S: VersionedSet>(
    conn: &Connection,
    old: Option<&ExistingSet<S::Member>>,
    new_members: &[S::Member],
) -> SetResult<Option<SetId>> {
    let default_fields = S::default_match_fields();
    let nominated = S::nominated_default(new_members);
    if !default_fields.is_empty() && nominated.is_none() && !new_members.is_empty() {
        return Err(SetError::NoDefaultNominated { set: S::LABEL });
    }

    let old_members = old.map_or(&[][..], |set| set.members.as_slice());
    let diff = SetDiff::compute(old_members, new_members, S::compare_fields());

    if let Some(existing) = old {
        let default_kept = nominated.and_then(SetMember::member_id) == existing.default_id;
        if !diff.changed && default_kept {
            debug!(
                "event=set_build module=versioning status=reused set={} set_id={}",
                S::LABEL,
                existing.id
            );
            return Ok(None);
        }
    }

    let set_id = S::insert_set(conn)?;
    for member in &diff.unchanged {
        let member_id = member
            .member_id()
            .ok_or(SetError::UnpersistedMember { set: S::LABEL })?;
        S::link_member(conn, set_id, member_id)?;
    }
    for member in &diff.changed_or_new {
        let member_id = S::insert_member(conn, member)?;
        S::link_member(conn, set_id, member_id)?;
    }

    if let Some(nominated) = nominated.filter(|_| !default_fields.is_empty()) {
        let members = S::load_members(conn, set_id)?;
        let default_id = resolve_default(&members, nominated, default_fields).ok_or_else(|| {
            SetError::DefaultNotFound {
                set: S::LABEL,
                set_id,
                name: describe(nominated, default_fields),
            }
        })?;
        S::write_default(conn, set_id, default_id)?;
    }

    debug!(
        "event=set_build module=versioning status=ok set={} set_id={} linked={} created={}",
        S::LABEL,
        set_id,
        diff.unchanged.len(),
        diff.changed_or_new.len()
    );
    Ok(Some(set_id))
}

/// Finds the stored id of the member matching `nominated` on `fields`.
pub fn resolve_default<M: SetMember>(
    members: &[M],
    nominated: &M,
    fields: &[M::Field],
) -> Option<i64> {
    let target = project(nominated, fields);
    members
        .iter()
        .find(|member| project(*member, fields) == target)
        .and_then(SetMember::member_id)
}

fn describe<M: SetMember>(member: &M, fields: &[M::Field]) -> String {
    project(member, fields)
        .iter()
        .map(|value| format!("{value:?}"))
        .collect::<Vec<_>>()
        .join("/")
}
