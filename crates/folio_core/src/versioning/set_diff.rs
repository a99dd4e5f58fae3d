//! Value-based diffing of versioned set members.
//!
//! # Responsibility
//! - Decide whether a submitted collection differs from a published set.
//! - Split the submitted collection into reusable and to-be-created members.
//!
//! # Invariants
//! - Only the caller-selected fields take part in equality; ids never do.
//! - `unchanged` and `changed_or_new` never overlap, and together cover the
//!   projections of the new collection.
//!
//! Reuse is decided by content, not identity: a submitted member that has the
//! same projection as some old member reuses that old row even when the two
//! ids differ. Identifiers of distinct rows with identical values therefore
//! collapse into one.

use std::collections::{HashMap, HashSet};

/// Scalar value of one comparable field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<Option<i64>> for FieldValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Null, Self::Int)
    }
}

/// A record that can live inside a versioned set.
pub trait SetMember {
    /// Field selector used to build projections.
    type Field: Copy + 'static;

    /// Persisted identity, `None` for members not yet stored.
    fn member_id(&self) -> Option<i64>;

    fn field_value(&self, field: Self::Field) -> FieldValue;
}

/// Ordered values of the selected fields of one member.
pub type Projection = Vec<FieldValue>;

pub fn project<M: SetMember>(member: &M, fields: &[M::Field]) -> Projection {
    fields
        .iter()
        .map(|field| member.field_value(*field))
        .collect()
}

/// Returns whether `new` differs from `old`.
///
/// Changed when an old id is missing from `new`, when a new member has no id
/// or an id unknown to `old`, or when a member present in both has a
/// different projection onto `fields`.
pub fn has_changed<M: SetMember>(old: &[M], new: &[M], fields: &[M::Field]) -> bool {
    let old_by_id: HashMap<i64, &M> = old
        .iter()
        .filter_map(|member| member.member_id().map(|id| (id, member)))
        .collect();
    let new_ids: HashSet<i64> = new.iter().filter_map(SetMember::member_id).collect();

    if old_by_id.keys().any(|id| !new_ids.contains(id)) {
        return true;
    }

    new.iter().any(|member| {
        match member.member_id().and_then(|id| old_by_id.get(&id)) {
            Some(previous) => project(*previous, fields) != project(member, fields),
            None => true,
        }
    })
}

/// Old members whose projection also appears in `new`, one per projection.
///
/// The old rows are returned because they are the stored rows a new set
/// links to.
pub fn unchanged<'a, M: SetMember>(old: &'a [M], new: &[M], fields: &[M::Field]) -> Vec<&'a M> {
    let wanted: HashSet<Projection> = new.iter().map(|member| project(member, fields)).collect();
    let mut seen = HashSet::new();
    old.iter()
        .filter(|member| {
            let projection = project(*member, fields);
            wanted.contains(&projection) && seen.insert(projection)
        })
        .collect()
}

/// New members whose projection matches nothing in `old`, one per projection.
pub fn changed_or_new<'a, M: SetMember>(
    old: &[M],
    new: &'a [M],
    fields: &[M::Field],
) -> Vec<&'a M> {
    let existing: HashSet<Projection> = old.iter().map(|member| project(member, fields)).collect();
    let mut seen = HashSet::new();
    new.iter()
        .filter(|member| {
            let projection = project(*member, fields);
            !existing.contains(&projection) && seen.insert(projection)
        })
        .collect()
}

/// All three differ outputs for one old/new pair.
#[derive(Debug)]
pub struct SetDiff<'a, M> {
    pub changed: bool,
    /// Stored rows to link into the new set.
    pub unchanged: Vec<&'a M>,
    /// Submitted members that need fresh rows.
    pub changed_or_new: Vec<&'a M>,
}

impl<'a, M: SetMember> SetDiff<'a, M> {
    pub fn compute(old: &'a [M], new: &'a [M], fields: &[M::Field]) -> Self {
        Self {
            changed: has_changed(old, new, fields),
            unchanged: unchanged(old, new, fields),
            changed_or_new: changed_or_new(old, new, fields),
        }
    }
}
