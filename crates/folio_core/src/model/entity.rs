//! Entity identity, revision pointers and per-kind snapshots.
//!
//! # Responsibility
//! - Name the entity kinds the catalog supports.
//! - Describe the shape returned to callers after a mutation (`EntityState`).
//! - Hold the kind-specific derived properties stored on data rows.
//!
//! # Invariants
//! - `bbid` never changes across revisions of one entity.
//! - `EntityRevision::data_id` is `None` exactly for deletions.

use crate::model::alias::{Alias, AliasSet};
use crate::model::identifier::IdentifierSet;
use crate::model::revision::{Annotation, Disambiguation, RevisionId};
use crate::model::SetId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable entity identifier shared by all revisions of one entity.
pub type Bbid = Uuid;

/// Primary key of a row in a kind-specific data table.
pub type DataId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Creator,
    Work,
    Edition,
    Publisher,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [Self::Creator, Self::Work, Self::Edition, Self::Publisher];

    /// Lowercase storage and routing name (`creator`, `work`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Work => "work",
            Self::Edition => "edition",
            Self::Publisher => "publisher",
        }
    }

    /// Human-facing label used in titles.
    pub fn label(self) -> &'static str {
        match self {
            Self::Creator => "Creator",
            Self::Work => "Work",
            Self::Edition => "Edition",
            Self::Publisher => "Publisher",
        }
    }

    /// Parses the storage name; matching is case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join between one entity and one revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRevision {
    pub revision_id: RevisionId,
    pub bbid: Bbid,
    pub data_id: Option<DataId>,
}

/// Current-state pointer of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityHeader {
    pub bbid: Bbid,
    pub master_revision_id: RevisionId,
}

/// Freshly inserted data row, handed to post-creation hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRow {
    pub bbid: Bbid,
    pub kind: EntityKind,
    pub revision_id: RevisionId,
    pub data_id: DataId,
    pub alias_set_id: SetId,
    pub identifier_set_id: SetId,
    pub relationship_set_id: Option<SetId>,
    pub annotation_id: Option<i64>,
    pub disambiguation_id: Option<i64>,
}

/// Full entity snapshot at one revision, as serialized to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityState<P> {
    pub bbid: Bbid,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub revision_id: RevisionId,
    pub data_id: DataId,
    pub alias_set: AliasSet,
    pub default_alias: Option<Alias>,
    pub identifier_set: IdentifierSet,
    pub relationship_set_id: Option<SetId>,
    pub annotation: Option<Annotation>,
    pub disambiguation: Option<Disambiguation>,
    #[serde(flatten)]
    pub props: P,
}

impl<P> EntityState<P> {
    /// Display title, e.g. `Creator “Ursula K. Le Guin”`.
    pub fn title(&self) -> String {
        entity_title(self.kind, self.default_alias.as_ref())
    }
}

/// Builds the display title of an entity from its kind and default alias.
pub fn entity_title(kind: EntityKind, default_alias: Option<&Alias>) -> String {
    match default_alias {
        Some(alias) if !alias.name.is_empty() => format!("{} “{}”", kind.label(), alias.name),
        _ => kind.label().to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorProps {
    #[serde(default)]
    pub creator_type: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub begin_year: Option<i32>,
    #[serde(default)]
    pub end_year: Option<i32>,
    #[serde(default)]
    pub ended: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkProps {
    #[serde(default)]
    pub work_type: Option<String>,
    #[serde(default)]
    pub language_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditionProps {
    #[serde(default)]
    pub edition_format: Option<String>,
    #[serde(default)]
    pub release_year: Option<i32>,
    #[serde(default)]
    pub pages: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublisherProps {
    #[serde(default)]
    pub publisher_type: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub begin_year: Option<i32>,
    #[serde(default)]
    pub end_year: Option<i32>,
    #[serde(default)]
    pub ended: bool,
}
