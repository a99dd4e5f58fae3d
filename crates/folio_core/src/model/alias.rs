//! Alias records and alias set snapshots.
//!
//! # Invariants
//! - `default` is not persisted on the alias row; it is derived from the
//!   owning set's `default_alias_id` when a set is loaded.
//! - Client-supplied `id` values are only trusted for change detection.

use crate::model::SetId;
use crate::versioning::set_diff::{FieldValue, SetMember};
use serde::{Deserialize, Serialize};

pub type AliasId = i64;

/// Comparable alias fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasField {
    Name,
    SortName,
    LanguageId,
    Primary,
    Default,
}

/// Fields that decide whether two aliases carry the same content.
pub const ALIAS_COMPARE_FIELDS: &[AliasField] = &[
    AliasField::Name,
    AliasField::SortName,
    AliasField::LanguageId,
    AliasField::Primary,
];

/// Fields used to locate the default alias inside a freshly built set.
pub const ALIAS_DEFAULT_MATCH_FIELDS: &[AliasField] =
    &[AliasField::Name, AliasField::SortName, AliasField::LanguageId];

/// One name under which an entity is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alias {
    #[serde(default)]
    pub id: Option<AliasId>,
    pub name: String,
    pub sort_name: String,
    #[serde(default)]
    pub language_id: Option<i64>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub default: bool,
}

impl Alias {
    /// Creates an unsaved, non-primary, non-default alias.
    pub fn new(
        name: impl Into<String>,
        sort_name: impl Into<String>,
        language_id: Option<i64>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            sort_name: sort_name.into(),
            language_id,
            primary: false,
            default: false,
        }
    }

    pub fn with_id(mut self, id: AliasId) -> Self {
        self.id = Some(id);
        self
    }

    /// Marks this alias as the nominated default (and primary) name.
    pub fn as_default(mut self) -> Self {
        self.default = true;
        self.primary = true;
        self
    }
}

impl SetMember for Alias {
    type Field = AliasField;

    fn member_id(&self) -> Option<i64> {
        self.id
    }

    fn field_value(&self, field: AliasField) -> FieldValue {
        match field {
            AliasField::Name => FieldValue::Text(self.name.clone()),
            AliasField::SortName => FieldValue::Text(self.sort_name.clone()),
            AliasField::LanguageId => FieldValue::from(self.language_id),
            AliasField::Primary => FieldValue::Bool(self.primary),
            AliasField::Default => FieldValue::Bool(self.default),
        }
    }
}

/// Published alias set as attached to an entity data row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasSet {
    pub id: SetId,
    pub default_alias_id: Option<AliasId>,
    /// Members ordered by alias id; `default` flags reflect `default_alias_id`.
    pub aliases: Vec<Alias>,
}

impl AliasSet {
    pub fn default_alias(&self) -> Option<&Alias> {
        let default_id = self.default_alias_id?;
        self.aliases
            .iter()
            .find(|alias| alias.id == Some(default_id))
    }
}
