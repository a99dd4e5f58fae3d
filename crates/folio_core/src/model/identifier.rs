//! Identifier records (ISBNs, authority ids) and identifier sets.

use crate::model::SetId;
use crate::versioning::set_diff::{FieldValue, SetMember};
use serde::{Deserialize, Serialize};

pub type IdentifierId = i64;
pub type IdentifierTypeId = i64;

/// Comparable identifier fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierField {
    Value,
    TypeId,
}

pub const IDENTIFIER_COMPARE_FIELDS: &[IdentifierField] =
    &[IdentifierField::Value, IdentifierField::TypeId];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    #[serde(default)]
    pub id: Option<IdentifierId>,
    pub type_id: IdentifierTypeId,
    pub value: String,
}

impl Identifier {
    pub fn new(type_id: IdentifierTypeId, value: impl Into<String>) -> Self {
        Self {
            id: None,
            type_id,
            value: value.into(),
        }
    }

    pub fn with_id(mut self, id: IdentifierId) -> Self {
        self.id = Some(id);
        self
    }
}

impl SetMember for Identifier {
    type Field = IdentifierField;

    fn member_id(&self) -> Option<i64> {
        self.id
    }

    fn field_value(&self, field: IdentifierField) -> FieldValue {
        match field {
            IdentifierField::Value => FieldValue::Text(self.value.clone()),
            IdentifierField::TypeId => FieldValue::Int(self.type_id),
        }
    }
}

/// Identifier type reference row with its value validation pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierType {
    pub id: IdentifierTypeId,
    pub label: String,
    pub validation_regex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierSet {
    pub id: SetId,
    pub identifiers: Vec<Identifier>,
}
