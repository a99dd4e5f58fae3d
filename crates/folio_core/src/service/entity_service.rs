//! Entity lifecycle handlers.
//!
//! # Responsibility
//! - Decode kind-specific JSON request bodies.
//! - Validate aliases, identifiers and derived properties before writing.
//! - Route create, edit, show and delete to the revision orchestrator and
//!   render the resulting entity state as JSON.
//!
//! # Invariants
//! - Validation reads only; nothing is written for a rejected request.
//! - Editions link publishers through a post-write hook on the same
//!   transaction. An edit without `publishers` keeps the current links.

use crate::model::entity::{Bbid, EntityKind, EntityRevision, EntityRow, EntityState};
use crate::repo::entity_repo::{
    current_entity_revision, edition_publishers, link_edition_publishers, load_current,
    CreatorModel, EditionModel, EntityKindModel, PublisherModel, WorkModel,
};
use crate::repo::revision_repo::SqliteRevisionRepository;
use crate::repo::set_repo::{get_identifier_type, language_exists};
use crate::service::revision_service::{self, no_hook, EntityHook, EntityRequest};
use crate::service::session::AuthenticatedEditor;
use crate::service::{ServiceError, ServiceResult, ValidationError};
use regex::Regex;
use rusqlite::{Connection, Transaction};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// A decoded request body: shared content plus kind properties.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityForm<P> {
    #[serde(flatten)]
    pub request: EntityRequest,
    #[serde(flatten)]
    pub props: P,
}

#[derive(Debug, Default, Deserialize)]
struct EditionLinks {
    #[serde(default)]
    publishers: Option<Vec<Bbid>>,
}

/// Post-write hook linking an edition data row to publisher entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherLinks {
    publishers: Vec<Bbid>,
}

impl PublisherLinks {
    pub fn new(mut publishers: Vec<Bbid>) -> Self {
        publishers.sort();
        publishers.dedup();
        Self { publishers }
    }
}

impl EntityHook for PublisherLinks {
    fn changes(&self, conn: &Connection, previous: &EntityRow) -> ServiceResult<bool> {
        Ok(edition_publishers(conn, previous.data_id)? != self.publishers)
    }

    fn run(self, tx: &Transaction<'_>, row: &EntityRow) -> ServiceResult<()> {
        let revisions = SqliteRevisionRepository::new(tx);
        for publisher in &self.publishers {
            if revisions.entity_kind(*publisher)? != Some(EntityKind::Publisher) {
                return Err(ValidationError::NotAPublisher(*publisher).into());
            }
        }
        link_edition_publishers(tx, row.data_id, &self.publishers)?;
        Ok(())
    }
}

/// Decodes `body` into a form for props type `P`.
pub fn decode_form<P: DeserializeOwned>(body: &Value) -> Result<EntityForm<P>, ValidationError> {
    serde_json::from_value(body.clone())
        .map_err(|err| ValidationError::MalformedRequest(err.to_string()))
}

/// Checks aliases and identifiers against reference data.
pub fn validate_request(conn: &Connection, request: &EntityRequest) -> ServiceResult<()> {
    let mut defaults = 0;
    for (index, alias) in request.aliases.iter().enumerate() {
        if alias.name.trim().is_empty() {
            return Err(ValidationError::BlankAliasField { index, field: "name" }.into());
        }
        if alias.sort_name.trim().is_empty() {
            return Err(ValidationError::BlankAliasField {
                index,
                field: "sortName",
            }
            .into());
        }
        if let Some(language_id) = alias.language_id {
            if !language_exists(conn, language_id)? {
                return Err(ValidationError::UnknownLanguage(language_id).into());
            }
        }
        if alias.default {
            defaults += 1;
        }
    }
    if defaults > 1 {
        return Err(ValidationError::MultipleDefaults.into());
    }

    let mut patterns: HashMap<i64, (String, Regex)> = HashMap::new();
    for identifier in &request.identifiers {
        if !patterns.contains_key(&identifier.type_id) {
            let identifier_type = get_identifier_type(conn, identifier.type_id)?
                .ok_or(ValidationError::UnknownIdentifierType(identifier.type_id))?;
            let pattern = Regex::new(&identifier_type.validation_regex).map_err(|err| {
                ValidationError::InvalidField {
                    field: "validationRegex",
                    reason: format!("identifier type {}: {err}", identifier_type.id),
                }
            })?;
            patterns.insert(identifier.type_id, (identifier_type.label, pattern));
        }
        if let Some((label, pattern)) = patterns.get(&identifier.type_id) {
            if !pattern.is_match(&identifier.value) {
                return Err(ValidationError::InvalidIdentifierValue {
                    type_label: label.clone(),
                    value: identifier.value.clone(),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Kind-specific property checks.
pub trait PropsValidation {
    fn validate(&self, conn: &Connection) -> ServiceResult<()>;
}

fn check_year_range(begin: Option<i32>, end: Option<i32>) -> Result<(), ValidationError> {
    match (begin, end) {
        (Some(begin), Some(end)) if end < begin => Err(ValidationError::InvalidField {
            field: "endYear",
            reason: format!("{end} is before begin year {begin}"),
        }),
        _ => Ok(()),
    }
}

impl PropsValidation for crate::model::entity::CreatorProps {
    fn validate(&self, _conn: &Connection) -> ServiceResult<()> {
        Ok(check_year_range(self.begin_year, self.end_year)?)
    }
}

impl PropsValidation for crate::model::entity::WorkProps {
    fn validate(&self, conn: &Connection) -> ServiceResult<()> {
        if let Some(language_id) = self.language_id {
            if !language_exists(conn, language_id)? {
                return Err(ValidationError::UnknownLanguage(language_id).into());
            }
        }
        Ok(())
    }
}

impl PropsValidation for crate::model::entity::EditionProps {
    fn validate(&self, _conn: &Connection) -> ServiceResult<()> {
        if self.pages == Some(0) {
            return Err(ValidationError::InvalidField {
                field: "pages",
                reason: "must be positive".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl PropsValidation for crate::model::entity::PublisherProps {
    fn validate(&self, _conn: &Connection) -> ServiceResult<()> {
        Ok(check_year_range(self.begin_year, self.end_year)?)
    }
}

/// Validates and creates one entity of kind `K`.
pub fn create<K, H>(
    conn: &mut Connection,
    author: &AuthenticatedEditor,
    form: &EntityForm<K::Props>,
    hook: H,
) -> ServiceResult<EntityState<K::Props>>
where
    K: EntityKindModel,
    K::Props: PropsValidation,
    H: EntityHook,
{
    validate_request(conn, &form.request)?;
    form.props.validate(conn)?;
    revision_service::create_entity::<K, H>(conn, author, &form.request, &form.props, hook)
}

/// Validates and records an edit of entity `bbid` of kind `K`.
pub fn edit<K, H>(
    conn: &mut Connection,
    author: &AuthenticatedEditor,
    bbid: Bbid,
    form: &EntityForm<K::Props>,
    hook: H,
) -> ServiceResult<EntityState<K::Props>>
where
    K: EntityKindModel,
    K::Props: PropsValidation,
    H: EntityHook,
{
    validate_request(conn, &form.request)?;
    form.props.validate(conn)?;
    revision_service::update_entity::<K, H>(conn, author, bbid, &form.request, &form.props, hook)
}

/// Creates an entity of `kind` from a JSON body and returns its JSON state.
pub fn create_from_json(
    conn: &mut Connection,
    author: &AuthenticatedEditor,
    kind: EntityKind,
    body: &Value,
) -> ServiceResult<Value> {
    match kind {
        EntityKind::Creator => create_json::<CreatorModel, _>(conn, author, body, no_hook),
        EntityKind::Work => create_json::<WorkModel, _>(conn, author, body, no_hook),
        EntityKind::Publisher => create_json::<PublisherModel, _>(conn, author, body, no_hook),
        EntityKind::Edition => {
            let links = decode_links(body)?;
            let hook = PublisherLinks::new(links.publishers.unwrap_or_default());
            create_json::<EditionModel, _>(conn, author, body, hook)
        }
    }
}

/// Edits entity `bbid` of `kind` from a JSON body and returns its JSON state.
pub fn edit_from_json(
    conn: &mut Connection,
    author: &AuthenticatedEditor,
    kind: EntityKind,
    bbid: Bbid,
    body: &Value,
) -> ServiceResult<Value> {
    match kind {
        EntityKind::Creator => edit_json::<CreatorModel, _>(conn, author, bbid, body, no_hook),
        EntityKind::Work => edit_json::<WorkModel, _>(conn, author, bbid, body, no_hook),
        EntityKind::Publisher => {
            edit_json::<PublisherModel, _>(conn, author, bbid, body, no_hook)
        }
        EntityKind::Edition => {
            let publishers = match decode_links(body)?.publishers {
                Some(publishers) => publishers,
                None => current_publishers(conn, bbid)?,
            };
            edit_json::<EditionModel, _>(conn, author, bbid, body, PublisherLinks::new(publishers))
        }
    }
}

/// Records the deletion of `bbid`.
pub fn delete(
    conn: &mut Connection,
    author: &AuthenticatedEditor,
    bbid: Bbid,
    note: Option<&str>,
) -> ServiceResult<EntityRevision> {
    revision_service::delete_entity(conn, author, bbid, note)
}

/// Renders the current state of `bbid` as JSON.
///
/// # Errors
/// - `EntityNotFound` for an unknown bbid.
/// - `EntityDeleted` when the latest revision deleted the entity.
pub fn show_entity(conn: &Connection, bbid: Bbid) -> ServiceResult<Value> {
    let kind = SqliteRevisionRepository::new(conn)
        .entity_kind(bbid)?
        .ok_or(ServiceError::EntityNotFound(bbid))?;
    match kind {
        EntityKind::Creator => show_json::<CreatorModel>(conn, bbid),
        EntityKind::Work => show_json::<WorkModel>(conn, bbid),
        EntityKind::Edition => show_json::<EditionModel>(conn, bbid),
        EntityKind::Publisher => show_json::<PublisherModel>(conn, bbid),
    }
}

/// Serializes a state and adds `title` (and `publishers` for editions).
pub fn render_state<K: EntityKindModel>(
    conn: &Connection,
    state: &EntityState<K::Props>,
) -> ServiceResult<Value> {
    let mut value = serde_json::to_value(state)?;
    if let Value::Object(map) = &mut value {
        map.insert("title".to_string(), Value::String(state.title()));
        if K::KIND == EntityKind::Edition {
            let publishers = edition_publishers(conn, state.data_id)?;
            map.insert("publishers".to_string(), serde_json::to_value(publishers)?);
        }
    }
    Ok(value)
}

fn create_json<K, H>(
    conn: &mut Connection,
    author: &AuthenticatedEditor,
    body: &Value,
    hook: H,
) -> ServiceResult<Value>
where
    K: EntityKindModel,
    K::Props: PropsValidation,
    H: EntityHook,
{
    let form = decode_form::<K::Props>(body)?;
    let state = create::<K, H>(conn, author, &form, hook)?;
    render_state::<K>(conn, &state)
}

fn edit_json<K, H>(
    conn: &mut Connection,
    author: &AuthenticatedEditor,
    bbid: Bbid,
    body: &Value,
    hook: H,
) -> ServiceResult<Value>
where
    K: EntityKindModel,
    K::Props: PropsValidation,
    H: EntityHook,
{
    let form = decode_form::<K::Props>(body)?;
    let state = edit::<K, H>(conn, author, bbid, &form, hook)?;
    render_state::<K>(conn, &state)
}

fn show_json<K: EntityKindModel>(conn: &Connection, bbid: Bbid) -> ServiceResult<Value> {
    let state = load_current::<K>(conn, bbid)?.ok_or(ServiceError::EntityDeleted(bbid))?;
    render_state::<K>(conn, &state)
}

fn decode_links(body: &Value) -> Result<EditionLinks, ValidationError> {
    serde_json::from_value(body.clone())
        .map_err(|err| ValidationError::MalformedRequest(err.to_string()))
}

/// Publisher links of the current edition revision; empty for anything else.
fn current_publishers(conn: &Connection, bbid: Bbid) -> ServiceResult<Vec<Bbid>> {
    if SqliteRevisionRepository::new(conn).entity_kind(bbid)? != Some(EntityKind::Edition) {
        return Ok(Vec::new());
    }
    match current_entity_revision(conn, bbid)?.and_then(|current| current.data_id) {
        Some(data_id) => Ok(edition_publishers(conn, data_id)?),
        None => Ok(Vec::new()),
    }
}
