//! Entity data rows and snapshot loading.
//!
//! # Responsibility
//! - Describe each entity kind's data table through `EntityKindModel`.
//! - Insert data rows and reload full `EntityState` snapshots.
//! - Store edition-to-publisher links.
//!
//! # Invariants
//! - Data rows are insert-only; an edit always produces a new row.
//! - Every data row references an alias set and an identifier set.

use crate::model::entity::{
    Bbid, CreatorProps, DataId, EditionProps, EntityKind, EntityRevision, EntityState,
    PublisherProps, WorkProps,
};
use crate::model::revision::RevisionId;
use crate::model::SetId;
use crate::repo::revision_repo::SqliteRevisionRepository;
use crate::repo::set_repo::{load_alias_set, load_identifier_set};
use crate::repo::{parse_bbid, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

const COMMON_COLUMNS: &[&str] = &[
    "alias_set_id",
    "identifier_set_id",
    "relationship_set_id",
    "annotation_id",
    "disambiguation_id",
];

/// Storage description of one entity kind.
pub trait EntityKindModel {
    type Props: Debug + Clone + Default + PartialEq + Serialize + DeserializeOwned;

    const KIND: EntityKind;
    const DATA_TABLE: &'static str;
    /// Kind-specific columns, in the order `bind_props` emits values.
    const PROP_COLUMNS: &'static [&'static str];

    fn bind_props(props: &Self::Props) -> Vec<Value>;

    fn read_props(row: &Row<'_>) -> rusqlite::Result<Self::Props>;

    /// Labelled display values, in display order.
    fn describe(props: &Self::Props) -> Vec<(&'static str, Option<String>)>;
}

pub struct CreatorModel;
pub struct WorkModel;
pub struct EditionModel;
pub struct PublisherModel;

impl EntityKindModel for CreatorModel {
    type Props = CreatorProps;

    const KIND: EntityKind = EntityKind::Creator;
    const DATA_TABLE: &'static str = "creator_data";
    const PROP_COLUMNS: &'static [&'static str] =
        &["creator_type", "gender", "begin_year", "end_year", "ended"];

    fn bind_props(props: &CreatorProps) -> Vec<Value> {
        vec![
            props.creator_type.clone().into(),
            props.gender.clone().into(),
            props.begin_year.into(),
            props.end_year.into(),
            props.ended.into(),
        ]
    }

    fn read_props(row: &Row<'_>) -> rusqlite::Result<CreatorProps> {
        Ok(CreatorProps {
            creator_type: row.get("creator_type")?,
            gender: row.get("gender")?,
            begin_year: row.get("begin_year")?,
            end_year: row.get("end_year")?,
            ended: row.get("ended")?,
        })
    }

    fn describe(props: &CreatorProps) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("Type", props.creator_type.clone()),
            ("Gender", props.gender.clone()),
            ("Begin Year", props.begin_year.map(|year| year.to_string())),
            ("End Year", props.end_year.map(|year| year.to_string())),
            ("Ended", props.ended.then(|| "Yes".to_string())),
        ]
    }
}

impl EntityKindModel for WorkModel {
    type Props = WorkProps;

    const KIND: EntityKind = EntityKind::Work;
    const DATA_TABLE: &'static str = "work_data";
    const PROP_COLUMNS: &'static [&'static str] = &["work_type", "language_id"];

    fn bind_props(props: &WorkProps) -> Vec<Value> {
        vec![props.work_type.clone().into(), props.language_id.into()]
    }

    fn read_props(row: &Row<'_>) -> rusqlite::Result<WorkProps> {
        Ok(WorkProps {
            work_type: row.get("work_type")?,
            language_id: row.get("language_id")?,
        })
    }

    fn describe(props: &WorkProps) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("Type", props.work_type.clone()),
            ("Language", props.language_id.map(|id| id.to_string())),
        ]
    }
}

impl EntityKindModel for EditionModel {
    type Props = EditionProps;

    const KIND: EntityKind = EntityKind::Edition;
    const DATA_TABLE: &'static str = "edition_data";
    const PROP_COLUMNS: &'static [&'static str] = &["edition_format", "release_year", "pages"];

    fn bind_props(props: &EditionProps) -> Vec<Value> {
        vec![
            props.edition_format.clone().into(),
            props.release_year.into(),
            props.pages.into(),
        ]
    }

    fn read_props(row: &Row<'_>) -> rusqlite::Result<EditionProps> {
        Ok(EditionProps {
            edition_format: row.get("edition_format")?,
            release_year: row.get("release_year")?,
            pages: row.get("pages")?,
        })
    }

    fn describe(props: &EditionProps) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("Format", props.edition_format.clone()),
            ("Release Year", props.release_year.map(|year| year.to_string())),
            ("Page Count", props.pages.map(|pages| pages.to_string())),
        ]
    }
}

impl EntityKindModel for PublisherModel {
    type Props = PublisherProps;

    const KIND: EntityKind = EntityKind::Publisher;
    const DATA_TABLE: &'static str = "publisher_data";
    const PROP_COLUMNS: &'static [&'static str] =
        &["publisher_type", "area", "begin_year", "end_year", "ended"];

    fn bind_props(props: &PublisherProps) -> Vec<Value> {
        vec![
            props.publisher_type.clone().into(),
            props.area.clone().into(),
            props.begin_year.into(),
            props.end_year.into(),
            props.ended.into(),
        ]
    }

    fn read_props(row: &Row<'_>) -> rusqlite::Result<PublisherProps> {
        Ok(PublisherProps {
            publisher_type: row.get("publisher_type")?,
            area: row.get("area")?,
            begin_year: row.get("begin_year")?,
            end_year: row.get("end_year")?,
            ended: row.get("ended")?,
        })
    }

    fn describe(props: &PublisherProps) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("Type", props.publisher_type.clone()),
            ("Area", props.area.clone()),
            ("Begin Year", props.begin_year.map(|year| year.to_string())),
            ("End Year", props.end_year.map(|year| year.to_string())),
            ("Ended", props.ended.then(|| "Yes".to_string())),
        ]
    }
}

/// References shared by every kind's data row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRefs {
    pub alias_set_id: SetId,
    pub identifier_set_id: SetId,
    pub relationship_set_id: Option<SetId>,
    pub annotation_id: Option<i64>,
    pub disambiguation_id: Option<i64>,
}

impl DataRefs {
    fn bind(&self) -> Vec<Value> {
        vec![
            self.alias_set_id.into(),
            self.identifier_set_id.into(),
            self.relationship_set_id.into(),
            self.annotation_id.into(),
            self.disambiguation_id.into(),
        ]
    }

    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            alias_set_id: row.get("alias_set_id")?,
            identifier_set_id: row.get("identifier_set_id")?,
            relationship_set_id: row.get("relationship_set_id")?,
            annotation_id: row.get("annotation_id")?,
            disambiguation_id: row.get("disambiguation_id")?,
        })
    }
}

/// Inserts a data row for kind `K` and returns its id.
pub fn insert_data<K: EntityKindModel>(
    conn: &Connection,
    refs: &DataRefs,
    props: &K::Props,
) -> RepoResult<DataId> {
    let columns = COMMON_COLUMNS
        .iter()
        .chain(K::PROP_COLUMNS)
        .copied()
        .collect::<Vec<_>>();
    let placeholders = (1..=columns.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders});",
        K::DATA_TABLE,
        columns.join(", ")
    );

    let mut values = refs.bind();
    values.extend(K::bind_props(props));
    conn.execute(&sql, params_from_iter(values))?;
    Ok(conn.last_insert_rowid())
}

/// Loads the shared references and typed properties of one data row.
pub fn load_data<K: EntityKindModel>(
    conn: &Connection,
    data_id: DataId,
) -> RepoResult<(DataRefs, K::Props)> {
    let sql = format!("SELECT * FROM {} WHERE id = ?1;", K::DATA_TABLE);
    conn.query_row(&sql, [data_id], |row| Ok((DataRefs::read(row)?, K::read_props(row)?)))
        .optional()?
        .ok_or_else(|| RepoError::not_found(K::DATA_TABLE, data_id))
}

/// Loads the full snapshot of an entity as stored by `data_id`.
pub fn load_state<K: EntityKindModel>(
    conn: &Connection,
    bbid: Bbid,
    revision_id: RevisionId,
    data_id: DataId,
) -> RepoResult<EntityState<K::Props>> {
    let (refs, props) = load_data::<K>(conn, data_id)?;
    let revisions = SqliteRevisionRepository::new(conn);

    let alias_set = load_alias_set(conn, refs.alias_set_id)?;
    let default_alias = alias_set.default_alias().cloned();
    let annotation = refs
        .annotation_id
        .map(|id| {
            revisions
                .get_annotation(id)?
                .ok_or_else(|| RepoError::not_found("annotation", id))
        })
        .transpose()?;
    let disambiguation = refs
        .disambiguation_id
        .map(|id| {
            revisions
                .get_disambiguation(id)?
                .ok_or_else(|| RepoError::not_found("disambiguation", id))
        })
        .transpose()?;

    Ok(EntityState {
        bbid,
        kind: K::KIND,
        revision_id,
        data_id,
        alias_set,
        default_alias,
        identifier_set: load_identifier_set(conn, refs.identifier_set_id)?,
        relationship_set_id: refs.relationship_set_id,
        annotation,
        disambiguation,
        props,
    })
}

/// Resolves the entity revision the header currently points at.
pub fn current_entity_revision(
    conn: &Connection,
    bbid: Bbid,
) -> RepoResult<Option<EntityRevision>> {
    let revisions = SqliteRevisionRepository::new(conn);
    let Some(header) = revisions.get_header(bbid)? else {
        return Ok(None);
    };
    let entity_revision = revisions
        .get_entity_revision(header.master_revision_id, bbid)?
        .ok_or_else(|| {
            RepoError::InvalidData(format!(
                "header of {bbid} points at revision {} without an entity revision",
                header.master_revision_id
            ))
        })?;
    Ok(Some(entity_revision))
}

/// Loads the current snapshot; `None` when unknown or deleted.
pub fn load_current<K: EntityKindModel>(
    conn: &Connection,
    bbid: Bbid,
) -> RepoResult<Option<EntityState<K::Props>>> {
    let Some(entity_revision) = current_entity_revision(conn, bbid)? else {
        return Ok(None);
    };
    entity_revision
        .data_id
        .map(|data_id| load_state::<K>(conn, bbid, entity_revision.revision_id, data_id))
        .transpose()
}

pub fn link_edition_publishers(
    conn: &Connection,
    edition_data_id: DataId,
    publishers: &[Bbid],
) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO edition_publishers (edition_data_id, publisher_bbid)
         VALUES (?1, ?2);",
    )?;
    for publisher in publishers {
        stmt.execute(params![edition_data_id, publisher.to_string()])?;
    }
    Ok(())
}

/// Lists publisher entities linked to one edition data row.
pub fn edition_publishers(conn: &Connection, edition_data_id: DataId) -> RepoResult<Vec<Bbid>> {
    let mut stmt = conn.prepare(
        "SELECT publisher_bbid
         FROM edition_publishers
         WHERE edition_data_id = ?1
         ORDER BY publisher_bbid ASC;",
    )?;
    let values = stmt
        .query_map([edition_data_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    values
        .iter()
        .map(|value| parse_bbid(value, "edition_publishers.publisher_bbid"))
        .collect()
}
