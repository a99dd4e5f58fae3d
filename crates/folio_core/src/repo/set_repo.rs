//! Alias set and identifier set storage.
//!
//! # Responsibility
//! - Implement `VersionedSet` for alias and identifier sets.
//! - Load published sets as snapshots for entity states and diffs.
//! - Read reference data (languages, identifier types) used for validation.
//!
//! # Invariants
//! - Member rows are inserted once and afterwards only linked.
//! - The alias set default pointer is written only while the set is built.

use crate::model::alias::{
    Alias, AliasId, AliasSet, ALIAS_COMPARE_FIELDS, ALIAS_DEFAULT_MATCH_FIELDS, AliasField,
};
use crate::model::identifier::{
    Identifier, IdentifierField, IdentifierSet, IdentifierType, IdentifierTypeId,
    IDENTIFIER_COMPARE_FIELDS,
};
use crate::model::SetId;
use crate::repo::{bool_to_int, parse_bool, RepoError, RepoResult};
use crate::versioning::set_builder::{ExistingSet, VersionedSet};
use rusqlite::{params, Connection, OptionalExtension};

/// Alias sets with a default alias pointer.
pub struct AliasSets;

/// Identifier sets; no default member.
pub struct IdentifierSets;

impl VersionedSet for AliasSets {
    type Member = Alias;

    const LABEL: &'static str = "alias_set";

    fn compare_fields() -> &'static [AliasField] {
        ALIAS_COMPARE_FIELDS
    }

    fn default_match_fields() -> &'static [AliasField] {
        ALIAS_DEFAULT_MATCH_FIELDS
    }

    fn nominated_default(members: &[Alias]) -> Option<&Alias> {
        members.iter().find(|alias| alias.default)
    }

    fn insert_set(conn: &Connection) -> RepoResult<SetId> {
        conn.execute("INSERT INTO alias_sets (default_alias_id) VALUES (NULL);", [])?;
        Ok(conn.last_insert_rowid())
    }

    fn insert_member(conn: &Connection, member: &Alias) -> RepoResult<i64> {
        conn.execute(
            "INSERT INTO aliases (name, sort_name, language_id, is_primary)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                member.name.as_str(),
                member.sort_name.as_str(),
                member.language_id,
                bool_to_int(member.primary),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn link_member(conn: &Connection, set_id: SetId, member_id: i64) -> RepoResult<()> {
        conn.execute(
            "INSERT OR IGNORE INTO alias_set_members (set_id, alias_id) VALUES (?1, ?2);",
            params![set_id, member_id],
        )?;
        Ok(())
    }

    fn load_members(conn: &Connection, set_id: SetId) -> RepoResult<Vec<Alias>> {
        let mut stmt = conn.prepare(
            "SELECT a.id, a.name, a.sort_name, a.language_id, a.is_primary
             FROM alias_set_members m
             INNER JOIN aliases a ON a.id = m.alias_id
             WHERE m.set_id = ?1
             ORDER BY a.id ASC;",
        )?;
        let rows = stmt
            .query_map([set_id], |row| {
                Ok((
                    row.get::<_, AliasId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, name, sort_name, language_id, is_primary)| {
                Ok(Alias {
                    id: Some(id),
                    name,
                    sort_name,
                    language_id,
                    primary: parse_bool(is_primary, "aliases.is_primary")?,
                    default: false,
                })
            })
            .collect()
    }

    fn write_default(conn: &Connection, set_id: SetId, member_id: i64) -> RepoResult<()> {
        conn.execute(
            "UPDATE alias_sets SET default_alias_id = ?2 WHERE id = ?1;",
            params![set_id, member_id],
        )?;
        Ok(())
    }
}

impl VersionedSet for IdentifierSets {
    type Member = Identifier;

    const LABEL: &'static str = "identifier_set";

    fn compare_fields() -> &'static [IdentifierField] {
        IDENTIFIER_COMPARE_FIELDS
    }

    fn insert_set(conn: &Connection) -> RepoResult<SetId> {
        conn.execute("INSERT INTO identifier_sets DEFAULT VALUES;", [])?;
        Ok(conn.last_insert_rowid())
    }

    fn insert_member(conn: &Connection, member: &Identifier) -> RepoResult<i64> {
        conn.execute(
            "INSERT INTO identifiers (type_id, value) VALUES (?1, ?2);",
            params![member.type_id, member.value.as_str()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn link_member(conn: &Connection, set_id: SetId, member_id: i64) -> RepoResult<()> {
        conn.execute(
            "INSERT OR IGNORE INTO identifier_set_members (set_id, identifier_id)
             VALUES (?1, ?2);",
            params![set_id, member_id],
        )?;
        Ok(())
    }

    fn load_members(conn: &Connection, set_id: SetId) -> RepoResult<Vec<Identifier>> {
        let mut stmt = conn.prepare(
            "SELECT i.id, i.type_id, i.value
             FROM identifier_set_members m
             INNER JOIN identifiers i ON i.id = m.identifier_id
             WHERE m.set_id = ?1
             ORDER BY i.id ASC;",
        )?;
        let identifiers = stmt
            .query_map([set_id], |row| {
                Ok(Identifier {
                    id: Some(row.get(0)?),
                    type_id: row.get(1)?,
                    value: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(identifiers)
    }
}

/// Loads a published alias set with `default` flags applied.
pub fn load_alias_set(conn: &Connection, set_id: SetId) -> RepoResult<AliasSet> {
    let default_alias_id: Option<AliasId> = conn
        .query_row(
            "SELECT default_alias_id FROM alias_sets WHERE id = ?1;",
            [set_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| RepoError::not_found("alias_set", set_id))?;

    let aliases = AliasSets::load_members(conn, set_id)?
        .into_iter()
        .map(|mut alias| {
            alias.default = alias.id.is_some() && alias.id == default_alias_id;
            alias
        })
        .collect();

    Ok(AliasSet {
        id: set_id,
        default_alias_id,
        aliases,
    })
}

pub fn load_identifier_set(conn: &Connection, set_id: SetId) -> RepoResult<IdentifierSet> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM identifier_sets WHERE id = ?1);",
        [set_id],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(RepoError::not_found("identifier_set", set_id));
    }

    Ok(IdentifierSet {
        id: set_id,
        identifiers: IdentifierSets::load_members(conn, set_id)?,
    })
}

impl From<&AliasSet> for ExistingSet<Alias> {
    fn from(set: &AliasSet) -> Self {
        Self {
            id: set.id,
            members: set.aliases.clone(),
            default_id: set.default_alias_id,
        }
    }
}

impl From<&IdentifierSet> for ExistingSet<Identifier> {
    fn from(set: &IdentifierSet) -> Self {
        Self {
            id: set.id,
            members: set.identifiers.clone(),
            default_id: None,
        }
    }
}

pub fn get_identifier_type(
    conn: &Connection,
    id: IdentifierTypeId,
) -> RepoResult<Option<IdentifierType>> {
    let identifier_type = conn
        .query_row(
            "SELECT id, label, validation_regex FROM identifier_types WHERE id = ?1;",
            [id],
            |row| {
                Ok(IdentifierType {
                    id: row.get(0)?,
                    label: row.get(1)?,
                    validation_regex: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(identifier_type)
}

pub fn language_exists(conn: &Connection, id: i64) -> RepoResult<bool> {
    Ok(language_name(conn, id)?.is_some())
}

pub fn language_name(conn: &Connection, id: i64) -> RepoResult<Option<String>> {
    let name = conn
        .query_row("SELECT name FROM languages WHERE id = ?1;", [id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(name)
}
