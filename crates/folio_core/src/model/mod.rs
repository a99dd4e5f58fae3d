//! Catalog domain model.
//!
//! # Responsibility
//! - Define the records, versioned sets, revisions and entity snapshots used
//!   by the revision engine.
//! - Keep wire naming (camelCase JSON) in one place.
//!
//! # Invariants
//! - Alias and identifier rows are immutable once linked into a set.
//! - An entity is identified by a stable `Bbid` across all of its revisions.

pub mod alias;
pub mod entity;
pub mod identifier;
pub mod revision;

/// Database-assigned identifier of a versioned set.
pub type SetId = i64;
