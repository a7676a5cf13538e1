//! Storage-agnostic repositories for [`Record`] types.
//!
//! A repository stores one record type, hands out primary keys, and answers
//! exact-value and substring queries. The SQLite and in-memory back-ends
//! honour the same contract; [`RepositoryFactory`] picks between them.

mod factory;
mod memory;
mod record;
mod sqlite;

pub(crate) use factory::{RepositoryFactory, Storage};
pub(crate) use memory::MemoryRepository;
pub(crate) use record::{
    format_timestamp, Field, FieldKind, FieldValues, Filter, Patterns, Record, Value,
    TIMESTAMP_FORMAT,
};
pub(crate) use sqlite::SqliteRepository;

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum RepoError {
    /// The record's own pk does not allow the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("no {table} with pk={pk}")]
    NotFound { table: String, pk: i64 },

    /// The store broke one of its own invariants (e.g. a duplicated pk).
    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("{table} has no field `{field}`")]
    UnknownField { table: String, field: String },

    #[error("field `{field}` expects {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("cannot decode {table}.{field}: {reason}")]
    Decode {
        table: String,
        field: String,
        reason: String,
    },

    #[error("invalid schema for {table}: {reason}")]
    Schema { table: String, reason: String },

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Operations every storage back-end provides for a record type.
pub(crate) trait Repository<T: Record> {
    /// Store a new record, write the assigned pk into it and return it.
    /// Fails with [`RepoError::InvalidState`] if the record already has a pk.
    fn add(&mut self, record: &mut T) -> Result<i64, RepoError>;

    /// `Ok(None)` when nothing has that pk.
    fn get(&self, pk: i64) -> Result<Option<T>, RepoError>;

    /// Every record matching all of `filter`, in insertion order.
    /// `None` returns everything.
    fn get_all(&self, filter: Option<&Filter>) -> Result<Vec<T>, RepoError>;

    /// Every record whose fields contain the given substrings.
    fn get_all_by_pattern(&self, patterns: &Patterns) -> Result<Vec<T>, RepoError>;

    /// Replace all fields of the stored record with the same pk.
    fn update(&mut self, record: &T) -> Result<(), RepoError>;

    fn delete(&mut self, pk: i64) -> Result<(), RepoError>;
}

fn ensure_new<T: Record>(table: &str, record: &T) -> Result<(), RepoError> {
    if record.pk() != 0 {
        return Err(RepoError::InvalidState(format!(
            "cannot add {table} with pk={} already set",
            record.pk()
        )));
    }
    Ok(())
}

fn ensure_stored<T: Record>(table: &str, record: &T) -> Result<(), RepoError> {
    if record.pk() <= 0 {
        return Err(RepoError::InvalidState(format!(
            "cannot update {table} without a pk"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
