use std::collections::BTreeMap;
use tracing::debug;

use super::record::{Filter, Patterns, Record, Schema};
use super::{ensure_new, ensure_stored, RepoError, Repository};

/// Ephemeral repository with the same contract as the SQLite one.
///
/// Keys start at 1 and are never reused, like `AUTOINCREMENT`. Comparisons
/// go through [`Value::text_form`](super::Value::text_form) so filters and
/// patterns see exactly what the SQL store would.
#[derive(Debug)]
pub(crate) struct MemoryRepository<T: Record> {
    schema: Schema,
    rows: BTreeMap<i64, T>,
    last_pk: i64,
}

impl<T: Record> MemoryRepository<T> {
    pub(crate) fn new() -> Result<Self, RepoError> {
        let schema = Schema::of::<T>()?;
        debug!(table = schema.table(), "in-memory repository");
        Ok(Self {
            schema,
            rows: BTreeMap::new(),
            last_pk: 0,
        })
    }

    fn collect<F>(&self, mut keep: F) -> Vec<T>
    where
        F: FnMut(&T) -> bool,
    {
        self.rows.values().filter(|r| keep(r)).cloned().collect()
    }

    fn not_found(&self, pk: i64) -> RepoError {
        RepoError::NotFound {
            table: self.schema.table().to_string(),
            pk,
        }
    }
}

impl<T: Record> Repository<T> for MemoryRepository<T> {
    fn add(&mut self, record: &mut T) -> Result<i64, RepoError> {
        ensure_new(self.schema.table(), record)?;
        self.schema.check_values(&record.values())?;

        self.last_pk += 1;
        let pk = self.last_pk;
        record.set_pk(pk);
        self.rows.insert(pk, record.clone());
        Ok(pk)
    }

    fn get(&self, pk: i64) -> Result<Option<T>, RepoError> {
        Ok(self.rows.get(&pk).cloned())
    }

    fn get_all(&self, filter: Option<&Filter>) -> Result<Vec<T>, RepoError> {
        let Some(filter) = filter else {
            return Ok(self.rows.values().cloned().collect());
        };
        self.schema.check_filter(filter)?;

        let wanted = filter
            .conditions()
            .iter()
            .map(|(name, value)| Ok((self.schema.index_of(name)?, value)))
            .collect::<Result<Vec<_>, RepoError>>()?;

        Ok(self.collect(|record| {
            let values = record.values();
            wanted
                .iter()
                .all(|(idx, value)| values[*idx].stored_eq(value))
        }))
    }

    fn get_all_by_pattern(&self, patterns: &Patterns) -> Result<Vec<T>, RepoError> {
        self.schema.check_patterns(patterns)?;

        let wanted = patterns
            .conditions()
            .iter()
            .map(|(name, needle)| Ok((self.schema.index_of(name)?, needle.as_str())))
            .collect::<Result<Vec<_>, RepoError>>()?;

        Ok(self.collect(|record| {
            let values = record.values();
            wanted.iter().all(|(idx, needle)| {
                values[*idx]
                    .text_form()
                    .is_some_and(|text| text.contains(needle))
            })
        }))
    }

    fn update(&mut self, record: &T) -> Result<(), RepoError> {
        ensure_stored(self.schema.table(), record)?;
        self.schema.check_values(&record.values())?;

        let pk = record.pk();
        match self.rows.get_mut(&pk) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(self.not_found(pk)),
        }
    }

    fn delete(&mut self, pk: i64) -> Result<(), RepoError> {
        match self.rows.remove(&pk) {
            Some(_) => Ok(()),
            None => Err(self.not_found(pk)),
        }
    }
}
