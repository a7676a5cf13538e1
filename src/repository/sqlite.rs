use rusqlite::{params, params_from_iter, types::Value as SqlValue, Connection, ToSql};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::record::{Filter, Patterns, Record, Schema, Value};
use super::{ensure_new, ensure_stored, RepoError, Repository};

/// Statements generated once from the record's field table.
#[derive(Debug)]
struct Queries {
    create: String,
    insert: String,
    select: String,
    select_one: String,
    update: String,
    delete: String,
}

impl Queries {
    fn build(schema: &Schema) -> Self {
        let table = schema.table();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name).collect();
        let columns = names.join(", ");
        let placeholders = (1..=names.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let assignments = names
            .iter()
            .enumerate()
            .map(|(i, name)| format!("{name} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let definitions = schema
            .fields()
            .iter()
            .map(|f| format!("{} {}", f.name, f.kind.sql_type()))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            create: format!(
                "CREATE TABLE IF NOT EXISTS {table} (pk INTEGER PRIMARY KEY AUTOINCREMENT, {definitions})"
            ),
            insert: format!("INSERT INTO {table} ({columns}) VALUES ({placeholders})"),
            select: format!("SELECT pk, {columns} FROM {table}"),
            select_one: format!("SELECT pk, {columns} FROM {table} WHERE pk = ?1"),
            update: format!(
                "UPDATE {table} SET {assignments} WHERE pk = ?{}",
                names.len() + 1
            ),
            delete: format!("DELETE FROM {table} WHERE pk = ?1"),
        }
    }
}

/// Repository over one table of a SQLite file.
///
/// Every operation opens its own connection and drops it before returning,
/// so nothing (including an open transaction) leaks between calls.
pub(crate) struct SqliteRepository<T: Record> {
    path: PathBuf,
    schema: Schema,
    queries: Queries,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> SqliteRepository<T> {
    /// Validate `T`'s fields and create its table if it does not exist yet.
    pub(crate) fn open(path: impl Into<PathBuf>) -> Result<Self, RepoError> {
        let schema = Schema::of::<T>()?;
        let queries = Queries::build(&schema);
        let repo = Self {
            path: path.into(),
            schema,
            queries,
            _record: PhantomData,
        };

        let conn = repo.connect()?;
        debug!(sql = %repo.queries.create, "creating table");
        conn.execute_batch(&repo.queries.create)?;
        Ok(repo)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, RepoError> {
        Ok(Connection::open(&self.path)?)
    }

    fn fetch<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<T>, RepoError> {
        debug!(sql, "query");
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let width = self.schema.fields().len();
        let rows = stmt.query_map(params, |row| {
            let pk: i64 = row.get(0)?;
            let raw = (1..=width)
                .map(|i| row.get::<_, SqlValue>(i))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok((pk, raw))
        })?;
        let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(pk, raw)| {
                let values = self
                    .schema
                    .fields()
                    .iter()
                    .zip(raw)
                    .map(|(field, v)| Value::from_stored(self.schema.table(), field, v))
                    .collect::<Result<Vec<_>, _>>()?;
                self.schema.hydrate(pk, values)
            })
            .collect()
    }

    fn execute<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<usize, RepoError> {
        debug!(sql, "execute");
        let conn = self.connect()?;
        Ok(conn.execute(sql, params)?)
    }

    fn not_found(&self, pk: i64) -> RepoError {
        RepoError::NotFound {
            table: self.schema.table().to_string(),
            pk,
        }
    }
}

impl<T: Record> Repository<T> for SqliteRepository<T> {
    fn add(&mut self, record: &mut T) -> Result<i64, RepoError> {
        ensure_new(self.schema.table(), record)?;
        let values = record.values();
        self.schema.check_values(&values)?;

        debug!(sql = %self.queries.insert, "insert");
        let conn = self.connect()?;
        conn.execute(&self.queries.insert, params_from_iter(values.iter()))?;
        let pk = conn.last_insert_rowid();

        record.set_pk(pk);
        Ok(pk)
    }

    fn get(&self, pk: i64) -> Result<Option<T>, RepoError> {
        let mut rows = self.fetch(&self.queries.select_one, params![pk])?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(RepoError::Integrity(format!(
                "{n} rows of {} share pk={pk}",
                self.schema.table()
            ))),
        }
    }

    fn get_all(&self, filter: Option<&Filter>) -> Result<Vec<T>, RepoError> {
        let Some(filter) = filter.filter(|f| !f.conditions().is_empty()) else {
            let sql = format!("{} ORDER BY pk", self.queries.select);
            return self.fetch(&sql, []);
        };
        self.schema.check_filter(filter)?;

        let clause = filter
            .conditions()
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("{name} IS ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!("{} WHERE {clause} ORDER BY pk", self.queries.select);

        let values: Vec<&dyn ToSql> = filter
            .conditions()
            .iter()
            .map(|(_, v)| v as &dyn ToSql)
            .collect();
        self.fetch(&sql, values.as_slice())
    }

    fn get_all_by_pattern(&self, patterns: &Patterns) -> Result<Vec<T>, RepoError> {
        if patterns.conditions().is_empty() {
            return self.get_all(None);
        }
        self.schema.check_patterns(patterns)?;

        // instr() is case-sensitive and treats `%`/`_` literally, unlike LIKE.
        let clause = patterns
            .conditions()
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("instr({name}, ?{}) > 0", i + 1))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!("{} WHERE {clause} ORDER BY pk", self.queries.select);

        self.fetch(
            &sql,
            params_from_iter(patterns.conditions().iter().map(|(_, needle)| needle)),
        )
    }

    fn update(&mut self, record: &T) -> Result<(), RepoError> {
        ensure_stored(self.schema.table(), record)?;
        let mut values = record.values();
        self.schema.check_values(&values)?;
        values.push(Value::Integer(record.pk()));

        let changed = self.execute(&self.queries.update, params_from_iter(values.iter()))?;
        if changed == 0 {
            return Err(self.not_found(record.pk()));
        }
        Ok(())
    }

    fn delete(&mut self, pk: i64) -> Result<(), RepoError> {
        let changed = self.execute(&self.queries.delete, params![pk])?;
        if changed == 0 {
            return Err(self.not_found(pk));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
