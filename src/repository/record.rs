use chrono::NaiveDateTime;
use regex::Regex;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use super::RepoError;

/// Fixed text layout for timestamp fields. Lexically sortable, so a
/// `"YYYY-MM-"` prefix matches every day of that month. Fractional seconds
/// are written only when present.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()
}

/// Semantic type of a stored field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Integer,
    Text,
    Decimal,
    Timestamp,
}

impl FieldKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Text => "text",
            Self::Decimal => "decimal",
            Self::Timestamp => "timestamp",
        }
    }

    /// Column type used in generated `CREATE TABLE` statements.
    pub(crate) fn sql_type(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Text | Self::Decimal | Self::Timestamp => "TEXT",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Field {
    pub(crate) name: &'static str,
    pub(crate) kind: FieldKind,
    pub(crate) nullable: bool,
}

impl Field {
    pub(crate) const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    pub(crate) const fn nullable(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
        }
    }
}

/// A single field value as it crosses the repository boundary.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Null,
    Integer(i64),
    Text(String),
    Decimal(Decimal),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub(crate) fn kind(&self) -> Option<FieldKind> {
        match self {
            Self::Null => None,
            Self::Integer(_) => Some(FieldKind::Integer),
            Self::Text(_) => Some(FieldKind::Text),
            Self::Decimal(_) => Some(FieldKind::Decimal),
            Self::Timestamp(_) => Some(FieldKind::Timestamp),
        }
    }

    pub(crate) fn fits(&self, field: &Field) -> bool {
        match self.kind() {
            None => field.nullable,
            Some(kind) => kind == field.kind,
        }
    }

    /// The textual form a value has once stored, which is what pattern
    /// queries match against. NULL has no textual form.
    pub(crate) fn text_form(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Integer(i) => Some(i.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Decimal(d) => Some(d.to_string()),
            Self::Timestamp(ts) => Some(format_timestamp(ts)),
        }
    }

    /// Equality as the SQL store sees it (`IS` on the stored forms).
    pub(crate) fn stored_eq(&self, other: &Value) -> bool {
        self.text_form() == other.text_form()
    }

    /// Rebuild a value read back from SQLite according to its declared field.
    pub(crate) fn from_stored(table: &str, field: &Field, raw: SqlValue) -> Result<Self, RepoError> {
        let decode_err = |reason: String| RepoError::Decode {
            table: table.to_string(),
            field: field.name.to_string(),
            reason,
        };

        match (field.kind, raw) {
            (_, SqlValue::Null) if field.nullable => Ok(Self::Null),
            (_, SqlValue::Null) => Err(decode_err("unexpected NULL".into())),
            (FieldKind::Integer, SqlValue::Integer(i)) => Ok(Self::Integer(i)),
            (FieldKind::Text, SqlValue::Text(s)) => Ok(Self::Text(s)),
            (FieldKind::Decimal, SqlValue::Text(s)) => Decimal::from_str(&s)
                .map(Self::Decimal)
                .map_err(|e| decode_err(format!("'{s}' is not a decimal: {e}"))),
            (FieldKind::Decimal, SqlValue::Integer(i)) => Ok(Self::Decimal(Decimal::from(i))),
            (FieldKind::Timestamp, SqlValue::Text(s)) => parse_timestamp(&s)
                .map(Self::Timestamp)
                .ok_or_else(|| decode_err(format!("'{s}' is not a timestamp"))),
            (kind, other) => Err(decode_err(format!(
                "expected {kind}, found {:?}",
                other.data_type()
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text_form() {
            Some(s) => write!(f, "{s}"),
            None => write!(f, "NULL"),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(SqlValue::Null),
            Self::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Decimal(d) => ToSqlOutput::Owned(SqlValue::Text(d.to_string())),
            Self::Timestamp(ts) => ToSqlOutput::Owned(SqlValue::Text(format_timestamp(ts))),
        })
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<Option<i64>> for Value {
    fn from(v: Option<i64>) -> Self {
        v.map_or(Self::Null, Self::Integer)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

/// Any entity a repository can store.
///
/// `fields()` is the static field table (without `pk`). Repositories read it
/// once when they are built and reuse it for every statement. `values()` must
/// return one value per field in the same order, and `from_fields` is the
/// named-field constructor used when hydrating rows.
pub(crate) trait Record: Clone + fmt::Debug {
    /// Type name; the table is named after it in lowercase.
    const NAME: &'static str;

    fn fields() -> &'static [Field];

    /// `0` until the record has been stored.
    fn pk(&self) -> i64;

    fn set_pk(&mut self, pk: i64);

    fn values(&self) -> Vec<Value>;

    fn from_fields(fields: FieldValues) -> Result<Self, RepoError>;
}

/// Named field values handed to [`Record::from_fields`].
#[derive(Debug)]
pub(crate) struct FieldValues {
    table: String,
    values: Vec<(&'static str, Value)>,
}

impl FieldValues {
    pub(crate) fn new(table: &str, fields: &[Field], values: Vec<Value>) -> Self {
        Self {
            table: table.to_string(),
            values: fields.iter().map(|f| f.name).zip(values).collect(),
        }
    }

    fn take(&mut self, name: &str) -> Result<Value, RepoError> {
        let idx = self
            .values
            .iter()
            .position(|(n, _)| *n == name)
            .ok_or_else(|| self.error(name, "missing value"))?;
        Ok(self.values.swap_remove(idx).1)
    }

    fn error(&self, name: &str, reason: &str) -> RepoError {
        RepoError::Decode {
            table: self.table.clone(),
            field: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn integer(&mut self, name: &str) -> Result<i64, RepoError> {
        match self.take(name)? {
            Value::Integer(i) => Ok(i),
            _ => Err(self.error(name, "expected integer")),
        }
    }

    pub(crate) fn optional_integer(&mut self, name: &str) -> Result<Option<i64>, RepoError> {
        match self.take(name)? {
            Value::Integer(i) => Ok(Some(i)),
            Value::Null => Ok(None),
            _ => Err(self.error(name, "expected integer or NULL")),
        }
    }

    pub(crate) fn text(&mut self, name: &str) -> Result<String, RepoError> {
        match self.take(name)? {
            Value::Text(s) => Ok(s),
            _ => Err(self.error(name, "expected text")),
        }
    }

    pub(crate) fn decimal(&mut self, name: &str) -> Result<Decimal, RepoError> {
        match self.take(name)? {
            Value::Decimal(d) => Ok(d),
            _ => Err(self.error(name, "expected decimal")),
        }
    }

    pub(crate) fn timestamp(&mut self, name: &str) -> Result<NaiveDateTime, RepoError> {
        match self.take(name)? {
            Value::Timestamp(ts) => Ok(ts),
            _ => Err(self.error(name, "expected timestamp")),
        }
    }
}

/// Exact-match filter: field name to required value, all must hold.
#[derive(Debug, Clone, Default)]
pub(crate) struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`. A repeated field replaces the
    /// earlier condition.
    pub(crate) fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.retain(|(name, _)| name != field);
        self.conditions.push((field.to_string(), value.into()));
        self
    }

    pub(crate) fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }
}

/// Substring filter: field name to text that must appear in the field's
/// stored textual form. Case-sensitive; all must hold.
#[derive(Debug, Clone, Default)]
pub(crate) struct Patterns {
    conditions: Vec<(String, String)>,
}

impl Patterns {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn contains(mut self, field: &str, needle: impl Into<String>) -> Self {
        self.conditions.retain(|(name, _)| name != field);
        self.conditions.push((field.to_string(), needle.into()));
        self
    }

    pub(crate) fn conditions(&self) -> &[(String, String)] {
        &self.conditions
    }
}

/// A record type's field contract, validated once per repository.
#[derive(Debug, Clone)]
pub(crate) struct Schema {
    table: String,
    fields: &'static [Field],
}

impl Schema {
    pub(crate) fn of<T: Record>() -> Result<Self, RepoError> {
        let table = T::NAME.to_lowercase();
        let schema_err = |reason: String| RepoError::Schema {
            table: table.clone(),
            reason,
        };

        let ident = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .map_err(|e| schema_err(format!("identifier pattern: {e}")))?;

        if !ident.is_match(&table) {
            return Err(schema_err("type name is not a valid table name".into()));
        }

        let fields = T::fields();
        if fields.is_empty() {
            return Err(schema_err("record declares no fields".into()));
        }

        for (i, field) in fields.iter().enumerate() {
            if !ident.is_match(field.name) {
                return Err(schema_err(format!("`{}` is not a valid column name", field.name)));
            }
            if field.name.eq_ignore_ascii_case("pk") {
                return Err(schema_err("`pk` is managed by the store".into()));
            }
            if fields[..i]
                .iter()
                .any(|f| f.name.eq_ignore_ascii_case(field.name))
            {
                return Err(schema_err(format!("field `{}` declared twice", field.name)));
            }
        }

        Ok(Self { table, fields })
    }

    pub(crate) fn table(&self) -> &str {
        &self.table
    }

    pub(crate) fn fields(&self) -> &'static [Field] {
        self.fields
    }

    pub(crate) fn index_of(&self, name: &str) -> Result<usize, RepoError> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| RepoError::UnknownField {
                table: self.table.clone(),
                field: name.to_string(),
            })
    }

    fn check_value(&self, field: &Field, value: &Value) -> Result<(), RepoError> {
        if value.fits(field) {
            return Ok(());
        }
        Err(RepoError::TypeMismatch {
            field: field.name.to_string(),
            expected: field.kind.to_string(),
            got: match value.kind() {
                Some(kind) => format!("{kind} `{value}`"),
                None => value.to_string(),
            },
        })
    }

    /// Values produced by a record must line up with its field table.
    pub(crate) fn check_values(&self, values: &[Value]) -> Result<(), RepoError> {
        if values.len() != self.fields.len() {
            return Err(RepoError::Schema {
                table: self.table.clone(),
                reason: format!(
                    "record produced {} values for {} fields",
                    values.len(),
                    self.fields.len()
                ),
            });
        }
        for (field, value) in self.fields.iter().zip(values) {
            self.check_value(field, value)?;
        }
        Ok(())
    }

    pub(crate) fn check_filter(&self, filter: &Filter) -> Result<(), RepoError> {
        for (name, value) in filter.conditions() {
            let field = &self.fields[self.index_of(name)?];
            self.check_value(field, value)?;
        }
        Ok(())
    }

    pub(crate) fn check_patterns(&self, patterns: &Patterns) -> Result<(), RepoError> {
        for (name, _) in patterns.conditions() {
            self.index_of(name)?;
        }
        Ok(())
    }

    pub(crate) fn hydrate<T: Record>(&self, pk: i64, values: Vec<Value>) -> Result<T, RepoError> {
        let mut record = T::from_fields(FieldValues::new(&self.table, self.fields, values))?;
        record.set_pk(pk);
        Ok(record)
    }
}
