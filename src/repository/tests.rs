#![allow(clippy::unwrap_used)]

use super::record::{parse_timestamp, Schema};
use super::*;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ── Test record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Sample {
    pub(crate) pk: i64,
    pub(crate) name: String,
    pub(crate) count: i64,
    pub(crate) price: Decimal,
    pub(crate) seen: NaiveDateTime,
    pub(crate) parent: Option<i64>,
}

impl Record for Sample {
    const NAME: &'static str = "Sample";

    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            Field::new("name", FieldKind::Text),
            Field::new("count", FieldKind::Integer),
            Field::new("price", FieldKind::Decimal),
            Field::new("seen", FieldKind::Timestamp),
            Field::nullable("parent", FieldKind::Integer),
        ];
        FIELDS
    }

    fn pk(&self) -> i64 {
        self.pk
    }

    fn set_pk(&mut self, pk: i64) {
        self.pk = pk;
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.count.into(),
            self.price.into(),
            self.seen.into(),
            self.parent.into(),
        ]
    }

    fn from_fields(mut fields: FieldValues) -> Result<Self, RepoError> {
        Ok(Self {
            pk: 0,
            name: fields.text("name")?,
            count: fields.integer("count")?,
            price: fields.decimal("price")?,
            seen: fields.timestamp("seen")?,
            parent: fields.optional_integer("parent")?,
        })
    }
}

pub(crate) fn at(date: &str, time: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M").unwrap()
}

pub(crate) fn sample(name: &str, count: i64) -> Sample {
    Sample {
        pk: 0,
        name: name.into(),
        count,
        price: dec!(9.99),
        seen: at("2023-02-26", "14:30"),
        parent: None,
    }
}

/// Run `check` against a file-backed and an in-memory repository.
fn for_each_backend(check: impl Fn(&mut dyn Repository<Sample>)) {
    let dir = tempfile::tempdir().unwrap();
    let backends = [
        Storage::File(dir.path().join("contract.db")),
        Storage::Memory,
    ];
    for storage in backends {
        let factory = RepositoryFactory::new(storage);
        let mut repo = factory.repository::<Sample>().unwrap();
        check(repo.as_mut());
    }
}

// ── add / get ─────────────────────────────────────────────────

#[test]
fn test_add_assigns_pk_and_roundtrips() {
    for_each_backend(|repo| {
        let mut s = sample("coffee", 3);
        s.parent = Some(7);
        s.price = dec!(-12.50);
        let pk = repo.add(&mut s).unwrap();

        assert!(pk > 0);
        assert_eq!(s.pk, pk);
        assert_eq!(repo.get(pk).unwrap(), Some(s));
    });
}

#[test]
fn test_subsecond_timestamp_roundtrips() {
    for_each_backend(|repo| {
        let mut s = sample("coffee", 1);
        s.seen = at("2023-02-26", "14:30") + chrono::Duration::nanoseconds(123_456_789);
        let pk = repo.add(&mut s).unwrap();

        assert_eq!(repo.get(pk).unwrap(), Some(s.clone()));
        let by_day = repo
            .get_all_by_pattern(&Patterns::new().contains("seen", "2023-02-26 14:30:00"))
            .unwrap();
        assert_eq!(by_day, vec![s]);
    });
}

#[test]
fn test_add_with_pk_is_invalid_state() {
    for_each_backend(|repo| {
        let mut s = sample("coffee", 1);
        s.pk = 42;
        let err = repo.add(&mut s).unwrap_err();
        assert!(matches!(err, RepoError::InvalidState(_)));
        assert!(repo.get_all(None).unwrap().is_empty());
    });
}

#[test]
fn test_add_same_record_twice_is_invalid_state() {
    for_each_backend(|repo| {
        let mut s = sample("coffee", 1);
        repo.add(&mut s).unwrap();
        assert!(matches!(
            repo.add(&mut s).unwrap_err(),
            RepoError::InvalidState(_)
        ));
    });
}

#[test]
fn test_pks_are_unique() {
    for_each_backend(|repo| {
        let mut pks = Vec::new();
        for i in 0..5 {
            pks.push(repo.add(&mut sample("x", i)).unwrap());
        }
        let mut deduped = pks.clone();
        deduped.dedup();
        assert_eq!(pks, deduped);
        assert!(pks.windows(2).all(|w| w[0] < w[1]));
    });
}

#[test]
fn test_get_missing_is_none() {
    for_each_backend(|repo| {
        assert!(repo.get(1).unwrap().is_none());
        repo.add(&mut sample("a", 1)).unwrap();
        assert!(repo.get(999).unwrap().is_none());
        assert!(repo.get(-1).unwrap().is_none());
    });
}

// ── update ────────────────────────────────────────────────────

#[test]
fn test_update_replaces_every_field() {
    for_each_backend(|repo| {
        let mut s = sample("coffee", 1);
        repo.add(&mut s).unwrap();

        s.name = "tea".into();
        s.count = 2;
        s.price = dec!(0.5);
        s.seen = at("2024-01-01", "08:00");
        s.parent = Some(3);
        repo.update(&s).unwrap();

        assert_eq!(repo.get(s.pk).unwrap(), Some(s.clone()));

        s.parent = None;
        repo.update(&s).unwrap();
        assert_eq!(repo.get(s.pk).unwrap().unwrap().parent, None);
    });
}

#[test]
fn test_update_missing_is_not_found() {
    for_each_backend(|repo| {
        let mut s = sample("coffee", 1);
        s.pk = 100;
        let err = repo.update(&s).unwrap_err();
        assert!(matches!(err, RepoError::NotFound { pk: 100, .. }));
    });
}

#[test]
fn test_update_without_pk_is_invalid_state() {
    for_each_backend(|repo| {
        let s = sample("coffee", 1);
        assert!(matches!(
            repo.update(&s).unwrap_err(),
            RepoError::InvalidState(_)
        ));
    });
}

// ── delete ────────────────────────────────────────────────────

#[test]
fn test_delete_then_get_is_none() {
    for_each_backend(|repo| {
        let mut a = sample("a", 1);
        let mut b = sample("b", 2);
        repo.add(&mut a).unwrap();
        repo.add(&mut b).unwrap();

        repo.delete(a.pk).unwrap();
        assert!(repo.get(a.pk).unwrap().is_none());
        assert_eq!(repo.get(b.pk).unwrap(), Some(b));
    });
}

#[test]
fn test_delete_twice_is_not_found() {
    for_each_backend(|repo| {
        let mut s = sample("a", 1);
        let pk = repo.add(&mut s).unwrap();
        repo.delete(pk).unwrap();
        assert!(matches!(
            repo.delete(pk).unwrap_err(),
            RepoError::NotFound { .. }
        ));
    });
}

#[test]
fn test_deleted_pk_not_reused() {
    for_each_backend(|repo| {
        let first = repo.add(&mut sample("a", 1)).unwrap();
        let second = repo.add(&mut sample("b", 1)).unwrap();
        repo.delete(second).unwrap();
        let third = repo.add(&mut sample("c", 1)).unwrap();
        assert!(third > second);
        assert!(second > first);
    });
}

// ── get_all ───────────────────────────────────────────────────

#[test]
fn test_get_all_without_filter_in_insertion_order() {
    for_each_backend(|repo| {
        for name in ["c", "a", "b"] {
            repo.add(&mut sample(name, 1)).unwrap();
        }
        let names: Vec<String> = repo
            .get_all(None)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["c", "a", "b"]);
    });
}

#[test]
fn test_get_all_filter_is_conjunction() {
    for_each_backend(|repo| {
        repo.add(&mut sample("a", 1)).unwrap();
        repo.add(&mut sample("a", 2)).unwrap();
        repo.add(&mut sample("b", 1)).unwrap();
        repo.add(&mut sample("a", 1)).unwrap();

        let only_name = repo.get_all(Some(&Filter::new().eq("name", "a"))).unwrap();
        assert_eq!(only_name.len(), 3);

        let both = repo
            .get_all(Some(&Filter::new().eq("name", "a").eq("count", 1)))
            .unwrap();
        assert_eq!(both.len(), 2);
        assert!(both.iter().all(|s| s.name == "a" && s.count == 1));
        assert!(both[0].pk < both[1].pk);

        let none = repo.get_all(Some(&Filter::new().eq("name", "zzz"))).unwrap();
        assert!(none.is_empty());
    });
}

#[test]
fn test_get_all_filter_on_null() {
    for_each_backend(|repo| {
        let mut child = sample("child", 1);
        child.parent = Some(1);
        repo.add(&mut sample("root", 1)).unwrap();
        repo.add(&mut child).unwrap();

        let roots = repo
            .get_all(Some(&Filter::new().eq("parent", None::<i64>)))
            .unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name, "root");

        let children = repo
            .get_all(Some(&Filter::new().eq("parent", 1)))
            .unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "child");
    });
}

#[test]
fn test_get_all_filter_on_timestamp_and_decimal() {
    for_each_backend(|repo| {
        let mut other = sample("b", 1);
        other.seen = at("2023-03-01", "09:00");
        other.price = dec!(1.25);
        repo.add(&mut sample("a", 1)).unwrap();
        repo.add(&mut other).unwrap();

        let by_time = repo
            .get_all(Some(&Filter::new().eq("seen", at("2023-03-01", "09:00"))))
            .unwrap();
        assert_eq!(by_time.len(), 1);
        assert_eq!(by_time[0].name, "b");

        let by_price = repo
            .get_all(Some(&Filter::new().eq("price", dec!(9.99))))
            .unwrap();
        assert_eq!(by_price.len(), 1);
        assert_eq!(by_price[0].name, "a");
    });
}

#[test]
fn test_get_all_repeated_field_keeps_last() {
    for_each_backend(|repo| {
        repo.add(&mut sample("a", 1)).unwrap();
        repo.add(&mut sample("b", 1)).unwrap();
        let filter = Filter::new().eq("name", "a").eq("name", "b");
        let found = repo.get_all(Some(&filter)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "b");
    });
}

#[test]
fn test_get_all_unknown_field() {
    for_each_backend(|repo| {
        let err = repo
            .get_all(Some(&Filter::new().eq("colour", "red")))
            .unwrap_err();
        assert!(matches!(err, RepoError::UnknownField { .. }));
    });
}

#[test]
fn test_get_all_type_mismatch() {
    for_each_backend(|repo| {
        let err = repo
            .get_all(Some(&Filter::new().eq("count", "one")))
            .unwrap_err();
        assert!(matches!(err, RepoError::TypeMismatch { .. }));
        assert_eq!(err.to_string(), "field `count` expects integer, got text `one`");

        // NULL only fits nullable fields
        let err = repo
            .get_all(Some(&Filter::new().eq("name", None::<i64>)))
            .unwrap_err();
        assert!(matches!(err, RepoError::TypeMismatch { .. }));
        assert_eq!(err.to_string(), "field `name` expects text, got NULL");
    });
}

// ── get_all_by_pattern ────────────────────────────────────────

#[test]
fn test_pattern_on_timestamp_prefix() {
    for_each_backend(|repo| {
        let mut feb = sample("feb", 1);
        feb.seen = at("2023-02-26", "14:30");
        let mut feb_early = sample("feb-early", 1);
        feb_early.seen = at("2023-02-01", "00:00");
        let mut mar = sample("mar", 1);
        mar.seen = at("2023-03-02", "10:00");
        for s in [&mut feb, &mut feb_early, &mut mar] {
            repo.add(s).unwrap();
        }

        let day = repo
            .get_all_by_pattern(&Patterns::new().contains("seen", "2023-02-26"))
            .unwrap();
        assert_eq!(day, vec![feb.clone()]);

        let month = repo
            .get_all_by_pattern(&Patterns::new().contains("seen", "2023-02-"))
            .unwrap();
        assert_eq!(month.len(), 2);

        let april = repo
            .get_all_by_pattern(&Patterns::new().contains("seen", "2023-04"))
            .unwrap();
        assert!(april.is_empty());
    });
}

#[test]
fn test_pattern_is_case_sensitive_substring() {
    for_each_backend(|repo| {
        for name in ["abc", "xabcx", "ABC", "ab", "abcabc"] {
            repo.add(&mut sample(name, 1)).unwrap();
        }
        let names: Vec<String> = repo
            .get_all_by_pattern(&Patterns::new().contains("name", "abc"))
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["abc", "xabcx", "abcabc"]);
    });
}

#[test]
fn test_pattern_wildcards_are_literal() {
    for_each_backend(|repo| {
        repo.add(&mut sample("50% off", 1)).unwrap();
        repo.add(&mut sample("500 off", 1)).unwrap();
        repo.add(&mut sample("a_b", 1)).unwrap();
        repo.add(&mut sample("axb", 1)).unwrap();

        let percent = repo
            .get_all_by_pattern(&Patterns::new().contains("name", "0%"))
            .unwrap();
        assert_eq!(percent.len(), 1);
        assert_eq!(percent[0].name, "50% off");

        let underscore = repo
            .get_all_by_pattern(&Patterns::new().contains("name", "_"))
            .unwrap();
        assert_eq!(underscore.len(), 1);
        assert_eq!(underscore[0].name, "a_b");
    });
}

#[test]
fn test_pattern_on_integer_and_decimal_text() {
    for_each_backend(|repo| {
        let mut cheap = sample("cheap", 120);
        cheap.price = dec!(0.75);
        repo.add(&mut cheap).unwrap();
        repo.add(&mut sample("other", 7)).unwrap();

        let by_count = repo
            .get_all_by_pattern(&Patterns::new().contains("count", "12"))
            .unwrap();
        assert_eq!(by_count.len(), 1);
        assert_eq!(by_count[0].name, "cheap");

        let by_price = repo
            .get_all_by_pattern(&Patterns::new().contains("price", ".75"))
            .unwrap();
        assert_eq!(by_price.len(), 1);
    });
}

#[test]
fn test_pattern_conjunction_and_null() {
    for_each_backend(|repo| {
        let mut linked = sample("coffee beans", 1);
        linked.parent = Some(10);
        repo.add(&mut linked).unwrap();
        repo.add(&mut sample("coffee cup", 1)).unwrap();

        let both = repo
            .get_all_by_pattern(
                &Patterns::new()
                    .contains("name", "coffee")
                    .contains("parent", "1"),
            )
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].name, "coffee beans");

        // NULL has no textual form, not even the empty one
        let any_parent = repo
            .get_all_by_pattern(&Patterns::new().contains("parent", ""))
            .unwrap();
        assert_eq!(any_parent.len(), 1);
    });
}

#[test]
fn test_pattern_unknown_field() {
    for_each_backend(|repo| {
        let err = repo
            .get_all_by_pattern(&Patterns::new().contains("nope", "x"))
            .unwrap_err();
        assert!(matches!(err, RepoError::UnknownField { .. }));
    });
}

// ── Schema ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct BadColumn;

impl Record for BadColumn {
    const NAME: &'static str = "BadColumn";

    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[Field::new("name; DROP TABLE x", FieldKind::Text)];
        FIELDS
    }

    fn pk(&self) -> i64 {
        0
    }

    fn set_pk(&mut self, _pk: i64) {}

    fn values(&self) -> Vec<Value> {
        vec![Value::Null]
    }

    fn from_fields(_fields: FieldValues) -> Result<Self, RepoError> {
        Ok(Self)
    }
}

#[derive(Debug, Clone)]
struct DeclaresPk;

impl Record for DeclaresPk {
    const NAME: &'static str = "DeclaresPk";

    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[Field::new("pk", FieldKind::Integer)];
        FIELDS
    }

    fn pk(&self) -> i64 {
        0
    }

    fn set_pk(&mut self, _pk: i64) {}

    fn values(&self) -> Vec<Value> {
        vec![Value::Integer(0)]
    }

    fn from_fields(_fields: FieldValues) -> Result<Self, RepoError> {
        Ok(Self)
    }
}

#[test]
fn test_schema_table_name_is_lowercase() {
    let schema = Schema::of::<Sample>().unwrap();
    assert_eq!(schema.table(), "sample");
    assert_eq!(schema.fields().len(), 5);
    assert_eq!(schema.index_of("price").unwrap(), 2);
}

#[test]
fn test_schema_rejects_bad_identifiers() {
    assert!(matches!(
        Schema::of::<BadColumn>().unwrap_err(),
        RepoError::Schema { .. }
    ));
    assert!(matches!(
        RepositoryFactory::new(Storage::Memory)
            .repository::<BadColumn>()
            .err(),
        Some(RepoError::Schema { .. })
    ));
}

#[test]
fn test_schema_rejects_pk_field() {
    assert!(matches!(
        Schema::of::<DeclaresPk>().unwrap_err(),
        RepoError::Schema { .. }
    ));
}

#[test]
fn test_schema_check_values_counts_and_kinds() {
    let schema = Schema::of::<Sample>().unwrap();
    assert!(schema.check_values(&sample("a", 1).values()).is_ok());
    assert!(matches!(
        schema.check_values(&[Value::Null]).unwrap_err(),
        RepoError::Schema { .. }
    ));

    let mut values = sample("a", 1).values();
    values[1] = Value::Text("one".into());
    assert!(matches!(
        schema.check_values(&values).unwrap_err(),
        RepoError::TypeMismatch { .. }
    ));
}

// ── Value ─────────────────────────────────────────────────────

#[test]
fn test_value_text_forms() {
    assert_eq!(Value::Integer(-5).text_form().as_deref(), Some("-5"));
    assert_eq!(Value::Decimal(dec!(1.50)).text_form().as_deref(), Some("1.50"));
    assert_eq!(
        Value::Timestamp(at("2023-02-26", "14:30")).text_form().as_deref(),
        Some("2023-02-26 14:30:00")
    );
    assert_eq!(Value::Null.text_form(), None);
    assert_eq!(Value::Null.to_string(), "NULL");
}

#[test]
fn test_timestamp_format_roundtrip() {
    let ts = NaiveDate::from_ymd_opt(2023, 12, 31)
        .unwrap()
        .and_hms_opt(23, 59, 58)
        .unwrap();
    assert_eq!(parse_timestamp(&format_timestamp(&ts)), Some(ts));
    assert_eq!(parse_timestamp("2023-12-31"), None);

    let fine = ts + chrono::Duration::microseconds(250);
    assert_eq!(format_timestamp(&fine), "2023-12-31 23:59:58.000250");
    assert_eq!(parse_timestamp(&format_timestamp(&fine)), Some(fine));
}

#[test]
fn test_from_stored_rejects_wrong_shapes() {
    use rusqlite::types::Value as SqlValue;

    let count = Field::new("count", FieldKind::Integer);
    assert!(Value::from_stored("t", &count, SqlValue::Text("x".into())).is_err());
    assert!(Value::from_stored("t", &count, SqlValue::Null).is_err());

    let parent = Field::nullable("parent", FieldKind::Integer);
    assert_eq!(
        Value::from_stored("t", &parent, SqlValue::Null).unwrap(),
        Value::Null
    );

    let seen = Field::new("seen", FieldKind::Timestamp);
    assert!(Value::from_stored("t", &seen, SqlValue::Text("yesterday".into())).is_err());

    let price = Field::new("price", FieldKind::Decimal);
    assert_eq!(
        Value::from_stored("t", &price, SqlValue::Integer(3)).unwrap(),
        Value::Decimal(dec!(3))
    );
}
