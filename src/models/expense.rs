use chrono::{NaiveDateTime, SubsecRound};

use crate::repository::{Field, FieldKind, FieldValues, Record, RepoError, Value};

/// A single purchase, linked to a category by pk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Expense {
    pub(crate) pk: i64,
    pub(crate) amount: i64,
    pub(crate) category: i64,
    pub(crate) expense_date: NaiveDateTime,
    pub(crate) added_date: NaiveDateTime,
    pub(crate) comment: String,
}

impl Expense {
    /// New expense dated now, to the whole second.
    pub(crate) fn new(amount: i64, category: i64) -> Self {
        let now = now();
        Self {
            pk: 0,
            amount,
            category,
            expense_date: now,
            added_date: now,
            comment: String::new(),
        }
    }

    pub(crate) fn with_date(mut self, expense_date: NaiveDateTime) -> Self {
        self.expense_date = expense_date.trunc_subsecs(0);
        self
    }

    pub(crate) fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local().trunc_subsecs(0)
}

impl Record for Expense {
    const NAME: &'static str = "Expense";

    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            Field::new("amount", FieldKind::Integer),
            Field::new("category", FieldKind::Integer),
            Field::new("expense_date", FieldKind::Timestamp),
            Field::new("added_date", FieldKind::Timestamp),
            Field::new("comment", FieldKind::Text),
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
            self.amount.into(),
            self.category.into(),
            self.expense_date.into(),
            self.added_date.into(),
            self.comment.clone().into(),
        ]
    }

    fn from_fields(mut fields: FieldValues) -> Result<Self, RepoError> {
        Ok(Self {
            pk: 0,
            amount: fields.integer("amount")?,
            category: fields.integer("category")?,
            expense_date: fields.timestamp("expense_date")?,
            added_date: fields.timestamp("added_date")?,
            comment: fields.text("comment")?,
        })
    }
}
