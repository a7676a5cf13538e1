use chrono::{NaiveDate, Weekday};

use crate::models::Expense;
use crate::repository::{
    Field, FieldKind, FieldValues, Patterns, Record, RepoError, Repository, Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" => Some(Self::Day),
            "week" | "weekly" => Some(Self::Week),
            "month" | "monthly" => Some(Self::Month),
            _ => None,
        }
    }

    pub(crate) fn all() -> &'static [Period] {
        &[Self::Day, Self::Week, Self::Month]
    }

    /// Prefixes of stored `expense_date` text that fall inside the period
    /// containing `today`. Weeks run Monday to Sunday.
    pub(crate) fn date_prefixes(&self, today: NaiveDate) -> Vec<String> {
        match self {
            Self::Day => vec![today.format("%Y-%m-%d").to_string()],
            Self::Week => today
                .week(Weekday::Mon)
                .first_day()
                .iter_days()
                .take(7)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect(),
            Self::Month => vec![today.format("%Y-%m-").to_string()],
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Spending ceiling for a period. `spent` is derived from expenses and
/// recomputed by [`Budget::update_spent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Budget {
    pub(crate) pk: i64,
    pub(crate) limitation: i64,
    pub(crate) period: Period,
    pub(crate) spent: i64,
}

impl Budget {
    pub(crate) fn new(limitation: i64, period: Period) -> Self {
        Self {
            pk: 0,
            limitation,
            period,
            spent: 0,
        }
    }

    /// Recompute `spent` as the sum of expenses dated inside the period
    /// that contains `today`. The sum saturates at `i64::MAX`.
    pub(crate) fn update_spent(
        &mut self,
        expenses: &dyn Repository<Expense>,
        today: NaiveDate,
    ) -> Result<i64, RepoError> {
        let mut total: i64 = 0;
        for prefix in self.period.date_prefixes(today) {
            let found =
                expenses.get_all_by_pattern(&Patterns::new().contains("expense_date", prefix))?;
            total = found
                .iter()
                .fold(total, |acc, e| acc.saturating_add(e.amount));
        }
        self.spent = total;
        Ok(total)
    }

    pub(crate) fn is_over(&self) -> bool {
        self.spent > self.limitation
    }

    pub(crate) fn remaining(&self) -> i64 {
        self.limitation.saturating_sub(self.spent)
    }
}

impl Record for Budget {
    const NAME: &'static str = "Budget";

    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            Field::new("limitation", FieldKind::Integer),
            Field::new("period", FieldKind::Text),
            Field::new("spent", FieldKind::Integer),
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
            self.limitation.into(),
            self.period.as_str().into(),
            self.spent.into(),
        ]
    }

    fn from_fields(mut fields: FieldValues) -> Result<Self, RepoError> {
        let limitation = fields.integer("limitation")?;
        let period_text = fields.text("period")?;
        let period = Period::parse(&period_text).ok_or_else(|| RepoError::Decode {
            table: Self::NAME.to_lowercase(),
            field: "period".into(),
            reason: format!("unknown period '{period_text}'"),
        })?;
        Ok(Self {
            pk: 0,
            limitation,
            period,
            spent: fields.integer("spent")?,
        })
    }
}
