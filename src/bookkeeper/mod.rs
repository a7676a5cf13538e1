//! Domain rules on top of the three repositories.
//!
//! The [`Bookkeeper`] owns one repository per record type and a cache of
//! their contents. Every mutating call is followed by [`Bookkeeper::refresh`],
//! so the cache always reflects the store after a successful operation.

mod error;

pub(crate) use error::BookkeeperError;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::models::{Budget, Category, Expense, Period};
use crate::repository::{Filter, Patterns, Repository, RepositoryFactory, TIMESTAMP_FORMAT};

type Result<T> = std::result::Result<T, BookkeeperError>;

/// Accepted spellings for user-entered expense dates.
const DATE_TIME_FORMATS: &[&str] = &[
    TIMESTAMP_FORMAT,
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Last state read from the repositories.
#[derive(Debug, Default)]
struct Cache {
    categories: Vec<Category>,
    expenses: Vec<Expense>,
    budgets: Vec<Budget>,
}

/// Expense field that can be edited after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExpenseField {
    Amount,
    Category,
    Date,
    Comment,
}

impl ExpenseField {
    pub(crate) fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "amount" => Ok(Self::Amount),
            "category" => Ok(Self::Category),
            "date" | "expense_date" => Ok(Self::Date),
            "comment" => Ok(Self::Comment),
            other => Err(BookkeeperError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ExpenseAdded {
    pub(crate) expense: Expense,
    /// Budgets whose limit is exceeded once this expense is counted.
    pub(crate) over_budget: Vec<Budget>,
}

pub(crate) struct Bookkeeper {
    category_repo: Box<dyn Repository<Category>>,
    expense_repo: Box<dyn Repository<Expense>>,
    budget_repo: Box<dyn Repository<Budget>>,
    cache: Cache,
    clock: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

impl Bookkeeper {
    pub(crate) fn new(factory: &RepositoryFactory) -> Result<Self> {
        Self::with_repositories(
            factory.repository::<Category>()?,
            factory.repository::<Expense>()?,
            factory.repository::<Budget>()?,
        )
    }

    pub(crate) fn with_repositories(
        category_repo: Box<dyn Repository<Category>>,
        expense_repo: Box<dyn Repository<Expense>>,
        budget_repo: Box<dyn Repository<Budget>>,
    ) -> Result<Self> {
        let mut bookkeeper = Self {
            category_repo,
            expense_repo,
            budget_repo,
            cache: Cache::default(),
            clock: local_today,
        };
        bookkeeper.refresh()?;
        Ok(bookkeeper)
    }

    /// Replace the source of "today" used for budget periods.
    #[cfg(test)]
    pub(crate) fn set_clock(&mut self, clock: fn() -> NaiveDate) -> Result<()> {
        self.clock = clock;
        self.refresh()
    }

    /// Reload every cached list from the store and recompute budgets.
    pub(crate) fn refresh(&mut self) -> Result<()> {
        self.cache.categories = self.category_repo.get_all(None)?;
        self.cache.expenses = self.expense_repo.get_all(None)?;
        self.update_budgets()
    }

    pub(crate) fn categories(&self) -> &[Category] {
        &self.cache.categories
    }

    pub(crate) fn expenses(&self) -> &[Expense] {
        &self.cache.expenses
    }

    pub(crate) fn budgets(&self) -> &[Budget] {
        &self.cache.budgets
    }

    // ── Categories ────────────────────────────────────────────

    pub(crate) fn check_category(&self, name: &str) -> Result<&Category> {
        Category::find_by_name(&self.cache.categories, name)
            .ok_or_else(|| BookkeeperError::UnknownCategory(name.trim().to_string()))
    }

    pub(crate) fn add_category(&mut self, name: &str, parent: Option<&str>) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BookkeeperError::EmptyName);
        }
        if Category::find_by_name(&self.cache.categories, name).is_some() {
            return Err(BookkeeperError::DuplicateCategory(name.to_string()));
        }
        let parent_pk = parent
            .map(|p| self.check_category(p).map(|c| c.pk))
            .transpose()?;

        let mut category = Category::new(name.to_string(), parent_pk);
        self.category_repo.add(&mut category)?;
        info!(pk = category.pk, name, parent = ?parent_pk, "category added");

        self.refresh()?;
        Ok(category)
    }

    /// Re-parent a category. Refuses to put a category under itself or
    /// under any of its descendants.
    pub(crate) fn move_category(&mut self, name: &str, new_parent: Option<&str>) -> Result<Category> {
        let mut category = self.check_category(name)?.clone();

        category.parent = match new_parent {
            None => None,
            Some(parent_name) => {
                let parent = self.check_category(parent_name)?;
                let cycle = parent.pk == category.pk
                    || self.ancestors(parent.pk).iter().any(|a| a.pk == category.pk);
                if cycle {
                    return Err(BookkeeperError::CategoryCycle {
                        child: category.name,
                        parent: parent.name.clone(),
                    });
                }
                Some(parent.pk)
            }
        };

        self.category_repo.update(&category)?;
        info!(pk = category.pk, parent = ?category.parent, "category moved");

        self.refresh()?;
        Ok(category)
    }

    /// Delete a category. Its children move up to its parent and its
    /// expenses are removed.
    pub(crate) fn delete_category(&mut self, name: &str) -> Result<()> {
        let category = self.check_category(name)?.clone();
        self.category_repo.delete(category.pk)?;

        let orphans = self
            .category_repo
            .get_all(Some(&Filter::new().eq("parent", category.pk)))?;
        for mut child in orphans {
            child.parent = category.parent;
            self.category_repo.update(&child)?;
        }

        let expenses = self
            .expense_repo
            .get_all(Some(&Filter::new().eq("category", category.pk)))?;
        let removed = expenses.len();
        for expense in expenses {
            self.expense_repo.delete(expense.pk)?;
        }
        info!(pk = category.pk, name = %category.name, removed, "category deleted");

        self.refresh()
    }

    pub(crate) fn children(&self, pk: i64) -> Vec<&Category> {
        self.cache
            .categories
            .iter()
            .filter(|c| c.parent == Some(pk))
            .collect()
    }

    /// Parent chain of `pk`, nearest first. Stops at a missing parent or at
    /// a category already visited.
    pub(crate) fn ancestors(&self, pk: i64) -> Vec<&Category> {
        let mut seen = HashSet::from([pk]);
        let mut chain = Vec::new();
        let mut next = Category::find_by_pk(&self.cache.categories, pk).and_then(|c| c.parent);

        while let Some(parent_pk) = next {
            if !seen.insert(parent_pk) {
                break;
            }
            let Some(parent) = Category::find_by_pk(&self.cache.categories, parent_pk) else {
                break;
            };
            chain.push(parent);
            next = parent.parent;
        }
        chain
    }

    /// Categories in display order with their depth: each root followed by
    /// its subtree. Categories whose parent is missing count as roots.
    pub(crate) fn category_tree(&self) -> Vec<(usize, &Category)> {
        let cats = &self.cache.categories;
        let mut out = Vec::with_capacity(cats.len());
        let mut seen = HashSet::new();
        let mut stack: Vec<(usize, &Category)> = cats
            .iter()
            .filter(|c| c.parent.map_or(true, |p| Category::find_by_pk(cats, p).is_none()))
            .rev()
            .map(|c| (0, c))
            .collect();

        while let Some((depth, cat)) = stack.pop() {
            if !seen.insert(cat.pk) {
                continue;
            }
            out.push((depth, cat));
            stack.extend(self.children(cat.pk).into_iter().rev().map(|c| (depth + 1, c)));
        }
        out
    }

    // ── Expenses ──────────────────────────────────────────────

    pub(crate) fn add_expense(
        &mut self,
        amount: &str,
        category: &str,
        comment: &str,
        date: Option<&str>,
    ) -> Result<ExpenseAdded> {
        let amount = parse_amount(amount)?;
        let category_pk = self.check_category(category)?.pk;
        let mut expense = Expense::new(amount, category_pk).with_comment(comment.trim());
        if let Some(date) = date {
            expense = expense.with_date(parse_date(date)?);
        }

        self.expense_repo.add(&mut expense)?;
        info!(pk = expense.pk, amount, category = category_pk, "expense added");

        self.refresh()?;
        let over_budget = self.over_budget().into_iter().cloned().collect();
        Ok(ExpenseAdded {
            expense,
            over_budget,
        })
    }

    /// Delete several expenses. Every pk is checked before anything is removed.
    pub(crate) fn delete_expenses(&mut self, pks: &[i64]) -> Result<()> {
        for &pk in pks {
            if self.expense_repo.get(pk)?.is_none() {
                return Err(BookkeeperError::UnknownExpense(pk));
            }
        }
        let unique: HashSet<i64> = pks.iter().copied().collect();
        for &pk in &unique {
            self.expense_repo.delete(pk)?;
        }
        info!(count = unique.len(), "expenses deleted");
        self.refresh()
    }

    pub(crate) fn modify_expense(&mut self, pk: i64, field: ExpenseField, value: &str) -> Result<Expense> {
        let mut expense = self
            .expense_repo
            .get(pk)?
            .ok_or(BookkeeperError::UnknownExpense(pk))?;

        match field {
            ExpenseField::Amount => expense.amount = parse_amount(value)?,
            ExpenseField::Category => expense.category = self.check_category(value)?.pk,
            ExpenseField::Date => expense = expense.with_date(parse_date(value)?),
            ExpenseField::Comment => expense.comment = value.trim().to_string(),
        }

        self.expense_repo.update(&expense)?;
        info!(pk, ?field, "expense modified");

        self.refresh()?;
        Ok(expense)
    }

    /// Expenses whose stored date contains `pattern`, e.g. `"2023-02"`.
    pub(crate) fn expenses_matching(&self, pattern: &str) -> Result<Vec<Expense>> {
        Ok(self
            .expense_repo
            .get_all_by_pattern(&Patterns::new().contains("expense_date", pattern.trim()))?)
    }

    // ── Budgets ───────────────────────────────────────────────

    /// Recompute `spent` for every stored budget and write it back.
    pub(crate) fn update_budgets(&mut self) -> Result<()> {
        let today = (self.clock)();
        for mut budget in self.budget_repo.get_all(None)? {
            budget.update_spent(self.expense_repo.as_ref(), today)?;
            self.budget_repo.update(&budget)?;
        }
        self.cache.budgets = self.budget_repo.get_all(None)?;
        debug!(budgets = self.cache.budgets.len(), %today, "budgets recomputed");
        Ok(())
    }

    pub(crate) fn budget_for(&self, period: Period) -> Option<&Budget> {
        self.cache.budgets.iter().find(|b| b.period == period)
    }

    /// Set, change or remove a budget limit.
    ///
    /// An empty `limit` removes the budget. Without a `pk` the budget already
    /// kept for `period` is changed, or a new one is added.
    pub(crate) fn modify_budget(
        &mut self,
        pk: Option<i64>,
        limit: &str,
        period: Period,
    ) -> Result<Option<Budget>> {
        let limit = limit.trim();
        let target = pk.or_else(|| self.budget_for(period).map(|b| b.pk));

        if limit.is_empty() {
            if let Some(pk) = target {
                self.budget_repo.delete(pk)?;
                info!(pk, %period, "budget removed");
            }
            self.refresh()?;
            return Ok(None);
        }

        let limitation: i64 = limit
            .parse()
            .map_err(|_| BookkeeperError::InvalidAmount(limit.to_string()))?;
        if limitation < 0 {
            return Err(BookkeeperError::NegativeLimit(limitation));
        }

        let pk = match target {
            Some(pk) => {
                let mut budget = self
                    .budget_repo
                    .get(pk)?
                    .ok_or(BookkeeperError::UnknownBudget(pk))?;
                budget.limitation = limitation;
                self.budget_repo.update(&budget)?;
                pk
            }
            None => self.budget_repo.add(&mut Budget::new(limitation, period))?,
        };
        info!(pk, limitation, %period, "budget set");

        self.refresh()?;
        Ok(self.cache.budgets.iter().find(|b| b.pk == pk).cloned())
    }

    pub(crate) fn over_budget(&self) -> Vec<&Budget> {
        self.cache.budgets.iter().filter(|b| b.is_over()).collect()
    }
}

fn parse_amount(s: &str) -> Result<i64> {
    let s = s.trim();
    let amount: i64 = s.parse().map_err(|_| {
        debug!(input = s, "rejected amount");
        BookkeeperError::InvalidAmount(s.to_string())
    })?;
    if amount <= 0 {
        debug!(amount, "rejected non-positive amount");
        return Err(BookkeeperError::NonPositiveAmount(amount));
    }
    Ok(amount)
}

fn parse_date(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    for fmt in DATE_TIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| {
            debug!(input = s, "rejected date");
            BookkeeperError::InvalidDate(s.to_string())
        })
}
