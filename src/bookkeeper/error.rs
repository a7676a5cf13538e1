use thiserror::Error;

use crate::repository::RepoError;

/// Rejections reported back to the user. Validation variants are raised
/// before any repository call, so they never leave partial changes behind.
#[derive(Debug, Error)]
pub(crate) enum BookkeeperError {
    #[error("Category \"{0}\" does not exist")]
    UnknownCategory(String),

    #[error("Category \"{0}\" already exists")]
    DuplicateCategory(String),

    #[error("Category name must not be empty")]
    EmptyName,

    #[error("Category \"{child}\" cannot be placed under its own descendant \"{parent}\"")]
    CategoryCycle { child: String, parent: String },

    #[error("Enter the amount as a whole number, got \"{0}\"")]
    InvalidAmount(String),

    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    #[error("Budget limit must not be negative, got {0}")]
    NegativeLimit(i64),

    #[error("Invalid date \"{0}\" (expected YYYY-MM-DD [HH:MM[:SS]])")]
    InvalidDate(String),

    #[error("Unknown budget period \"{0}\" (expected day, week or month)")]
    UnknownPeriod(String),

    #[error("Unknown expense field \"{0}\" (expected amount, category, date or comment)")]
    UnknownField(String),

    #[error("Expense with pk={0} does not exist")]
    UnknownExpense(i64),

    #[error("Budget with pk={0} does not exist")]
    UnknownBudget(i64),

    #[error(transparent)]
    Repository(#[from] RepoError),
}
