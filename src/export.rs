use anyhow::{Context, Result};
use std::path::Path;

use crate::models::{Category, Expense};
use crate::repository::format_timestamp;

const HEADER: [&str; 5] = ["pk", "expense_date", "amount", "category", "comment"];

/// Write expenses to a CSV file, one row each, in the order given.
/// Returns the number of rows written.
pub(crate) fn write_expenses(path: &Path, expenses: &[Expense], categories: &[Category]) -> Result<usize> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    wtr.write_record(HEADER)?;

    for exp in expenses {
        let category = Category::find_by_pk(categories, exp.category)
            .map(|c| c.name.as_str())
            .unwrap_or("");
        wtr.write_record([
            exp.pk.to_string().as_str(),
            format_timestamp(&exp.expense_date).as_str(),
            exp.amount.to_string().as_str(),
            category,
            exp.comment.as_str(),
        ])
        .context("Failed to write CSV record")?;
    }

    wtr.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(expenses.len())
}

#[cfg(test)]
#[path = "export_tests.rs"]
mod tests;
