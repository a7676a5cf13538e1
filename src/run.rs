mod cli;

pub(crate) use cli::as_cli;

use anyhow::Result;

use crate::bookkeeper::Bookkeeper;
use crate::models::{Budget, Category, Expense};
use crate::util::{format_amount, percent_used, truncate};

const LATEST_EXPENSES: usize = 10;

/// Default view when no command is given: budgets, then the latest expenses.
fn summary(bk: &Bookkeeper) -> Result<()> {
    println!("Bookkeeper — {}", chrono::Local::now().format("%Y-%m-%d"));
    println!("{}", "─".repeat(40));

    if bk.budgets().is_empty() {
        println!("  No budgets set");
    } else {
        for budget in bk.budgets() {
            println!("  {}", budget_line(budget));
        }
    }

    println!();
    let expenses = bk.expenses();
    if expenses.is_empty() {
        println!("No expenses");
        return Ok(());
    }
    println!("Latest expenses:");
    let skip = expenses.len().saturating_sub(LATEST_EXPENSES);
    print_expenses(&expenses[skip..], bk.categories());
    Ok(())
}

fn budget_line(budget: &Budget) -> String {
    let status = if budget.is_over() {
        let over = budget.spent.saturating_sub(budget.limitation);
        format!("OVER by {}", format_amount(over))
    } else {
        format!("{} left", format_amount(budget.remaining()))
    };
    format!(
        "{:<6} {:>10} / {:<10} {:>4}%  {status}",
        budget.period.as_str(),
        format_amount(budget.spent),
        format_amount(budget.limitation),
        percent_used(budget.spent, budget.limitation),
    )
}

fn print_expenses(expenses: &[Expense], categories: &[Category]) {
    println!(
        "{:<5} {:<19} {:>10}  {:<16} Comment",
        "PK", "Date", "Amount", "Category"
    );
    println!("{}", "─".repeat(70));
    for exp in expenses {
        let category = Category::find_by_pk(categories, exp.category)
            .map(|c| c.name.as_str())
            .unwrap_or("?");
        println!(
            "{:<5} {:<19} {:>10}  {:<16} {}",
            exp.pk,
            exp.expense_date.format("%Y-%m-%d %H:%M:%S"),
            format_amount(exp.amount),
            truncate(category, 16),
            truncate(&exp.comment, 30),
        );
    }
}
