use anyhow::Result;
use std::path::PathBuf;

use super::{budget_line, print_expenses};
use crate::bookkeeper::{Bookkeeper, ExpenseField};
use crate::config::shellexpand;
use crate::models::{Budget, Period};
use crate::util::format_amount;

/// Run one command. `args` excludes the program name and storage flags.
pub(crate) fn as_cli(args: &[String], bk: &mut Bookkeeper) -> Result<()> {
    let Some(command) = args.first() else {
        return super::summary(bk);
    };
    let rest = &args[1..];
    match command.as_str() {
        "categories" | "c" => cli_categories(bk),
        "category" => cli_category(rest, bk),
        "expenses" | "e" => cli_expenses(rest, bk),
        "expense" => cli_expense(rest, bk),
        "budgets" | "b" => cli_budgets(bk),
        "budget" => cli_budget(rest, bk),
        "export" => cli_export(rest, bk),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("bookkeeper {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("Bookkeeper — personal expenses, categories and budgets");
    println!();
    println!("Usage: bookkeeper [--db <path> | --memory] [command]");
    println!();
    println!("Commands:");
    println!("  (none)                              Show budgets and latest expenses");
    println!("  categories                          Show the category tree");
    println!("  category add <name>                 Add a category");
    println!("  category move <name>                Move a category (to the top without --parent)");
    println!("    --parent <name>                   Parent category");
    println!("  category delete <name>              Delete a category and its expenses");
    println!("  expenses                            List expenses");
    println!("    --date <pattern>                  Only dates containing the pattern, e.g. 2023-02");
    println!("  expense add <amount> <category>     Record an expense");
    println!("    --date <YYYY-MM-DD [HH:MM]>       Expense date (default: now)");
    println!("    --comment <text>                  Free-form note");
    println!("  expense edit <pk> <field> <value>   Change amount, category, date or comment");
    println!("  expense delete <pk>...              Delete expenses");
    println!("  budgets                             List budgets");
    println!("  budget set <day|week|month> <limit> Set a budget limit");
    println!("  budget clear <day|week|month>       Remove a budget");
    println!("  export [path]                       Export expenses to CSV");
    println!("    --date <pattern>                  Only dates containing the pattern");
    println!("  --help, -h                          Show this help");
    println!("  --version, -V                       Show version");
    println!();
    println!("Storage: --db <path>, --memory, or ${} (default: user data dir)", crate::config::DB_ENV);
}

/// Value following `name`, e.g. `--parent food`.
fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == name)
        .map(|w| w[1].as_str())
}

/// Arguments that are neither a `--flag` nor the value after one.
fn positional(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg.starts_with("--") {
            iter.next();
        } else {
            out.push(arg.as_str());
        }
    }
    out
}

fn cli_categories(bk: &Bookkeeper) -> Result<()> {
    let tree = bk.category_tree();
    if tree.is_empty() {
        println!("No categories");
        return Ok(());
    }
    for (depth, cat) in tree {
        println!("{}{} ({})", "  ".repeat(depth), cat.name, cat.pk);
    }
    Ok(())
}

fn cli_category(args: &[String], bk: &mut Bookkeeper) -> Result<()> {
    let pos = positional(args);
    let parent = flag(args, "--parent");
    match pos.as_slice() {
        ["add", name] => {
            let cat = bk.add_category(name, parent)?;
            println!("Added category {} ({})", cat.name, cat.pk);
        }
        ["move", name] => {
            let cat = bk.move_category(name, parent)?;
            match parent {
                Some(p) => println!("Moved {} under {p}", cat.name),
                None => println!("Moved {} to the top level", cat.name),
            }
        }
        ["delete", name] => {
            bk.delete_category(name)?;
            println!("Deleted category {name}");
        }
        _ => anyhow::bail!("Usage: bookkeeper category <add|move|delete> <name> [--parent <name>]"),
    }
    Ok(())
}

fn cli_expenses(args: &[String], bk: &Bookkeeper) -> Result<()> {
    let expenses = match flag(args, "--date") {
        Some(pattern) => bk.expenses_matching(pattern)?,
        None => bk.expenses().to_vec(),
    };
    if expenses.is_empty() {
        println!("No expenses");
        return Ok(());
    }
    print_expenses(&expenses, bk.categories());
    let total = expenses
        .iter()
        .fold(0i64, |acc, e| acc.saturating_add(e.amount));
    println!("{} expenses, total {}", expenses.len(), format_amount(total));
    Ok(())
}

fn cli_expense(args: &[String], bk: &mut Bookkeeper) -> Result<()> {
    let pos = positional(args);
    match pos.as_slice() {
        ["add", amount, category] => {
            let comment = flag(args, "--comment").unwrap_or("");
            let added = bk.add_expense(amount, category, comment, flag(args, "--date"))?;
            println!(
                "Added expense {} of {} on {}",
                added.expense.pk,
                format_amount(added.expense.amount),
                added.expense.expense_date.format("%Y-%m-%d %H:%M:%S"),
            );
            warn_over_budget(&added.over_budget);
        }
        ["edit", pk, field, value] => {
            let exp = bk.modify_expense(parse_pk(pk)?, ExpenseField::parse(field)?, value)?;
            println!("Updated expense {}", exp.pk);
            warn_over_budget(bk.over_budget());
        }
        ["delete", pks @ ..] if !pks.is_empty() => {
            let pks = pks.iter().map(|p| parse_pk(p)).collect::<Result<Vec<_>>>()?;
            bk.delete_expenses(&pks)?;
            println!("Deleted {} expense(s)", pks.len());
        }
        _ => anyhow::bail!(
            "Usage: bookkeeper expense add <amount> <category> [--date <d>] [--comment <c>]\n       \
             bookkeeper expense edit <pk> <field> <value>\n       \
             bookkeeper expense delete <pk>..."
        ),
    }
    Ok(())
}

fn warn_over_budget<'a>(budgets: impl IntoIterator<Item = &'a Budget>) {
    for budget in budgets {
        eprintln!(
            "Warning: {} budget exceeded, spent {} of {}",
            budget.period,
            format_amount(budget.spent),
            format_amount(budget.limitation),
        );
    }
}

fn parse_pk(s: &str) -> Result<i64> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Expected a numeric pk, got \"{s}\""))
}

fn parse_period(s: &str) -> Result<Period> {
    Period::parse(s).ok_or_else(|| crate::bookkeeper::BookkeeperError::UnknownPeriod(s.to_string()).into())
}

fn cli_budgets(bk: &Bookkeeper) -> Result<()> {
    for &period in Period::all() {
        match bk.budget_for(period) {
            Some(budget) => println!("{}", budget_line(budget)),
            None => println!("{:<6} not set", period.as_str()),
        }
    }
    Ok(())
}

fn cli_budget(args: &[String], bk: &mut Bookkeeper) -> Result<()> {
    match positional(args).as_slice() {
        ["set", period, limit] => {
            let period = parse_period(period)?;
            if let Some(budget) = bk.modify_budget(None, limit, period)? {
                println!("{}", budget_line(&budget));
            }
        }
        ["clear", period] => {
            let period = parse_period(period)?;
            bk.modify_budget(None, "", period)?;
            println!("Cleared {period} budget");
        }
        _ => anyhow::bail!("Usage: bookkeeper budget <set <period> <limit> | clear <period>>"),
    }
    Ok(())
}

fn cli_export(args: &[String], bk: &Bookkeeper) -> Result<()> {
    let pattern = flag(args, "--date");
    let output_path = positional(args)
        .first()
        .map(|a| PathBuf::from(shellexpand(a)))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            let today = chrono::Local::now().format("%Y-%m-%d");
            PathBuf::from(format!("{home}/bookkeeper-export-{today}.csv"))
        });

    let expenses = match pattern {
        Some(p) => bk.expenses_matching(p)?,
        None => bk.expenses().to_vec(),
    };
    let count = crate::export::write_expenses(&output_path, &expenses, bk.categories())?;
    if count == 0 {
        println!("No expenses to export (wrote header only)");
    } else {
        println!("Exported {count} expenses to {}", output_path.display());
    }
    Ok(())
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
