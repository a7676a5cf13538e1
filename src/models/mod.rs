mod budget;
mod category;
mod expense;

pub(crate) use budget::{Budget, Period};
pub(crate) use category::Category;
pub(crate) use expense::Expense;
