//! Export command - write incomes and expenses as CSV

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;

use budgetflow_core::AccountView;

use super::{block_on, get_context, require_user};

pub fn run(account: Option<String>, output: Option<PathBuf>) -> Result<()> {
    block_on(async move {
        let (mut ctx, mut view) = get_context().await?;
        require_user(&ctx)?;

        if account.is_some() && account.as_deref() != ctx.session.selected_account_id() {
            ctx.session.select_account(account.clone());
            view = ctx.wait_until_synced().await?;
        }

        match &output {
            Some(path) => {
                let file = std::fs::File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                let rows = write_csv(&view, file)?;
                eprintln!("{} Exported {} rows to {}", "✓".green(), rows, path.display());
            }
            None => {
                write_csv(&view, std::io::stdout().lock())?;
            }
        }
        Ok(())
    })
}

/// Write one row per record, incomes first, and return the row count
fn write_csv<W: Write>(view: &AccountView, out: W) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["type", "id", "account", "date", "category", "description", "amount"])?;

    for income in &view.incomes {
        writer.write_record([
            "income",
            income.id.as_str(),
            income.bank_account_id.as_str(),
            income.date.to_string().as_str(),
            income.source.as_str(),
            income.description.as_str(),
            income.amount.to_string().as_str(),
        ])?;
    }
    for expense in &view.expenses {
        writer.write_record([
            "expense",
            expense.id.as_str(),
            expense.bank_account_id.as_str(),
            expense.date.to_string().as_str(),
            expense.category.as_str(),
            expense.description.as_str(),
            expense.amount.to_string().as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(view.incomes.len() + view.expenses.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use budgetflow_core::{Expense, Income};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn test_write_csv() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut view = AccountView::empty();
        view.incomes.push(Income::new("a", Decimal::new(1000, 0), day, "salary"));
        view.expenses
            .push(Expense::new("a", Decimal::new(2550, 2), day, "food").with_description("lunch, late"));

        let mut buf = Vec::new();
        let rows = write_csv(&view, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(rows, 2);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "type,id,account,date,category,description,amount");
        assert!(lines[1].starts_with("income,"));
        assert!(lines[2].ends_with(",food,\"lunch, late\",25.50"));
    }
}
