//! Status command - show what the session holds

use anyhow::Result;
use colored::Colorize;
use comfy_table::Cell;

use budgetflow_core::services::get_status;

use super::{block_on, get_context};
use crate::output::{create_table, money_cell};

pub fn run(json: bool) -> Result<()> {
    block_on(async move {
        let (ctx, _) = get_context().await?;
        let status = get_status(&ctx.session);

        if json {
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(());
        }

        println!("{}", "Financial Data Status".bold());
        println!();

        let user = status.user_id.as_deref().unwrap_or("(none)");
        let mut table = create_table();
        table.add_row(vec!["User", user]);
        if ctx.config.demo_mode {
            table.add_row(vec!["Mode", "demo"]);
        }
        table.add_row(vec!["Accounts", &status.total_accounts.to_string()]);
        table.add_row(vec!["Incomes", &status.total_incomes.to_string()]);
        table.add_row(vec!["Expenses", &status.total_expenses.to_string()]);
        println!("{}", table);
        println!();

        if let (Some(earliest), Some(latest)) = (&status.date_range.earliest, &status.date_range.latest) {
            println!("Date range: {} to {}", earliest, latest);
            println!();
        }

        if !status.accounts.is_empty() {
            println!("{}", "Accounts".bold());
            let mut table = create_table();
            table.set_header(vec!["", "ID", "Name", "Starting", "Balance", "Incomes", "Expenses"]);
            for account in &status.accounts {
                let marker = if status.selected_account_id.as_deref() == Some(account.id.as_str()) {
                    "*"
                } else {
                    ""
                };
                table.add_row(vec![
                    Cell::new(marker),
                    Cell::new(&account.id),
                    Cell::new(&account.name),
                    money_cell(account.starting_balance),
                    money_cell(account.current_balance),
                    Cell::new(account.incomes),
                    Cell::new(account.expenses),
                ]);
            }
            println!("{}", table);
        }

        for error in &status.errors {
            eprintln!("{} {}", "!".yellow(), error);
        }

        Ok(())
    })
}
