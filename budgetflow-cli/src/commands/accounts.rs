//! Accounts command - list the signed-in user's bank accounts

use anyhow::Result;
use colored::Colorize;
use comfy_table::Cell;

use super::{block_on, get_context, require_user};
use crate::output::{create_table, money_cell};

pub fn run(json: bool) -> Result<()> {
    block_on(async move {
        let (ctx, _) = get_context().await?;
        require_user(&ctx)?;
        let accounts = ctx.session.accounts();

        if json {
            println!("{}", serde_json::to_string_pretty(&accounts.items)?);
            return Ok(());
        }

        if accounts.items.is_empty() {
            println!("{}", "No bank accounts yet. Create one with 'bf new account'.".dimmed());
            return Ok(());
        }

        let selected = ctx.session.selected_account_id();
        let mut table = create_table();
        table.set_header(vec!["", "ID", "Name", "Starting", "Income", "Expenses", "Balance"]);
        for account in &accounts.items {
            let marker = if selected == Some(account.id.as_str()) { "*" } else { "" };
            table.add_row(vec![
                Cell::new(marker),
                Cell::new(&account.id),
                Cell::new(&account.name),
                money_cell(account.starting_balance),
                money_cell(account.total_income),
                money_cell(account.total_expenses),
                money_cell(account.current_balance()),
            ]);
        }
        println!("{}", table);
        Ok(())
    })
}
