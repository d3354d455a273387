//! List command - show incomes or expenses

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::Cell;

use budgetflow_core::AccountView;

use super::{block_on, get_context, require_user};
use crate::output::{create_table, money_cell};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum RecordKind {
    Incomes,
    Expenses,
}

pub fn run(kind: RecordKind, account: Option<String>, json: bool) -> Result<()> {
    block_on(async move {
        let (mut ctx, mut view) = get_context().await?;
        require_user(&ctx)?;

        if account.is_some() && account.as_deref() != ctx.session.selected_account_id() {
            ctx.session.select_account(account.clone());
            view = ctx.wait_until_synced().await?;
        }

        match kind {
            RecordKind::Incomes => print_incomes(&view, json),
            RecordKind::Expenses => print_expenses(&view, json),
        }
    })
}

fn print_incomes(view: &AccountView, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&view.incomes)?);
        return Ok(());
    }
    if view.incomes.is_empty() {
        println!("{}", "No incomes".dimmed());
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["ID", "Date", "Account", "Source", "Description", "Amount"]);
    for income in &view.incomes {
        table.add_row(vec![
            Cell::new(&income.id),
            Cell::new(income.date),
            Cell::new(&income.bank_account_id),
            Cell::new(&income.source),
            Cell::new(&income.description),
            money_cell(income.amount),
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn print_expenses(view: &AccountView, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&view.expenses)?);
        return Ok(());
    }
    if view.expenses.is_empty() {
        println!("{}", "No expenses".dimmed());
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["ID", "Date", "Account", "Category", "Description", "Recurring", "Amount"]);
    for expense in &view.expenses {
        let recurring = match (expense.is_recurring, expense.next_due_date) {
            (true, Some(due)) => format!("next {}", due),
            (true, None) => "yes".to_string(),
            (false, _) => String::new(),
        };
        table.add_row(vec![
            Cell::new(&expense.id),
            Cell::new(expense.date),
            Cell::new(&expense.bank_account_id),
            Cell::new(&expense.category),
            Cell::new(&expense.description),
            Cell::new(recurring),
            money_cell(expense.amount),
        ]);
    }
    println!("{}", table);
    Ok(())
}
