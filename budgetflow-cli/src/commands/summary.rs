//! Summary command - dashboard totals for one account or all of them

use anyhow::Result;
use colored::Colorize;
use comfy_table::Cell;
use serde_json::json;

use budgetflow_core::domain::summary::{
    category_series, income_source_series, monthly_trend, upcoming_expenses, CategoryTotal,
};

use super::{block_on, get_context, require_user};
use crate::output::{create_table, format_money, format_percent, money_cell};

const UPCOMING_DAYS: i64 = 30;

pub fn run(account: Option<String>, json: bool) -> Result<()> {
    block_on(async move {
        let (mut ctx, mut view) = get_context().await?;
        require_user(&ctx)?;

        if account.is_some() && account.as_deref() != ctx.session.selected_account_id() {
            ctx.session.select_account(account.clone());
            view = ctx.wait_until_synced().await?;
        }
        if let Some(id) = &account {
            if view.account.is_none() {
                anyhow::bail!("Bank account '{}' not found", id);
            }
        }

        let today = chrono::Local::now().date_naive();
        let categories = category_series(&view.expenses);
        let sources = income_source_series(&view.incomes);
        let trend = monthly_trend(&view.incomes, &view.expenses);
        let upcoming = upcoming_expenses(&view.expenses, today, UPCOMING_DAYS);

        if json {
            let out = json!({
                "selectedAccountId": view.selected_account_id,
                "startingBalance": view.starting_balance,
                "summary": view.summary,
                "expenseCategories": categories,
                "incomeSources": sources,
                "monthlyTrend": trend,
                "upcomingExpenses": upcoming,
                "error": view.error,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(());
        }

        let title = match &view.account {
            Some(account) => format!("Summary for {}", account.name),
            None => "Summary for all accounts".to_string(),
        };
        println!("{}", title.bold());
        println!();

        let summary = &view.summary;
        let mut table = create_table();
        table.add_row(vec![Cell::new("Total income"), money_cell(summary.total_income)]);
        table.add_row(vec![Cell::new("Total expenses"), money_cell(summary.total_expenses)]);
        table.add_row(vec![Cell::new("Savings"), money_cell(summary.savings)]);
        table.add_row(vec![Cell::new("Savings rate"), Cell::new(format_percent(summary.savings_rate))]);
        println!("{}", table);

        print_series("Expenses by category", &categories);
        print_series("Income by source", &sources);

        if !trend.is_empty() {
            println!();
            println!("{}", "Monthly trend".bold());
            let mut table = create_table();
            table.set_header(vec!["Month", "Income", "Expenses", "Net"]);
            for month in &trend {
                table.add_row(vec![
                    Cell::new(&month.month),
                    money_cell(month.income),
                    money_cell(month.expenses),
                    money_cell(month.net),
                ]);
            }
            println!("{}", table);
        }

        if !upcoming.is_empty() {
            println!();
            println!("{}", format!("Due in the next {} days", UPCOMING_DAYS).bold());
            for expense in upcoming {
                let due = expense
                    .next_due_date
                    .map(|d| d.to_string())
                    .unwrap_or_default();
                println!("  {} {} {}", due, expense.category, format_money(expense.amount));
            }
        }

        Ok(())
    })
}

fn print_series(title: &str, series: &[CategoryTotal]) {
    if series.is_empty() {
        return;
    }
    println!();
    println!("{}", title.bold());
    let mut table = create_table();
    for entry in series {
        table.add_row(vec![Cell::new(&entry.category), money_cell(entry.total)]);
    }
    println!("{}", table);
}
