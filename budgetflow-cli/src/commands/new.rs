//! New command - create accounts, incomes and expenses

use anyhow::Result;
use chrono::NaiveDate;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Input;
use rust_decimal::Decimal;

use budgetflow_core::{BudgetflowContext, Expense, Income};

use super::{block_on, get_context, require_user};
use crate::output::format_money;

#[derive(Subcommand)]
pub enum NewCommands {
    /// Create a bank account
    Account {
        /// Account name
        #[arg(long)]
        name: Option<String>,
        /// Starting balance
        #[arg(long)]
        starting_balance: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record an income
    Income {
        /// Account ID (defaults to the selected account)
        #[arg(long)]
        account: Option<String>,
        /// Amount
        #[arg(long)]
        amount: Option<String>,
        /// Income source, e.g. salary
        #[arg(long)]
        source: Option<String>,
        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record an expense
    Expense {
        /// Account ID (defaults to the selected account)
        #[arg(long)]
        account: Option<String>,
        /// Amount
        #[arg(long)]
        amount: Option<String>,
        /// Expense category, e.g. groceries
        #[arg(long)]
        category: Option<String>,
        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Mark as recurring
        #[arg(long)]
        recurring: bool,
        /// Next due date for a recurring expense (YYYY-MM-DD)
        #[arg(long)]
        next_due: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: NewCommands) -> Result<()> {
    block_on(async move {
        let (ctx, _) = get_context().await?;
        require_user(&ctx)?;

        match command {
            NewCommands::Account {
                name,
                starting_balance,
                json,
            } => {
                let name = prompt_or(name, "Account name")?;
                let starting = parse_amount(&prompt_or(starting_balance, "Starting balance")?)?;

                let account = ctx.session.create_account(&name, starting).await?;
                ctx.save_store()?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&account)?);
                } else {
                    println!("{} Account created", "✓".green());
                    println!("  ID: {}", account.id);
                    println!("  Name: {}", account.name);
                    println!("  Starting balance: {}", format_money(account.starting_balance));
                }
            }
            NewCommands::Income {
                account,
                amount,
                source,
                date,
                description,
                json,
            } => {
                let account = account_or_prompt(&ctx, account)?;
                let amount = parse_amount(&prompt_or(amount, "Amount")?)?;
                let source = prompt_or(source, "Source")?;
                let date = parse_date_or_today(date)?;

                let mut income = Income::new(account, amount, date, source);
                if let Some(description) = description {
                    income = income.with_description(description);
                }
                let income = ctx.session.add_income(income).await?;
                ctx.save_store()?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&income)?);
                } else {
                    println!("{} Income recorded", "✓".green());
                    println!("  ID: {}", income.id);
                    println!("  Amount: {}", format_money(income.amount));
                    println!("  Date: {}", income.date);
                }
            }
            NewCommands::Expense {
                account,
                amount,
                category,
                date,
                description,
                recurring,
                next_due,
                json,
            } => {
                let account = account_or_prompt(&ctx, account)?;
                let amount = parse_amount(&prompt_or(amount, "Amount")?)?;
                let category = prompt_or(category, "Category")?;
                let date = parse_date_or_today(date)?;
                let next_due = next_due.as_deref().map(parse_date).transpose()?;

                let mut expense = Expense::new(account, amount, date, category);
                if let Some(description) = description {
                    expense = expense.with_description(description);
                }
                if recurring || next_due.is_some() {
                    expense = expense.recurring(next_due);
                }
                let expense = ctx.session.add_expense(expense).await?;
                ctx.save_store()?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&expense)?);
                } else {
                    println!("{} Expense recorded", "✓".green());
                    println!("  ID: {}", expense.id);
                    println!("  Amount: {}", format_money(expense.amount));
                    println!("  Date: {}", expense.date);
                }
            }
        }

        Ok(())
    })
}

fn prompt_or(value: Option<String>, prompt: &str) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => Ok(Input::new().with_prompt(prompt).interact_text()?),
    }
}

fn account_or_prompt(ctx: &BudgetflowContext, account: Option<String>) -> Result<String> {
    match account.or_else(|| ctx.session.selected_account_id().map(str::to_string)) {
        Some(account) => Ok(account),
        None => prompt_or(None, "Account ID"),
    }
}

fn parse_amount(text: &str) -> Result<Decimal> {
    text.trim()
        .trim_start_matches('$')
        .replace(',', "")
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid amount: {}", text))
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("Invalid date format. Use YYYY-MM-DD"))
}

fn parse_date_or_today(date: Option<String>) -> Result<NaiveDate> {
    match date {
        Some(text) => parse_date(&text),
        None => Ok(chrono::Local::now().date_naive()),
    }
}
