//! Remove command - delete an account, income or expense

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use dialoguer::Confirm;

use super::{block_on, get_context, require_user};
use crate::output::format_money;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum RemoveKind {
    Account,
    Income,
    Expense,
}

pub fn run(kind: RemoveKind, id: &str, force: bool) -> Result<()> {
    block_on(async move {
        let (mut ctx, _) = get_context().await?;
        require_user(&ctx)?;

        let description = match kind {
            RemoveKind::Account => {
                let accounts = ctx.session.accounts();
                let Some(account) = accounts.items.iter().find(|a| a.id == id) else {
                    eprintln!("{}", format!("Bank account '{}' not found", id).red());
                    if !accounts.items.is_empty() {
                        let names: Vec<_> = accounts
                            .items
                            .iter()
                            .map(|a| format!("{} ({})", a.name, a.id))
                            .collect();
                        eprintln!("{}", format!("Accounts: {}", names.join(", ")).dimmed());
                    }
                    anyhow::bail!("Nothing removed");
                };
                format!("the '{}' account and all of its incomes and expenses", account.name)
            }
            RemoveKind::Income => match ctx.session.incomes().items.iter().find(|i| i.id == id) {
                Some(income) => format!("the {} income from {}", format_money(income.amount), income.date),
                None => anyhow::bail!("Income '{}' not found", id),
            },
            RemoveKind::Expense => match ctx.session.expenses().items.iter().find(|e| e.id == id) {
                Some(expense) => format!("the {} expense from {}", format_money(expense.amount), expense.date),
                None => anyhow::bail!("Expense '{}' not found", id),
            },
        };

        if !force {
            println!("\n{}", format!("This will remove {}.", description).yellow());
            if !Confirm::new()
                .with_prompt("Are you sure?")
                .default(false)
                .interact()?
            {
                println!("{}\n", "Cancelled".dimmed());
                return Ok(());
            }
        }

        match kind {
            RemoveKind::Account => {
                ctx.session.remove_account(id).await?;
                if ctx.session.selected_account_id() == Some(id) {
                    ctx.session.select_account(None);
                    ctx.save_config()?;
                }
            }
            RemoveKind::Income => {
                ctx.session.remove_income(id).await?;
            }
            RemoveKind::Expense => {
                ctx.session.remove_expense(id).await?;
            }
        }
        ctx.save_store()?;

        println!("\n{} Removed {}\n", "✓".green(), id);
        Ok(())
    })
}
