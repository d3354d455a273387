//! Select command - choose which account the dashboard shows

use anyhow::Result;
use colored::Colorize;

use super::{block_on, get_context, require_user};

pub fn run(account: Option<String>, clear: bool) -> Result<()> {
    block_on(async move {
        let (mut ctx, _) = get_context().await?;
        require_user(&ctx)?;

        if clear {
            ctx.session.select_account(None);
            ctx.save_config()?;
            println!("{} Showing all accounts", "✓".green());
            return Ok(());
        }

        let Some(id) = account else {
            match ctx.session.selected_account_id() {
                Some(id) => println!("Selected account: {}", id),
                None => println!("{}", "No account selected, showing all accounts".dimmed()),
            }
            return Ok(());
        };

        let accounts = ctx.session.accounts();
        let Some(account) = accounts.items.iter().find(|a| a.id == id) else {
            anyhow::bail!("Bank account '{}' not found", id);
        };

        ctx.session.select_account(Some(account.id.clone()));
        ctx.save_config()?;
        println!("{} Selected {} ({})", "✓".green(), account.name, account.id);
        Ok(())
    })
}
