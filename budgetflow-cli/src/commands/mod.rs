//! CLI command implementations

pub mod accounts;
pub mod demo;
pub mod export;
pub mod list;
pub mod new;
pub mod remove;
pub mod select;
pub mod status;
pub mod summary;

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use budgetflow_core::{config, AccountView, BudgetflowContext};

use crate::output;

/// Get the budgetflow directory from environment or default
pub fn get_data_dir() -> PathBuf {
    config::data_dir()
}

/// Run a command body on a single-threaded runtime
pub fn block_on<F: Future<Output = Result<()>>>(body: F) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(body)
}

/// Open the context and wait for the initial sync
///
/// A sync that fails or times out is reported but not fatal: commands work
/// with whatever data arrived.
pub async fn get_context() -> Result<(BudgetflowContext, AccountView)> {
    let data_dir = get_data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create budgetflow directory: {:?}", data_dir))?;

    let ctx = BudgetflowContext::new(&data_dir).context("Failed to initialize budgetflow context")?;

    let spinner = if atty::is(atty::Stream::Stderr) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message("Syncing...");
        spinner.enable_steady_tick(Duration::from_millis(80));
        Some(spinner)
    } else {
        None
    };

    let view = match ctx.wait_until_synced().await {
        Ok(view) => view,
        Err(e) => {
            tracing::warn!(error = %e, "initial sync incomplete");
            ctx.session.view()
        }
    };

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if let Some(error) = &view.error {
        output::warning(&format!("Sync problem: {}", error));
    }

    Ok((ctx, view))
}

/// Fail with a hint when nobody is signed in
pub fn require_user(ctx: &BudgetflowContext) -> Result<String> {
    ctx.session.user_id().map(str::to_string).ok_or_else(|| {
        anyhow::anyhow!(
            "No user configured. Set session.userId in settings.json, BUDGETFLOW_USER_ID, or run 'bf demo on'"
        )
    })
}
