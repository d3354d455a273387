//! Budgetflow CLI - personal finance dashboard in your terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use budgetflow_core::config::Config;
use budgetflow_core::services::init_logging;
use commands::{accounts, demo, export, list, new, remove, select, status, summary};

/// Budgetflow - personal finance dashboard in your terminal
#[derive(Parser)]
#[command(name = "bf", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what is synced for the current user
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show income, expense and savings totals
    Summary {
        /// Account ID (defaults to the selected account, or all accounts)
        #[arg(long)]
        account: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List bank accounts
    Accounts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List incomes or expenses
    List {
        /// What to list
        #[arg(value_enum)]
        kind: list::RecordKind,
        /// Account ID (defaults to the selected account, or all accounts)
        #[arg(long)]
        account: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create new records
    New {
        #[command(subcommand)]
        command: new::NewCommands,
    },

    /// Remove an account, income or expense
    Remove {
        /// What to remove
        #[arg(value_enum)]
        kind: remove::RemoveKind,
        /// Record ID
        id: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Export incomes and expenses as CSV
    Export {
        /// Account ID (defaults to the selected account, or all accounts)
        #[arg(long)]
        account: Option<String>,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Select the account the dashboard shows
    Select {
        /// Account ID
        account: Option<String>,
        /// Show all accounts again
        #[arg(long, conflicts_with = "account")]
        clear: bool,
    },

    /// Manage demo mode
    Demo {
        #[command(subcommand)]
        command: Option<demo::DemoCommands>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = Config::load(&commands::get_data_dir())
        .map(|config| config.logging)
        .unwrap_or_default();
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status { json } => status::run(json),
        Commands::Summary { account, json } => summary::run(account, json),
        Commands::Accounts { json } => accounts::run(json),
        Commands::List { kind, account, json } => list::run(kind, account, json),
        Commands::New { command } => new::run(command),
        Commands::Remove { kind, id, force } => remove::run(kind, &id, force),
        Commands::Export { account, output } => export::run(account, output),
        Commands::Select { account, clear } => select::run(account, clear),
        Commands::Demo { command } => demo::run(command),
    }
}
