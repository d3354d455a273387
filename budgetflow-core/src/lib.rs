//! Budgetflow Core - reactive sync and aggregation for personal finance
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (BankAccount, Income, Expense) and the
//!   aggregate calculator
//! - **ports**: Trait definitions for external dependencies (RemoteCollectionClient)
//! - **services**: Sync stores, account fan-out, view composer, session
//! - **adapters**: Concrete implementations (in-memory store, JSON file, demo data)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::json_file;
use adapters::memory::{MemoryStore, MemoryStoreOptions};
use config::Config;
use services::{DemoService, LedgerSession};

// Re-export commonly used types at crate root
pub use domain::result::{Error, SyncError, SyncErrorKind};
pub use domain::summary::{compute_summary, FinancialSummary};
pub use domain::{BankAccount, Expense, Income, Scope};
pub use services::{AccountView, CollectionSnapshot};

/// Main context for Budgetflow operations
///
/// Holds the configuration, the store backing the remote collections and a
/// session for the configured user. Must be created within a tokio runtime.
pub struct BudgetflowContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub store: MemoryStore,
    pub session: LedgerSession,
    pub demo_service: DemoService,
}

impl BudgetflowContext {
    /// Create a new Budgetflow context
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;

        // Determine which store file to use
        let store_path = config.store_path(data_dir);
        let store = json_file::load(&store_path, MemoryStoreOptions::default())
            .with_context(|| format!("Failed to open {}", store_path.display()))?;

        let session = LedgerSession::with_user(
            Arc::new(store.clone()),
            config.user_id.clone(),
            config.selected_account_id.clone(),
        );
        let demo_service = DemoService::new(data_dir);

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            store,
            session,
            demo_service,
        })
    }

    /// Wait for the initial sync, bounded by the configured timeout
    pub async fn wait_until_synced(&self) -> Result<services::AccountView> {
        Ok(self
            .session
            .wait_until_synced(self.config.initial_sync_timeout)
            .await?)
    }

    /// Persist the store file after writes
    pub fn save_store(&self) -> Result<()> {
        let path = self.config.store_path(&self.data_dir);
        json_file::save(&self.store, &path).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Persist the session's user and selection into the settings file
    pub fn save_config(&mut self) -> Result<()> {
        self.config.user_id = self.session.user_id().map(str::to_string);
        self.config.selected_account_id = self.session.selected_account_id().map(str::to_string);
        self.config.save(&self.data_dir)
    }
}
