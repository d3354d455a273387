//! Demo service - manage demo mode
//!
//! Demo mode switches the session to a separate store file seeded with
//! sample accounts and records, so the app can be tried without real data.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::adapters::demo::{seed_demo_data, DEMO_USER_ID};
use crate::adapters::json_file;
use crate::adapters::memory::MemoryStore;
use crate::config::Config;

/// Demo service for managing demo mode
pub struct DemoService {
    data_dir: PathBuf,
}

impl DemoService {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    fn demo_store_path(&self) -> PathBuf {
        let mut config = Config::default();
        config.enable_demo_mode();
        config.store_path(&self.data_dir)
    }

    /// Check if demo mode is currently enabled
    pub fn is_enabled(&self) -> Result<bool> {
        Ok(Config::load(&self.data_dir)?.demo_mode)
    }

    /// Enable demo mode
    ///
    /// This will:
    /// 1. Replace any existing demo store with freshly seeded data
    /// 2. Enable demo mode in config and sign in as the demo user
    pub fn enable(&self, today: NaiveDate) -> Result<()> {
        let store = MemoryStore::new();
        seed_demo_data(&store, DEMO_USER_ID, today).context("Failed to generate demo data")?;
        json_file::save(&store, &self.demo_store_path()).context("Failed to write demo store")?;

        let mut config = Config::load(&self.data_dir).unwrap_or_default();
        config.enable_demo_mode();
        config.user_id = Some(DEMO_USER_ID.to_string());
        config.selected_account_id = None;
        config.save(&self.data_dir)?;

        tracing::info!("demo mode enabled");
        Ok(())
    }

    /// Disable demo mode
    ///
    /// Signs out of the demo user and, with `clean`, deletes the demo store.
    pub fn disable(&self, clean: bool) -> Result<()> {
        let mut config = Config::load(&self.data_dir).unwrap_or_default();
        config.disable_demo_mode();
        if config.user_id.as_deref() == Some(DEMO_USER_ID) {
            config.user_id = None;
            config.selected_account_id = None;
        }
        config.save(&self.data_dir)?;

        if clean {
            let demo_store = self.demo_store_path();
            if demo_store.exists() {
                std::fs::remove_file(&demo_store)
                    .with_context(|| format!("Failed to remove {}", demo_store.display()))?;
            }
        }

        tracing::info!(clean, "demo mode disabled");
        Ok(())
    }
}
