//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "app": { "demoMode": false },
//!   "session": { "userId": "u1", "selectedAccountId": null },
//!   "sync": { "initialSyncTimeoutMs": 5000 },
//!   "logging": { "level": "warn", "file": null }
//! }
//! ```
//! Keys this crate does not manage are kept when saving.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const SETTINGS_FILE: &str = "settings.json";
const DEFAULT_SYNC_TIMEOUT_MS: u64 = 5000;
const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(default)]
    session: SessionSettings,
    #[serde(default)]
    sync: SyncSettings,
    #[serde(default)]
    logging: LoggingSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default)]
    demo_mode: bool,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionSettings {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    selected_account_id: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncSettings {
    #[serde(default)]
    initial_sync_timeout_ms: Option<u64>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoggingSettings {
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    file: Option<PathBuf>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Logging setup read from the settings file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Append log lines to this file as well as stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

/// Budgetflow configuration (simplified view of settings)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub demo_mode: bool,
    pub user_id: Option<String>,
    pub selected_account_id: Option<String>,
    pub initial_sync_timeout: Duration,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            demo_mode: false,
            user_id: None,
            selected_account_id: None,
            initial_sync_timeout: Duration::from_millis(DEFAULT_SYNC_TIMEOUT_MS),
            logging: LoggingConfig::default(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "true" | "1" | "yes" | "TRUE" | "YES" => Some(true),
        "false" | "0" | "no" | "FALSE" | "NO" => Some(false),
        _ => None,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid settings JSON; fix or remove it", path.display()))
}

impl Config {
    /// Load config from the data directory
    ///
    /// Environment overrides (for CI and scripting):
    /// - `BUDGETFLOW_DEMO_MODE`
    /// - `BUDGETFLOW_USER_ID`
    pub fn load(data_dir: &Path) -> Result<Self> {
        // A damaged settings file falls back to defaults rather than locking
        // the user out; `save` refuses to overwrite it
        let raw = match read_settings(&data_dir.join(SETTINGS_FILE)) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "ignoring unreadable settings file");
                SettingsFile::default()
            }
        };

        let demo_mode = std::env::var("BUDGETFLOW_DEMO_MODE")
            .ok()
            .as_deref()
            .and_then(parse_flag)
            .unwrap_or(raw.app.demo_mode);

        let user_id = non_blank(std::env::var("BUDGETFLOW_USER_ID").ok())
            .or_else(|| non_blank(raw.session.user_id.clone()));

        Ok(Self {
            demo_mode,
            user_id,
            selected_account_id: non_blank(raw.session.selected_account_id.clone()),
            initial_sync_timeout: Duration::from_millis(
                raw.sync
                    .initial_sync_timeout_ms
                    .unwrap_or(DEFAULT_SYNC_TIMEOUT_MS),
            ),
            logging: LoggingConfig {
                level: non_blank(raw.logging.level.clone())
                    .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
                file: raw.logging.file.clone(),
            },
        })
    }

    /// Save config to the data directory
    /// Preserves other settings that this crate doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;
        let settings_path = data_dir.join(SETTINGS_FILE);

        let mut settings = read_settings(&settings_path)?;

        // Update only the fields we manage
        settings.app.demo_mode = self.demo_mode;
        settings.session.user_id = self.user_id.clone();
        settings.session.selected_account_id = self.selected_account_id.clone();
        settings.sync.initial_sync_timeout_ms = Some(self.initial_sync_timeout.as_millis() as u64);
        settings.logging.level = Some(self.logging.level.clone());
        settings.logging.file = self.logging.file.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)
            .with_context(|| format!("Failed to write {}", settings_path.display()))?;
        Ok(())
    }

    pub fn enable_demo_mode(&mut self) {
        self.demo_mode = true;
    }

    pub fn disable_demo_mode(&mut self) {
        self.demo_mode = false;
    }

    /// Name of the store file for the current mode
    pub fn store_file_name(&self) -> &'static str {
        if self.demo_mode {
            "demo-store.json"
        } else {
            "store.json"
        }
    }

    pub fn store_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(self.store_file_name())
    }
}

/// Data directory: `BUDGETFLOW_DIR` or `~/.budgetflow`
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("BUDGETFLOW_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".budgetflow")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();

        assert_eq!(config.initial_sync_timeout, Duration::from_millis(5000));
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.store_file_name(), "store.json");
    }

    #[test]
    fn test_reads_camel_case_sections() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{
                "app": { "demoMode": true },
                "session": { "userId": "u1", "selectedAccountId": "acc1" },
                "sync": { "initialSyncTimeoutMs": 250 },
                "logging": { "level": "debug", "file": "bf.log" }
            }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert!(config.demo_mode);
        assert_eq!(config.user_id.as_deref(), Some("u1"));
        assert_eq!(config.selected_account_id.as_deref(), Some("acc1"));
        assert_eq!(config.initial_sync_timeout, Duration::from_millis(250));
        assert_eq!(config.logging.file, Some(PathBuf::from("bf.log")));
        assert_eq!(config.store_file_name(), "demo-store.json");
    }

    #[test]
    fn test_save_preserves_unmanaged_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{ "app": { "demoMode": false, "theme": "dark" }, "plugins": { "x": 1 } }"#,
        )
        .unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        config.user_id = Some("u2".to_string());
        config.save(dir.path()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("settings.json")).unwrap()).unwrap();
        assert_eq!(raw["app"]["theme"], "dark");
        assert_eq!(raw["plugins"]["x"], 1);
        assert_eq!(raw["session"]["userId"], "u2");
    }

    #[test]
    fn test_blank_ids_are_absent() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{ "session": { "userId": "  ", "selectedAccountId": "" } }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert!(config.selected_account_id.is_none());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), "not json").unwrap();
        assert!(Config::load(dir.path()).is_ok());
    }

    #[test]
    fn test_save_keeps_corrupt_file_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ \"app\": ").unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        config.user_id = Some("u1".to_string());
        let err = config.save(dir.path()).unwrap_err();

        assert!(err.to_string().contains("not valid settings JSON"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ \"app\": ");
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("yes"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
