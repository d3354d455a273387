//! JSON file persistence for [`MemoryStore`]
//!
//! Lets the CLI keep its remote collections on disk between runs. The file
//! holds a [`StoreDump`]; a missing file is an empty store.

use std::path::Path;

use crate::adapters::memory::{MemoryStore, MemoryStoreOptions, StoreDump};
use crate::domain::result::{Error, Result};

/// Load a store from `path`
pub fn load(path: &Path, options: MemoryStoreOptions) -> Result<MemoryStore> {
    if !path.exists() {
        return Ok(MemoryStore::with_options(options));
    }

    let content = std::fs::read_to_string(path)?;
    let dump: StoreDump = serde_json::from_str(&content).map_err(|e| {
        Error::store(format!("Corrupt store file {}: {}", path.display(), e))
    })?;

    tracing::debug!(
        path = %path.display(),
        collections = dump.collections.len(),
        "loaded store file"
    );
    Ok(MemoryStore::from_dump(dump, options))
}

/// Write the store to `path`, replacing the file atomically
pub fn save(store: &MemoryStore, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(&store.dump())?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
