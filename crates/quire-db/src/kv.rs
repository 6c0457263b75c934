//! JSON-file key/value store.
//!
//! Each key maps to `<dir>/<key>.json`. Writes go to a temporary sibling file
//! first and are renamed into place, so a crash mid-write leaves the previous
//! value intact.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{DbError, DbResult};

/// Subdirectory of the data directory that holds key/value state.
pub const STATE_DIR: &str = "state";

/// Key/value store persisting one JSON document per key.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`. The directory is created lazily on first write.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Open the store under `<data_dir>/state`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::open(data_dir.join(STATE_DIR))
    }

    /// Directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> DbResult<PathBuf> {
        if !is_valid_key(key) {
            return Err(DbError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }

    /// Read the value stored under `key`, or `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::StateParse`] if the file exists but is not valid JSON.
    pub fn get(&self, key: &str) -> DbResult<Option<serde_json::Value>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            trace!("No state stored for key {}", key);
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| DbError::state_io(&path, format!("Failed to read: {}", e)))?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let value = serde_json::from_str(&content)
            .map_err(|e| DbError::state_parse(&path, e.to_string()))?;
        debug!("Loaded state for key {} ({} bytes)", key, content.len());
        Ok(Some(value))
    }

    /// Read `key`, falling back to `default` when nothing is stored.
    pub fn get_or(&self, key: &str, default: serde_json::Value) -> DbResult<serde_json::Value> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: &str, value: &serde_json::Value) -> DbResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| {
            DbError::state_io(&self.dir, format!("Failed to create state directory: {}", e))
        })?;

        let body = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body.as_bytes())
            .map_err(|e| DbError::state_io(&tmp, format!("Failed to write: {}", e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| DbError::state_io(&path, format!("Failed to replace: {}", e)))?;

        debug!("Saved state for key {} ({} bytes)", key, body.len());
        Ok(())
    }

    /// Remove the value stored under `key`. Removing a missing key is not an error.
    pub fn remove(&self, key: &str) -> DbResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed state for key {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DbError::state_io(&path, format!("Failed to remove: {}", e))),
        }
    }
}

/// Keys become file names, so only a conservative character set is accepted.
pub(crate) fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}
