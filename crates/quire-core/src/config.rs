//! Configuration for Quire.
//!
//! [`QuireConfig`] is read from `~/.quire/config.yaml` (or a path given on the
//! command line). Every key is optional; a missing file yields the defaults.
//!
//! # Example YAML
//!
//! ```yaml
//! maxTabs: 6
//! storageKey: quire.tabs
//! migrationToleranceSecs: 5
//! autosave: true
//! messageCap: 500
//! historyLimit: 200
//! owner: alice
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONFIG_FILENAME, DEFAULT_HISTORY_LIMIT, DEFAULT_MESSAGE_CAP, DEFAULT_MIGRATION_TOLERANCE_SECS,
    DEFAULT_OWNER, DEFAULT_STORAGE_KEY, MAX_TABS, QUIRE_HOME_DIR,
};
use crate::errors::QuireError;

fn default_max_tabs() -> usize {
    MAX_TABS
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_migration_tolerance_secs() -> i64 {
    DEFAULT_MIGRATION_TOLERANCE_SECS
}

fn default_autosave() -> bool {
    true
}

fn default_message_cap() -> usize {
    DEFAULT_MESSAGE_CAP
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_owner() -> String {
    DEFAULT_OWNER.to_string()
}

// ============================================================================
// QuireConfig
// ============================================================================

/// User-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuireConfig {
    /// Maximum number of open tabs.
    #[serde(default = "default_max_tabs")]
    pub max_tabs: usize,

    /// Key of the persisted tab record.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Relink window for legacy version graphs, in seconds.
    #[serde(default = "default_migration_tolerance_secs")]
    pub migration_tolerance_secs: i64,

    /// Save after every change instead of on flush.
    #[serde(default = "default_autosave")]
    pub autosave: bool,

    /// Messages kept per project by the message store.
    #[serde(default = "default_message_cap")]
    pub message_cap: usize,

    /// Messages loaded when a project is opened.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Owner recorded on new projects.
    #[serde(default = "default_owner")]
    pub owner: String,
}

impl Default for QuireConfig {
    fn default() -> Self {
        Self {
            max_tabs: default_max_tabs(),
            storage_key: default_storage_key(),
            migration_tolerance_secs: default_migration_tolerance_secs(),
            autosave: default_autosave(),
            message_cap: default_message_cap(),
            history_limit: default_history_limit(),
            owner: default_owner(),
        }
    }
}

impl QuireConfig {
    /// Load from `~/.quire/config.yaml`, or defaults if there is no home directory.
    ///
    /// # Errors
    ///
    /// Returns [`QuireError::InvalidConfig`] if the file exists but cannot be parsed.
    pub fn load_default() -> Result<Self, QuireError> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`QuireError::InvalidConfig`] if the file cannot be read or parsed.
    /// Returns [`QuireError::InvalidConfiguration`] if validation fails.
    pub fn from_path(path: &Path) -> Result<Self, QuireError> {
        if !path.exists() {
            tracing::debug!("Config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            QuireError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        // An empty file parses as YAML null.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            QuireError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        let warnings = config.validate()?;
        for warning in warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(config)
    }

    /// Default data directory (`~/.quire`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(QUIRE_HOME_DIR))
    }

    /// Default config file path (`~/.quire/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join(CONFIG_FILENAME))
    }

    /// Relink window as a duration.
    pub fn migration_tolerance(&self) -> Duration {
        Duration::seconds(self.migration_tolerance_secs)
    }

    /// Check values, returning non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns [`QuireError::InvalidConfiguration`] when a value would make the
    /// manager unusable.
    pub fn validate(&self) -> Result<Vec<String>, QuireError> {
        let mut warnings = Vec::new();

        if self.max_tabs == 0 {
            return Err(QuireError::InvalidConfiguration {
                message: "maxTabs cannot be 0".to_string(),
                hint: format!("Set maxTabs to at least 1 (default: {})", MAX_TABS),
            });
        }

        if self.storage_key.trim().is_empty() {
            return Err(QuireError::InvalidConfiguration {
                message: "storageKey cannot be empty".to_string(),
                hint: format!("Remove the key to use the default `{}`", DEFAULT_STORAGE_KEY),
            });
        }

        if self.migration_tolerance_secs < 0 {
            return Err(QuireError::InvalidConfiguration {
                message: format!(
                    "migrationToleranceSecs={} is negative",
                    self.migration_tolerance_secs
                ),
                hint: format!(
                    "Use a window of 0 or more seconds (default: {})",
                    DEFAULT_MIGRATION_TOLERANCE_SECS
                ),
            });
        }

        if self.max_tabs > 32 {
            warnings.push(format!(
                "maxTabs={} is very large; the tab bar may become unusable",
                self.max_tabs
            ));
        }

        if self.migration_tolerance_secs > 60 {
            warnings.push(format!(
                "migrationToleranceSecs={} is wide; legacy versions may link to the wrong reply",
                self.migration_tolerance_secs
            ));
        }

        if self.message_cap == 0 {
            warnings.push(
                "messageCap=0 disables trimming; message logs grow without bound".to_string(),
            );
        } else if self.history_limit > self.message_cap {
            warnings.push(format!(
                "historyLimit={} exceeds messageCap={}; at most {} messages can be loaded",
                self.history_limit, self.message_cap, self.message_cap
            ));
        }

        Ok(warnings)
    }
}
