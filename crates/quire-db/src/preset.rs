//! YAML preset catalog.
//!
//! Presets are read-only named configuration records a tab is bound to.
//! When `presets.yaml` is missing the built-in catalog is used.
//!
//! # Example YAML
//!
//! ```yaml
//! - id: rewrite
//!   name: Rewrite
//!   taskType: rewrite
//!   options:
//!     tone: neutral
//! - name: Scratch
//!   taskType: freeform
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Preset catalog file inside the data directory.
pub const PRESETS_FILENAME: &str = "presets.yaml";

/// A preset as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub task_type: String,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

/// The catalog used when no `presets.yaml` exists.
pub fn default_presets() -> Vec<PresetRecord> {
    vec![
        PresetRecord {
            id: Some("freeform".to_string()),
            name: "Freeform".to_string(),
            task_type: "freeform".to_string(),
            options: None,
        },
        PresetRecord {
            id: Some("rewrite".to_string()),
            name: "Rewrite".to_string(),
            task_type: "rewrite".to_string(),
            options: Some(serde_json::json!({ "tone": "neutral" })),
        },
        PresetRecord {
            id: Some("summarize".to_string()),
            name: "Summarize".to_string(),
            task_type: "summarize".to_string(),
            options: Some(serde_json::json!({ "length": "short" })),
        },
    ]
}

/// Preset catalog loaded from a YAML file.
#[derive(Debug, Clone)]
pub struct YamlPresetCatalog {
    path: PathBuf,
}

impl YamlPresetCatalog {
    /// Catalog backed by `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Catalog at `<data_dir>/presets.yaml`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::open(data_dir.join(PRESETS_FILENAME))
    }

    /// Load all presets, or the built-in catalog if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::PresetCatalog`] if the file exists but cannot be parsed.
    pub fn load(&self) -> DbResult<Vec<PresetRecord>> {
        if !self.path.exists() {
            debug!(
                "Preset catalog not found at {}, using built-in presets",
                self.path.display()
            );
            return Ok(default_presets());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| DbError::preset_catalog(&self.path, format!("Failed to read: {}", e)))?;
        let presets: Vec<PresetRecord> = serde_yaml::from_str(&content)
            .map_err(|e| DbError::preset_catalog(&self.path, format!("Failed to parse: {}", e)))?;

        debug!("Loaded {} presets from {}", presets.len(), self.path.display());
        Ok(presets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let catalog = YamlPresetCatalog::in_data_dir(temp.path());
        let presets = catalog.load().unwrap();
        assert_eq!(presets, default_presets());
    }

    #[test]
    fn test_load_from_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(PRESETS_FILENAME);
        fs::write(
            &path,
            r#"
- id: rewrite
  name: Rewrite
  taskType: rewrite
  options:
    tone: formal
- name: Scratch
  taskType: freeform
"#,
        )
        .unwrap();

        let presets = YamlPresetCatalog::open(&path).load().unwrap();
        assert_eq!(presets.len(), 2);
        assert_eq!(presets[0].options.as_ref().unwrap()["tone"], "formal");
        assert!(presets[1].id.is_none());
        assert_eq!(presets[1].task_type, "freeform");
    }

    #[test]
    fn test_invalid_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(PRESETS_FILENAME);
        fs::write(&path, "- name: [unclosed").unwrap();
        assert!(matches!(
            YamlPresetCatalog::open(&path).load(),
            Err(DbError::PresetCatalog { .. })
        ));
    }
}
