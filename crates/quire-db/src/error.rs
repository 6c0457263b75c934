//! Error types for quire-db.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for quire-db operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in quire-db operations.
#[derive(Debug, Error)]
pub enum DbError {
    // ========================================================================
    // Key/value state errors
    // ========================================================================
    /// State file I/O error.
    #[error("State I/O error at {path}: {message}")]
    StateIo { path: PathBuf, message: String },

    /// State file parse error.
    #[error("State parse error at {path}: {message}")]
    StateParse { path: PathBuf, message: String },

    /// The key cannot be mapped to a file name.
    #[error("Invalid state key '{key}'")]
    InvalidKey { key: String },

    // ========================================================================
    // Project store errors
    // ========================================================================
    /// Project does not exist.
    #[error("Project not found: {id}")]
    ProjectNotFound { id: String },

    /// Project store I/O error.
    #[error("Project store I/O error at {path}: {message}")]
    ProjectIo { path: PathBuf, message: String },

    /// Project store parse error.
    #[error("Project store parse error at {path}: {message}")]
    ProjectParse { path: PathBuf, message: String },

    // ========================================================================
    // Preset catalog errors
    // ========================================================================
    /// Preset catalog could not be read or parsed.
    #[error("Preset catalog error at {path}: {message}")]
    PresetCatalog { path: PathBuf, message: String },

    // ========================================================================
    // General errors
    // ========================================================================
    /// IO error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a state I/O error.
    pub fn state_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StateIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a state parse error.
    pub fn state_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StateParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a project I/O error.
    pub fn project_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ProjectIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a project parse error.
    pub fn project_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ProjectParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a preset catalog error.
    pub fn preset_catalog(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::PresetCatalog {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
