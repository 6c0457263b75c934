//! # quire-db
//!
//! Infrastructure layer for Quire - file-backed state, projects and presets.
//!
//! This crate keeps the on-disk formats out of `quire-core`. The core defines
//! the ports it needs (key/value persistence, message store, preset catalog)
//! and adapts these implementations to them in its `db_adapter` module.
//!
//! ## Architecture
//!
//! ```text
//! quire-cli → quire-core → (ports)
//!                 ↑
//!              quire-db (file-backed implementations)
//! ```
//!
//! ## Modules
//!
//! - `kv`: JSON-file key/value store (one file per key)
//! - `project`: project metadata + JSONL message log per project
//! - `preset`: YAML preset catalog with built-in defaults
//!
//! ## Layout
//!
//! ```text
//! <data_dir>/
//!   state/<key>.json
//!   projects/<id>/project.json
//!   projects/<id>/messages.jsonl
//!   presets.yaml
//! ```

pub mod error;
pub mod kv;
pub mod preset;
pub mod project;

pub use error::{DbError, DbResult};
pub use kv::{JsonFileStore, STATE_DIR};
pub use preset::{default_presets, PresetRecord, YamlPresetCatalog, PRESETS_FILENAME};
pub use project::{
    FileProjectStore, NewMessage, ProjectRecord, ProjectSnapshot, StoredMessage,
    MESSAGES_FILENAME, PROJECTS_DIR, PROJECT_FILENAME,
};
