//! # quire-core
//!
//! **Quire** – version graph and tab session core library.
//!
//! This crate holds the editing-session domain: a linear version history per
//! session, a pure reducer over a bounded set of tabs, and the persistence
//! contract that saves tabs on change and restores them on load. It is
//! consumed by the `quire` CLI and any other host that injects storage.
//!
//! ## Main Types
//!
//! - [`VersionGraph`] – linear history with one active pointer
//! - [`TabManager`] – single writer for tab state, persists on change
//! - [`QuireEngine`] – file-backed setup used by the CLI
//! - [`QuireError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`version_graph`] – nodes, append with forward pruning, undo/redo/jump
//! - [`migrate`] – upgrade of legacy-shaped graphs
//! - [`tabs`] – `TabState`, `TabAction` and `reduce`
//! - [`manager`] – reducer plus persistence
//! - [`persistence`] – persisted record and restoration policy
//! - [`ports`] – storage traits the host implements
//! - [`session_flow`] – send, snapshot and open-project workflows
//! - [`config`] – `QuireConfig`
//! - [`db_adapter`] – quire-db backed implementations of the ports
//!
//! ## Example
//!
//! ```ignore
//! use quire_core::{reduce, TabAction, TabState, Preset};
//!
//! let state = reduce(
//!     TabState::default(),
//!     TabAction::CreateTab { preset: Preset::new("Rewrite", "rewrite") },
//! );
//! assert_eq!(state.active_tab().unwrap().label, "Rewrite");
//! ```

// Modules
pub mod config;
pub mod constants;
pub mod db_adapter;
pub mod engine;
pub mod errors;
pub mod ids;
pub mod manager;
pub mod migrate;
pub mod persistence;
pub mod ports;
pub mod session;
pub mod session_flow;
pub mod tabs;
pub mod version_graph;

// Re-exports for convenience
pub use config::QuireConfig;
pub use constants::{
    CONFIG_FILENAME, DEFAULT_HISTORY_LIMIT, DEFAULT_MESSAGE_CAP,
    DEFAULT_MIGRATION_TOLERANCE_SECS, DEFAULT_OWNER, DEFAULT_STORAGE_KEY, MAX_TABS,
    QUIRE_HOME_DIR, START_LABEL,
};
pub use db_adapter::{
    from_db_error, DbKeyValueStore, DbMessageStore, DbPresetCatalog, IntoQuireResult,
};
pub use engine::{resolve_reference, FileSink, QuireEngine, MIN_PREFIX_LEN};
pub use errors::QuireError;
pub use ids::{MessageId, NodeId, ProjectId, TabId};
pub use manager::TabManager;
pub use migrate::{default_tolerance, migrate_version_graph, StoredVersionGraph, StoredVersionNode};
pub use persistence::{restore_state, PersistedTab, PersistedTabs};
pub use ports::{
    AppendResult, KeyValueStore, KvPersistence, MemoryStore, MessageStore, PersistenceSink,
    PresetCatalog, ProjectRef, ProjectSnapshot, StaticPresets,
};
pub use session::{unique_label, Message, MessageUpdate, Preset, Role, SessionTab};
pub use session_flow::{
    commit_graph, open_project, send_draft, snapshot_draft, OpenOptions, SendOptions,
    SendOutcome,
};
pub use tabs::{reduce, TabAction, TabState};
pub use version_graph::{NewVersion, VersionGraph, VersionMetadata, VersionNode};

// Re-export quire-db for hosts that need direct store access
pub use quire_db;
