//! Common constants used throughout quire-core.
//!
//! This module centralizes limits, labels and file names so the reducer,
//! persistence layer and CLI agree on them.

// ============================================================================
// Tabs
// ============================================================================

/// Maximum number of tabs open at once.
pub const MAX_TABS: usize = 8;

// ============================================================================
// Version Graph
// ============================================================================

/// Label of the sentinel root node.
///
/// A node with this label never holds real content and is never reachable
/// through undo.
pub const START_LABEL: &str = "Start";

/// Window within which a legacy node is relinked to an assistant message.
pub const DEFAULT_MIGRATION_TOLERANCE_SECS: i64 = 5;

// ============================================================================
// Persistence
// ============================================================================

/// Key under which the tab record is stored.
pub const DEFAULT_STORAGE_KEY: &str = "quire.tabs";

/// Maximum number of messages the project store keeps per project.
pub const DEFAULT_MESSAGE_CAP: usize = 500;

/// Number of messages loaded when opening a project.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Owner recorded on projects created from this device.
pub const DEFAULT_OWNER: &str = "local";

// ============================================================================
// Directory Names
// ============================================================================

/// The name of the Quire data directory under the user's home.
pub const QUIRE_HOME_DIR: &str = ".quire";

/// Configuration file name inside the data directory.
pub const CONFIG_FILENAME: &str = "config.yaml";
