//! Error types for quire-core.

use thiserror::Error;

/// Domain-specific errors for Quire operations.
///
/// The reducer, version graph and migrator never produce these: invalid ids
/// and boundary moves are no-ops there. Errors come from I/O-facing APIs
/// (config loading, ports, restore validation) and from lookups the CLI
/// performs before dispatching.
#[derive(Error, Debug)]
pub enum QuireError {
    /// Configuration file could not be read or parsed.
    #[error("Config invalid: {0}")]
    InvalidConfig(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    /// A version graph violates its structural invariants.
    #[error("Corrupt version graph: {0}")]
    CorruptGraph(String),

    /// The persisted tab record has an invalid shape.
    #[error("Corrupt persisted state: {0}")]
    CorruptState(String),

    /// Reading or writing persisted state failed.
    #[error("State storage error: {0}")]
    StateIo(String),

    /// The project does not exist in the message store.
    #[error("Project `{0}` not found.")]
    ProjectNotFound(String),

    /// The message store failed.
    #[error("Message store error: {0}")]
    ProjectStore(String),

    /// No preset with the given name exists.
    #[error("Preset `{0}` not found.")]
    PresetNotFound(String),

    /// The preset catalog could not be loaded.
    #[error("Preset catalog error: {0}")]
    PresetCatalog(String),

    /// No tab matches the given reference.
    #[error("Tab `{0}` not found.")]
    TabNotFound(String),

    /// No version matches the given reference.
    #[error("Version `{0}` not found.")]
    VersionNotFound(String),

    /// A tab reference matches more than one tab or version.
    #[error("Ambiguous reference `{reference}`: matches {count} entries")]
    AmbiguousReference {
        /// The reference as given.
        reference: String,
        /// Number of matches.
        count: usize,
    },

    /// An operation needs an active tab but none is open.
    #[error("No tab is open. Run `quire new <preset>`.")]
    NoActiveTab,

    /// The tab limit is reached.
    #[error("Tab limit reached ({0} tabs). Close a tab first.")]
    TabLimitReached(usize),

    /// The generation callback failed.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// A send did not commit a version; the tab keeps the error.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// IO error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
