//! Adapter layer for quire-db infrastructure.
//!
//! This module bridges quire-db implementations with quire-core's ports.
//! It provides:
//!
//! - Error conversion from `DbError` to `QuireError`
//! - Type conversion between stored records and domain types
//! - Wrapper types that implement the core ports using quire-db backends
//!
//! ## Architecture
//!
//! ```text
//! quire-core domain code (manager, session_flow)
//!        ↓
//!   ports (KeyValueStore, MessageStore, PresetCatalog)
//!        ↓
//!   db_adapter (this module) - wrappers + conversions
//!        ↓
//!     quire-db implementations (JSON state files, project dirs, YAML presets)
//! ```
//!
//! ## Wrappers Provided
//!
//! - `DbKeyValueStore` - wraps `quire_db::JsonFileStore`
//! - `DbMessageStore` - wraps `quire_db::FileProjectStore`
//! - `DbPresetCatalog` - wraps `quire_db::YamlPresetCatalog`

use std::path::Path;

use serde_json::Value;
use tracing::warn;

use crate::errors::QuireError;
use crate::ids::{MessageId, ProjectId};
use crate::ports::{
    AppendResult, KeyValueStore, MessageStore, PresetCatalog, ProjectRef, ProjectSnapshot,
};
use crate::session::{Message, Preset, Role};
use crate::version_graph::VersionGraph;

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert a quire-db error to a quire-core error.
pub fn from_db_error(err: quire_db::DbError) -> QuireError {
    use quire_db::DbError;

    match err {
        DbError::Io(io_err) => QuireError::Io(io_err),

        DbError::Json(json_err) => QuireError::Json(json_err),

        DbError::StateIo { path, message } => {
            QuireError::StateIo(format!("{}: {}", path.display(), message))
        }

        DbError::StateParse { path, message } => {
            QuireError::CorruptState(format!("{}: {}", path.display(), message))
        }

        DbError::InvalidKey { key } => QuireError::InvalidConfiguration {
            message: format!("storage key `{}` is not usable as a file name", key),
            hint: "Use letters, digits, '.', '-' or '_' in storageKey".to_string(),
        },

        DbError::ProjectNotFound { id } => QuireError::ProjectNotFound(id),

        DbError::ProjectIo { path, message } | DbError::ProjectParse { path, message } => {
            QuireError::ProjectStore(format!("{}: {}", path.display(), message))
        }

        DbError::PresetCatalog { path, message } => {
            QuireError::PresetCatalog(format!("{}: {}", path.display(), message))
        }

        DbError::Internal { message } => QuireError::StateIo(message),
    }
}

/// Extension trait to convert DbResult to Result<T, QuireError>.
pub trait IntoQuireResult<T> {
    /// Convert a DbResult to a QuireError result.
    fn into_quire_result(self) -> Result<T, QuireError>;
}

impl<T> IntoQuireResult<T> for quire_db::DbResult<T> {
    fn into_quire_result(self) -> Result<T, QuireError> {
        self.map_err(from_db_error)
    }
}

// ============================================================================
// Type Conversion
// ============================================================================

/// Convert a domain message to the record the store appends.
pub fn to_new_message(message: &Message) -> quire_db::NewMessage {
    quire_db::NewMessage {
        role: message.role.as_str().to_string(),
        content: message.content.clone(),
        created_at: message.created_at,
    }
}

/// Convert a stored message to a domain message.
///
/// Unknown roles are read as `system` so that a foreign entry cannot be
/// mistaken for generated output.
pub fn from_stored_message(message: quire_db::StoredMessage) -> Message {
    let role = message.role.parse::<Role>().unwrap_or_else(|e| {
        warn!("{}; reading message {} as system", e, message.id);
        Role::System
    });
    Message {
        id: MessageId::new(message.id),
        role,
        content: message.content,
        created_at: message.created_at,
    }
}

/// Convert a catalog record to a domain preset.
pub fn from_preset_record(record: quire_db::PresetRecord) -> Preset {
    Preset {
        id: record.id,
        name: record.name,
        task_type: record.task_type,
        options: record.options,
    }
}

// ============================================================================
// Key/Value Store Wrapper
// ============================================================================

/// [`KeyValueStore`] over JSON files in `<data_dir>/state`.
#[derive(Debug, Clone)]
pub struct DbKeyValueStore {
    inner: quire_db::JsonFileStore,
}

impl DbKeyValueStore {
    pub fn new(inner: quire_db::JsonFileStore) -> Self {
        Self { inner }
    }

    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(quire_db::JsonFileStore::in_data_dir(data_dir))
    }
}

impl KeyValueStore for DbKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, QuireError> {
        self.inner.get(key).into_quire_result()
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), QuireError> {
        self.inner.set(key, value).into_quire_result()
    }

    fn remove(&self, key: &str) -> Result<(), QuireError> {
        self.inner.remove(key).into_quire_result()
    }
}

// ============================================================================
// Message Store Wrapper
// ============================================================================

/// [`MessageStore`] over project directories in `<data_dir>/projects`.
#[derive(Debug, Clone)]
pub struct DbMessageStore {
    inner: quire_db::FileProjectStore,
}

impl DbMessageStore {
    pub fn new(inner: quire_db::FileProjectStore) -> Self {
        Self { inner }
    }

    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(quire_db::FileProjectStore::in_data_dir(data_dir))
    }

    /// All projects, most recently updated first.
    pub fn list(&self) -> Result<Vec<quire_db::ProjectRecord>, QuireError> {
        self.inner.list().into_quire_result()
    }
}

impl MessageStore for DbMessageStore {
    fn create(
        &self,
        title: &str,
        owner: &str,
        preset_id: Option<&str>,
    ) -> Result<ProjectRef, QuireError> {
        let record = self.inner.create(title, owner, preset_id).into_quire_result()?;
        Ok(ProjectRef {
            id: ProjectId::new(record.id),
        })
    }

    fn append_messages(
        &self,
        project_id: &ProjectId,
        messages: &[Message],
        cap: usize,
    ) -> Result<AppendResult, QuireError> {
        let new: Vec<quire_db::NewMessage> = messages.iter().map(to_new_message).collect();
        let created = self
            .inner
            .append_messages(project_id.as_str(), &new, cap)
            .into_quire_result()?;
        Ok(AppendResult {
            created: created.into_iter().map(from_stored_message).collect(),
        })
    }

    fn get(&self, project_id: &ProjectId, limit: usize) -> Result<ProjectSnapshot, QuireError> {
        let snapshot = self
            .inner
            .get(project_id.as_str(), limit)
            .into_quire_result()?;
        Ok(ProjectSnapshot {
            messages: snapshot
                .messages
                .into_iter()
                .map(from_stored_message)
                .collect(),
            version_graph: snapshot.version_graph,
            title: Some(snapshot.title),
            preset_id: snapshot.preset_id,
        })
    }

    fn save_version_graph(
        &self,
        project_id: &ProjectId,
        graph: &VersionGraph,
    ) -> Result<(), QuireError> {
        let value = serde_json::to_value(graph)?;
        self.inner
            .save_version_graph(project_id.as_str(), value)
            .into_quire_result()
    }
}

// ============================================================================
// Preset Catalog Wrapper
// ============================================================================

/// [`PresetCatalog`] over `<data_dir>/presets.yaml`.
#[derive(Debug, Clone)]
pub struct DbPresetCatalog {
    inner: quire_db::YamlPresetCatalog,
}

impl DbPresetCatalog {
    pub fn new(inner: quire_db::YamlPresetCatalog) -> Self {
        Self { inner }
    }

    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(quire_db::YamlPresetCatalog::in_data_dir(data_dir))
    }
}

impl PresetCatalog for DbPresetCatalog {
    fn presets(&self) -> Result<Vec<Preset>, QuireError> {
        let records = self.inner.load().into_quire_result()?;
        Ok(records.into_iter().map(from_preset_record).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version_graph::NewVersion;
    use tempfile::TempDir;

    #[test]
    fn test_error_mapping() {
        let err = from_db_error(quire_db::DbError::ProjectNotFound { id: "p1".into() });
        assert!(matches!(err, QuireError::ProjectNotFound(ref id) if id == "p1"));

        let err = from_db_error(quire_db::DbError::state_parse("/tmp/x.json", "bad"));
        assert!(matches!(err, QuireError::CorruptState(_)));

        let err = from_db_error(quire_db::DbError::InvalidKey { key: "../x".into() });
        assert!(matches!(err, QuireError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_unknown_role_reads_as_system() {
        let message = from_stored_message(quire_db::StoredMessage {
            id: "m1".into(),
            role: "tool".into(),
            content: "x".into(),
            created_at: chrono::Utc::now(),
        });
        assert_eq!(message.role, Role::System);
    }

    #[test]
    fn test_key_value_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = DbKeyValueStore::in_data_dir(dir.path());
        assert!(store.get("quire.tabs").unwrap().is_none());

        store.set("quire.tabs", &serde_json::json!({"tabs": []})).unwrap();
        assert_eq!(store.get("quire.tabs").unwrap().unwrap()["tabs"], serde_json::json!([]));

        store.remove("quire.tabs").unwrap();
        assert!(store.get("quire.tabs").unwrap().is_none());
    }

    #[test]
    fn test_message_store_assigns_ids() {
        let dir = TempDir::new().unwrap();
        let store = DbMessageStore::in_data_dir(dir.path());
        let project = store.create("Essay", "me", Some("rewrite")).unwrap();

        let local = Message::new(Role::User, "hello");
        let result = store
            .append_messages(&project.id, std::slice::from_ref(&local), 10)
            .unwrap();
        assert_eq!(result.created.len(), 1);
        assert_ne!(result.created[0].id, local.id);
        assert_eq!(result.created[0].role, Role::User);

        let graph = VersionGraph::start().append_version(NewVersion::new("x", "V1"));
        store.save_version_graph(&project.id, &graph).unwrap();

        let snapshot = store.get(&project.id, 0).unwrap();
        assert_eq!(snapshot.title.as_deref(), Some("Essay"));
        assert_eq!(snapshot.preset_id.as_deref(), Some("rewrite"));
        assert_eq!(snapshot.messages, result.created);
        let saved: VersionGraph = serde_json::from_value(snapshot.version_graph.unwrap()).unwrap();
        assert_eq!(saved, graph);
    }

    #[test]
    fn test_missing_project() {
        let dir = TempDir::new().unwrap();
        let store = DbMessageStore::in_data_dir(dir.path());
        assert!(matches!(
            store.get(&ProjectId::new("nope"), 0),
            Err(QuireError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_default_presets() {
        let dir = TempDir::new().unwrap();
        let catalog = DbPresetCatalog::in_data_dir(dir.path());
        let presets = catalog.presets().unwrap();
        assert!(presets.iter().any(|p| p.name == "Rewrite"));
        assert_eq!(catalog.find("summarize").unwrap().task_type, "summarize");
    }
}
