//! Ports to the collaborators the core does not own.
//!
//! The core never touches storage directly. Hosts inject implementations of
//! these traits; `quire-db` provides file-backed ones (see [`crate::db_adapter`])
//! and [`MemoryStore`] covers tests and hosts without storage.
//!
//! ## Traits
//!
//! - [`KeyValueStore`]: JSON values by key (device/profile scoped)
//! - [`PersistenceSink`]: load/save/clear of the tab record
//! - [`MessageStore`]: projects and their append-only message logs
//! - [`PresetCatalog`]: read-only preset records

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::errors::QuireError;
use crate::ids::ProjectId;
use crate::persistence::PersistedTabs;
use crate::session::{Message, Preset};
use crate::version_graph::VersionGraph;

// ============================================================================
// Key/value persistence
// ============================================================================

/// JSON key/value storage scoped to one device or profile.
pub trait KeyValueStore {
    /// Value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Value>, QuireError>;

    /// Value stored under `key`, or `default`.
    fn get_or(&self, key: &str, default: Value) -> Result<Value, QuireError> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Replace the value under `key`.
    fn set(&self, key: &str, value: &Value) -> Result<(), QuireError>;

    /// Remove `key`. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), QuireError>;
}

/// Destination of the tab record.
pub trait PersistenceSink {
    /// Raw stored record, if any. Shape checking is the caller's job.
    fn load(&self) -> Result<Option<Value>, QuireError>;

    fn save(&self, record: &PersistedTabs) -> Result<(), QuireError>;

    fn clear(&self) -> Result<(), QuireError>;
}

/// [`PersistenceSink`] over a [`KeyValueStore`] key.
#[derive(Debug, Clone)]
pub struct KvPersistence<K> {
    store: K,
    key: String,
}

impl<K: KeyValueStore> KvPersistence<K> {
    pub fn new(store: K, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &K {
        &self.store
    }
}

impl<K: KeyValueStore> PersistenceSink for KvPersistence<K> {
    fn load(&self) -> Result<Option<Value>, QuireError> {
        self.store.get(&self.key)
    }

    fn save(&self, record: &PersistedTabs) -> Result<(), QuireError> {
        let value = serde_json::to_value(record)?;
        self.store.set(&self.key, &value)
    }

    fn clear(&self) -> Result<(), QuireError> {
        self.store.remove(&self.key)
    }
}

/// In-memory [`KeyValueStore`].
///
/// Single-threaded like the rest of the core; interior mutability lets it be
/// shared by reference between a sink and a test.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, Value>>,
    writes: RefCell<usize>,
    fail_writes: RefCell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        *self.writes.borrow()
    }

    /// Make every following `set` fail, to exercise error paths.
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.borrow_mut() = fail;
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, QuireError> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), QuireError> {
        if *self.fail_writes.borrow() {
            return Err(QuireError::StateIo(format!("write to `{}` rejected", key)));
        }
        self.values.borrow_mut().insert(key.to_string(), value.clone());
        *self.writes.borrow_mut() += 1;
        debug!("MemoryStore set {}", key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), QuireError> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str) -> Result<Option<Value>, QuireError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), QuireError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), QuireError> {
        (**self).remove(key)
    }
}

// ============================================================================
// Message store
// ============================================================================

/// Reference to a newly created project.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRef {
    pub id: ProjectId,
}

/// Messages as created by the store, with server-assigned ids, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendResult {
    pub created: Vec<Message>,
}

/// A project as returned by [`MessageStore::get`].
#[derive(Debug, Clone)]
pub struct ProjectSnapshot {
    pub messages: Vec<Message>,
    /// Raw stored graph; may be in the legacy shape.
    pub version_graph: Option<Value>,
    pub title: Option<String>,
    pub preset_id: Option<String>,
}

/// Project/message datastore. Append-only, ids assigned by the store.
pub trait MessageStore {
    fn create(
        &self,
        title: &str,
        owner: &str,
        preset_id: Option<&str>,
    ) -> Result<ProjectRef, QuireError>;

    /// Append `messages`; the store keeps at most `cap` messages per project.
    fn append_messages(
        &self,
        project_id: &ProjectId,
        messages: &[Message],
        cap: usize,
    ) -> Result<AppendResult, QuireError>;

    /// Load a project with at most `limit` of its newest messages.
    fn get(&self, project_id: &ProjectId, limit: usize) -> Result<ProjectSnapshot, QuireError>;

    /// Save the project's current version graph.
    fn save_version_graph(
        &self,
        project_id: &ProjectId,
        graph: &VersionGraph,
    ) -> Result<(), QuireError>;
}

// ============================================================================
// Preset catalog
// ============================================================================

/// Read-only preset catalog.
pub trait PresetCatalog {
    fn presets(&self) -> Result<Vec<Preset>, QuireError>;

    /// Preset whose name matches `name` (case-insensitive), or whose id equals it.
    fn find(&self, name: &str) -> Result<Preset, QuireError> {
        self.presets()?
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name) || p.id.as_deref() == Some(name))
            .ok_or_else(|| QuireError::PresetNotFound(name.to_string()))
    }
}

/// Fixed in-memory preset list.
#[derive(Debug, Clone, Default)]
pub struct StaticPresets(pub Vec<Preset>);

impl PresetCatalog for StaticPresets {
    fn presets(&self) -> Result<Vec<Preset>, QuireError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_store_basics() {
        let store = MemoryStore::new();
        assert!(store.get("k").unwrap().is_none());
        assert_eq!(store.get_or("k", json!(1)).unwrap(), json!(1));

        store.set("k", &json!({"a": 1})).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!({"a": 1})));
        assert_eq!(store.write_count(), 1);

        store.remove("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_failing_writes() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(matches!(store.set("k", &json!(1)), Err(QuireError::StateIo(_))));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_kv_persistence_round_trip() {
        let store = MemoryStore::new();
        let sink = KvPersistence::new(&store, "quire.tabs");
        assert!(sink.load().unwrap().is_none());

        sink.save(&PersistedTabs::default()).unwrap();
        let raw = store.get("quire.tabs").unwrap().unwrap();
        assert_eq!(raw["tabs"], json!([]));
        assert!(raw["activeTabId"].is_null());

        sink.clear().unwrap();
        assert!(sink.load().unwrap().is_none());
    }

    #[test]
    fn test_preset_find() {
        let catalog = StaticPresets(vec![
            Preset::new("Rewrite", "rewrite").with_id("rw"),
            Preset::new("Scratch", "freeform"),
        ]);
        assert_eq!(catalog.find("rewrite").unwrap().task_type, "rewrite");
        assert_eq!(catalog.find("rw").unwrap().name, "Rewrite");
        assert!(matches!(catalog.find("nope"), Err(QuireError::PresetNotFound(_))));
    }
}
