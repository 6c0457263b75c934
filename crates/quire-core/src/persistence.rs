//! Persisted tab record and the restoration policy.
//!
//! The record holds the durable part of every tab. Transient flags (`sending`,
//! `error`, `isDirty`) are never written and come back cleared.
//!
//! Restore is lenient per tab and strict per record: a tab missing its id,
//! label or preset is dropped, but any other shape or graph failure rejects
//! the whole record.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::QuireError;
use crate::ids::{ProjectId, TabId};
use crate::migrate::{migrate_version_graph, StoredVersionGraph};
use crate::session::{Message, Preset, SessionTab};
use crate::tabs::TabState;
use crate::version_graph::VersionGraph;

// ============================================================================
// Written shape
// ============================================================================

/// Durable fields of one tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTab {
    pub id: TabId,
    pub label: String,
    pub preset: Preset,
    pub project_id: Option<ProjectId>,
    pub draft: String,
    pub messages: Vec<Message>,
    pub version_graph: VersionGraph,
}

impl From<&SessionTab> for PersistedTab {
    fn from(tab: &SessionTab) -> Self {
        Self {
            id: tab.id.clone(),
            label: tab.label.clone(),
            preset: tab.preset.clone(),
            project_id: tab.project_id.clone(),
            draft: tab.draft.clone(),
            messages: tab.messages.clone(),
            version_graph: tab.version_graph.clone(),
        }
    }
}

/// The whole persisted record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTabs {
    pub tabs: Vec<PersistedTab>,
    pub active_tab_id: Option<TabId>,
}

impl PersistedTabs {
    /// Durable snapshot of `state`.
    pub fn snapshot(state: &TabState) -> Self {
        Self {
            tabs: state.tabs.iter().map(PersistedTab::from).collect(),
            active_tab_id: state.active_tab_id.clone(),
        }
    }
}

// ============================================================================
// Read shape
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTabs {
    tabs: Vec<StoredTab>,
    #[serde(default)]
    active_tab_id: Option<TabId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTab {
    #[serde(default)]
    id: Option<TabId>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    preset: Option<Preset>,
    #[serde(default)]
    project_id: Option<ProjectId>,
    #[serde(default)]
    draft: String,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    version_graph: Option<StoredVersionGraph>,
}

impl StoredTab {
    fn into_tab(self, tolerance: Duration) -> Result<Option<SessionTab>, QuireError> {
        let (Some(id), Some(label), Some(preset)) = (self.id, self.label, self.preset) else {
            return Ok(None);
        };

        let version_graph = match self.version_graph {
            Some(stored) => {
                let graph = migrate_version_graph(stored, &self.messages, tolerance);
                graph
                    .validate()
                    .map_err(|e| QuireError::CorruptState(format!("tab `{}`: {}", id, e)))?;
                graph
            }
            None => VersionGraph::start(),
        };

        Ok(Some(SessionTab {
            id,
            label,
            preset,
            project_id: self.project_id,
            draft: self.draft,
            messages: self.messages,
            version_graph,
            sending: false,
            error: None,
            is_dirty: false,
        }))
    }
}

// ============================================================================
// Restore
// ============================================================================

/// Rebuild tab state from a raw persisted record.
///
/// # Errors
///
/// Returns [`QuireError::CorruptState`] if the value does not have the record
/// shape or a graph fails to migrate into a valid one. Callers purge the
/// record in that case.
pub fn restore_state(
    raw: Value,
    max_tabs: usize,
    tolerance: Duration,
) -> Result<TabState, QuireError> {
    let stored: StoredTabs =
        serde_json::from_value(raw).map_err(|e| QuireError::CorruptState(e.to_string()))?;

    let total = stored.tabs.len();
    let mut tabs = Vec::with_capacity(total.min(max_tabs));
    for stored_tab in stored.tabs {
        if let Some(tab) = stored_tab.into_tab(tolerance)? {
            tabs.push(tab);
        }
    }

    let dropped = total - tabs.len();
    if dropped > 0 {
        debug!(dropped, "Dropped persisted tabs missing id, label or preset");
    }
    if tabs.len() > max_tabs {
        debug!(kept = max_tabs, found = tabs.len(), "Truncating restored tabs to capacity");
        tabs.truncate(max_tabs);
    }

    let active_tab_id = match stored.active_tab_id {
        Some(id) if tabs.iter().any(|t| t.id == id) => Some(id),
        _ => tabs.first().map(|t| t.id.clone()),
    };

    Ok(TabState {
        tabs,
        active_tab_id,
        max_tabs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MessageId;
    use crate::migrate::default_tolerance;
    use crate::tabs::{reduce, TabAction};
    use serde_json::json;

    fn state_with(names: &[&str]) -> TabState {
        names.iter().fold(TabState::default(), |s, name| {
            reduce(
                s,
                TabAction::CreateTab {
                    preset: Preset::new(*name, "freeform"),
                },
            )
        })
    }

    fn restore(raw: Value) -> Result<TabState, QuireError> {
        restore_state(raw, 8, default_tolerance())
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut state = state_with(&["A", "B"]);
        state.tabs[0].draft = "hello".into();
        state.tabs[0].sending = true;
        state.tabs[0].error = Some("x".into());
        state.tabs[0].is_dirty = true;

        let raw = serde_json::to_value(PersistedTabs::snapshot(&state)).unwrap();
        assert!(raw["tabs"][0].get("sending").is_none());
        assert!(raw["tabs"][0].get("isDirty").is_none());

        let restored = restore(raw).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.active_tab_id, state.active_tab_id);
        let tab = &restored.tabs[0];
        assert_eq!(tab.draft, "hello");
        assert!(!tab.sending && !tab.is_dirty && tab.error.is_none());
        assert_eq!(tab.version_graph, state.tabs[0].version_graph);
    }

    #[test]
    fn test_incomplete_tabs_are_dropped() {
        let raw = json!({
            "tabs": [
                { "id": "t1", "label": "Kept", "preset": { "name": "P", "taskType": "freeform" } },
                { "id": "t2", "label": "No preset" },
                { "label": "No id", "preset": { "name": "P", "taskType": "freeform" } }
            ],
            "activeTabId": "t2"
        });
        let state = restore(raw).unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.tabs[0].label, "Kept");
        assert!(state.tabs[0].version_graph.active_node().unwrap().is_start_sentinel());
        // Persisted active tab did not survive.
        assert_eq!(state.active_tab_id, Some(TabId::new("t1")));
    }

    #[test]
    fn test_no_survivors_means_no_active() {
        let raw = json!({ "tabs": [{ "label": "x" }], "activeTabId": "x" });
        let state = restore(raw).unwrap();
        assert!(state.is_empty());
        assert!(state.active_tab_id.is_none());
    }

    #[test]
    fn test_wrong_shape_is_corrupt() {
        assert!(matches!(restore(json!([1, 2])), Err(QuireError::CorruptState(_))));
        assert!(matches!(restore(json!({ "tabs": "no" })), Err(QuireError::CorruptState(_))));
    }

    #[test]
    fn test_invalid_graph_rejects_record() {
        let raw = json!({
            "tabs": [{
                "id": "t1", "label": "A",
                "preset": { "name": "P", "taskType": "freeform" },
                "versionGraph": {
                    "nodes": {},
                    "headId": "h", "tailId": "h", "activeId": "h"
                }
            }],
            "activeTabId": "t1"
        });
        assert!(matches!(restore(raw), Err(QuireError::CorruptState(_))));
    }

    /// Start -> a, written before versions carried originalInput / outputMessageId.
    fn legacy_graph(edited_at: &str) -> Value {
        json!({
            "nodes": {
                "s": { "id": "s", "label": "Start", "content": "",
                       "createdAt": "2024-03-01T09:00:00Z", "prevId": null, "nextId": "a" },
                "a": { "id": "a", "label": "V1", "content": "tightened",
                       "createdAt": edited_at, "prevId": "s", "nextId": null }
            },
            "headId": "s",
            "tailId": "a",
            "activeId": "a"
        })
    }

    fn message(id: &str, role: &str, at: &str) -> Value {
        json!({ "id": id, "role": role, "content": id, "createdAt": at })
    }

    #[test]
    fn test_legacy_graph_relinks_against_own_messages() {
        let preset = json!({ "name": "Rewrite", "taskType": "rewrite" });
        let raw = json!({
            "tabs": [
                {
                    "id": "t1", "label": "Linked", "preset": preset.clone(),
                    "messages": [
                        message("u1", "user", "2024-03-01T09:00:09Z"),
                        message("m1", "assistant", "2024-03-01T09:00:12Z")
                    ],
                    "versionGraph": legacy_graph("2024-03-01T09:00:10Z")
                },
                {
                    "id": "t2", "label": "Unlinked", "preset": preset,
                    "messages": [message("m9", "assistant", "2024-03-01T09:05:00Z")],
                    "versionGraph": legacy_graph("2024-03-01T09:00:10Z")
                }
            ],
            "activeTabId": "t1"
        });

        let state = restore(raw).unwrap();
        assert_eq!(state.len(), 2);

        let linked = state.tab(&TabId::new("t1")).unwrap();
        let node = linked.version_graph.active_node().unwrap();
        assert_eq!(node.original_input, "tightened");
        assert_eq!(node.output_message_id, Some(MessageId::new("m1")));
        assert_eq!(linked.active_output().unwrap().content, "m1");

        // t1's reply is inside t2's window too, but only t2's own log is searched.
        let unlinked = state.tab(&TabId::new("t2")).unwrap();
        let node = unlinked.version_graph.active_node().unwrap();
        assert_eq!(node.original_input, "tightened");
        assert!(node.output_message_id.is_none());
    }

    #[test]
    fn test_truncates_to_capacity() {
        let state = state_with(&["A", "B", "C"]);
        let raw = serde_json::to_value(PersistedTabs::snapshot(&state)).unwrap();
        let restored = restore_state(raw, 2, default_tolerance()).unwrap();
        assert_eq!(restored.len(), 2);
        // Active was "C", which did not survive.
        assert_eq!(restored.active_tab_id, Some(restored.tabs[0].id.clone()));
    }
}
