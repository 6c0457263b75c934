//! Upgrade of version graphs persisted in the legacy node shape.
//!
//! Older records stored nodes without `originalInput` and `outputMessageId`.
//! There is no schema version in the record, so a node is recognised as legacy
//! by shape: either field absent. An explicit `outputMessageId: null` is the
//! current shape and is not legacy, which is why the stored form keeps
//! "absent" and "null" apart.
//!
//! For each legacy node the missing fields are backfilled (`originalInput :=
//! content`, `outputMessageId := null`) and the node is relinked to the first
//! assistant message, in log order, whose timestamp falls within the tolerance
//! window of the node's `createdAt`. First match wins, not closest match, so
//! clustered timestamps can link the wrong message. That is a known limitation
//! of the heuristic.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::constants::DEFAULT_MIGRATION_TOLERANCE_SECS;
use crate::ids::{MessageId, NodeId};
use crate::session::Message;
use crate::version_graph::{VersionGraph, VersionMetadata, VersionNode};

// ============================================================================
// Stored shape
// ============================================================================

/// A node as found in persisted data, legacy or current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredVersionNode {
    pub id: NodeId,
    pub label: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_input: Option<String>,
    /// `None` = field absent, `Some(None)` = explicit null.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub output_message_id: Option<Option<MessageId>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub prev_id: Option<NodeId>,
    #[serde(default)]
    pub next_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VersionMetadata>,
}

fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl StoredVersionNode {
    /// Whether the node predates `originalInput` / `outputMessageId`.
    pub fn is_legacy(&self) -> bool {
        self.original_input.is_none() || self.output_message_id.is_none()
    }
}

impl From<VersionNode> for StoredVersionNode {
    fn from(node: VersionNode) -> Self {
        Self {
            id: node.id,
            label: node.label,
            content: node.content,
            original_input: Some(node.original_input),
            output_message_id: Some(node.output_message_id),
            created_at: node.created_at,
            prev_id: node.prev_id,
            next_id: node.next_id,
            metadata: node.metadata,
        }
    }
}

/// A graph as found in persisted data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredVersionGraph {
    pub nodes: BTreeMap<NodeId, StoredVersionNode>,
    pub head_id: NodeId,
    pub tail_id: NodeId,
    pub active_id: NodeId,
}

impl StoredVersionGraph {
    /// Number of nodes in the legacy shape.
    pub fn legacy_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_legacy()).count()
    }

    pub fn needs_migration(&self) -> bool {
        self.nodes.values().any(StoredVersionNode::is_legacy)
    }
}

impl From<VersionGraph> for StoredVersionGraph {
    fn from(graph: VersionGraph) -> Self {
        let head_id = graph.head_id().clone();
        let tail_id = graph.tail_id().clone();
        let active_id = graph.active_id().clone();
        let nodes = graph
            .nodes()
            .iter()
            .map(|(id, node)| (id.clone(), StoredVersionNode::from(node.clone())))
            .collect();
        Self {
            nodes,
            head_id,
            tail_id,
            active_id,
        }
    }
}

// ============================================================================
// Migration
// ============================================================================

/// Default relink window.
pub fn default_tolerance() -> Duration {
    Duration::seconds(DEFAULT_MIGRATION_TOLERANCE_SECS)
}

/// Convert a stored graph to the current shape, upgrading legacy nodes.
///
/// `messages` is the session's message log; only assistant messages are
/// considered for relinking. When no node is legacy the fields are moved over
/// unchanged. The result is not validated; callers that load untrusted data
/// should call [`VersionGraph::validate`].
pub fn migrate_version_graph(
    graph: StoredVersionGraph,
    messages: &[Message],
    tolerance: Duration,
) -> VersionGraph {
    let legacy = graph.legacy_count();
    let assistant: Vec<&Message> = messages.iter().filter(|m| m.is_assistant()).collect();
    let mut relinked = 0usize;

    let nodes = graph
        .nodes
        .into_iter()
        .map(|(id, stored)| {
            let original_input = stored
                .original_input
                .unwrap_or_else(|| stored.content.clone());

            let output_message_id = match stored.output_message_id {
                Some(present) => present,
                None if stored.label == crate::constants::START_LABEL => None,
                None => {
                    let found = find_near(&assistant, stored.created_at, tolerance);
                    if found.is_some() {
                        relinked += 1;
                    }
                    found
                }
            };

            let node = VersionNode {
                id: stored.id,
                label: stored.label,
                content: stored.content,
                original_input,
                output_message_id,
                created_at: stored.created_at,
                prev_id: stored.prev_id,
                next_id: stored.next_id,
                metadata: stored.metadata,
            };
            (id, node)
        })
        .collect();

    if legacy > 0 {
        debug!(legacy, relinked, "Migrated legacy version graph nodes");
    }

    VersionGraph::from_parts(nodes, graph.head_id, graph.tail_id, graph.active_id)
}

/// First assistant message, in log order, within `tolerance` of `at`.
fn find_near(assistant: &[&Message], at: DateTime<Utc>, tolerance: Duration) -> Option<MessageId> {
    assistant
        .iter()
        .find(|m| {
            let delta = m.created_at - at;
            delta <= tolerance && delta >= -tolerance
        })
        .map(|m| m.id.clone())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use crate::version_graph::NewVersion;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn message(id: &str, role: Role, secs: i64) -> Message {
        Message {
            id: MessageId::new(id),
            role,
            content: format!("content of {}", id),
            created_at: at(secs),
        }
    }

    /// Start -> a -> b in the legacy shape (no originalInput / outputMessageId).
    fn legacy_json() -> serde_json::Value {
        json!({
            "nodes": {
                "s": { "id": "s", "label": "Start", "content": "", "createdAt": at(0),
                       "prevId": null, "nextId": "a" },
                "a": { "id": "a", "label": "V1", "content": "first", "createdAt": at(10),
                       "prevId": "s", "nextId": "b" },
                "b": { "id": "b", "label": "V2", "content": "second", "createdAt": at(100),
                       "prevId": "a", "nextId": null }
            },
            "headId": "s",
            "tailId": "b",
            "activeId": "b"
        })
    }

    fn legacy_graph() -> StoredVersionGraph {
        serde_json::from_value(legacy_json()).unwrap()
    }

    #[test]
    fn test_detects_legacy_by_shape() {
        let graph = legacy_graph();
        assert!(graph.needs_migration());
        assert_eq!(graph.legacy_count(), 3);
        assert_eq!(graph.nodes[&NodeId::new("a")].output_message_id, None);
    }

    #[test]
    fn test_explicit_null_is_current_shape() {
        let mut value = legacy_json();
        for node in value["nodes"].as_object_mut().unwrap().values_mut() {
            let content = node["content"].clone();
            node["originalInput"] = content;
            node["outputMessageId"] = serde_json::Value::Null;
        }
        let graph: StoredVersionGraph = serde_json::from_value(value).unwrap();
        assert!(!graph.needs_migration());
        assert_eq!(graph.nodes[&NodeId::new("a")].output_message_id, Some(None));
    }

    #[test]
    fn test_backfills_and_relinks_within_window() {
        let messages = vec![
            message("u1", Role::User, 9),
            message("m1", Role::Assistant, 13),
            message("m2", Role::Assistant, 98),
        ];
        let g = migrate_version_graph(legacy_graph(), &messages, default_tolerance());
        g.validate().unwrap();

        let a = g.get(&NodeId::new("a")).unwrap();
        assert_eq!(a.original_input, "first");
        assert_eq!(a.output_message_id, Some(MessageId::new("m1")));
        let b = g.get(&NodeId::new("b")).unwrap();
        assert_eq!(b.output_message_id, Some(MessageId::new("m2")));
        let s = g.get(&NodeId::new("s")).unwrap();
        assert_eq!(s.output_message_id, None, "sentinel is never relinked");
    }

    #[test]
    fn test_user_messages_are_ignored() {
        let messages = vec![message("u1", Role::User, 10)];
        let g = migrate_version_graph(legacy_graph(), &messages, default_tolerance());
        assert_eq!(g.output_message_id(Some(&NodeId::new("a"))), None);
    }

    #[test]
    fn test_outside_window_stays_unlinked() {
        let messages = vec![message("m1", Role::Assistant, 16)];
        let g = migrate_version_graph(legacy_graph(), &messages, default_tolerance());
        assert_eq!(g.output_message_id(Some(&NodeId::new("a"))), None);
    }

    #[test]
    fn test_window_is_inclusive() {
        let messages = vec![message("m1", Role::Assistant, 15)];
        let g = migrate_version_graph(legacy_graph(), &messages, default_tolerance());
        assert_eq!(
            g.output_message_id(Some(&NodeId::new("a"))),
            Some(&MessageId::new("m1"))
        );
    }

    #[test]
    fn test_first_match_wins_over_closest() {
        // m_far is 4s away but listed first; m_near is 0s away.
        let messages = vec![
            message("m_far", Role::Assistant, 14),
            message("m_near", Role::Assistant, 10),
        ];
        let g = migrate_version_graph(legacy_graph(), &messages, default_tolerance());
        assert_eq!(
            g.output_message_id(Some(&NodeId::new("a"))),
            Some(&MessageId::new("m_far"))
        );
    }

    #[test]
    fn test_current_graph_unchanged() {
        let g = VersionGraph::start()
            .append_version(NewVersion::new("x", "V1").with_output_message(MessageId::new("m")))
            .append_version(NewVersion::new("y", "V2"));
        let stored = StoredVersionGraph::from(g.clone());
        assert!(!stored.needs_migration());

        let messages = vec![message("other", Role::Assistant, 0)];
        let migrated = migrate_version_graph(stored, &messages, Duration::days(365 * 100));
        assert_eq!(migrated, g);
    }

    #[test]
    fn test_migration_is_idempotent() {
        let messages = vec![message("m1", Role::Assistant, 12)];
        let once = migrate_version_graph(legacy_graph(), &messages, default_tolerance());
        let twice = migrate_version_graph(
            StoredVersionGraph::from(once.clone()),
            &messages,
            default_tolerance(),
        );
        assert_eq!(once, twice);

        // Also through a JSON round trip, the way restore sees it.
        let json = serde_json::to_value(&once).unwrap();
        let stored: StoredVersionGraph = serde_json::from_value(json).unwrap();
        assert!(!stored.needs_migration());
        assert_eq!(migrate_version_graph(stored, &messages, default_tolerance()), once);
    }
}
