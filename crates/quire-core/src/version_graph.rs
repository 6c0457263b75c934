//! Version graph: the linear edit history of one session.
//!
//! A graph is a doubly-linked chain of immutable-content nodes stored in a flat
//! map keyed by [`NodeId`], plus one mutable "active" pointer. Nodes link by id
//! rather than by reference, so a graph clones cheaply and serializes as-is.
//!
//! Every operation takes `&self` and returns a new graph; the input is never
//! mutated. Appending after navigating back discards every node ahead of the
//! active one: history is a single branch, not a tree.
//!
//! ```text
//! head                     active              tail
//! [Start] <-> [V1] <-> [V2] <-> [V3] <-> [V4]
//!
//! append_version("V5"):
//! [Start] <-> [V1] <-> [V2] <-> [V3] <-> [V5]      (V4 is gone)
//! ```

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::START_LABEL;
use crate::errors::QuireError;
use crate::ids::{MessageId, NodeId};

// ============================================================================
// VersionMetadata
// ============================================================================

/// Opaque payload attached to a version.
///
/// The graph stores and returns it; it never interprets it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMetadata {
    /// Task type of the preset that produced the version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,

    /// Generation options in effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,

    /// Whether the version refines an earlier one.
    #[serde(default)]
    pub is_refinement: bool,

    /// The version being refined, when `is_refinement` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined_version_id: Option<NodeId>,
}

// ============================================================================
// VersionNode
// ============================================================================

/// One committed snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionNode {
    /// Unique node id.
    pub id: NodeId,

    /// Human-readable tag, e.g. "Start" or "Generated 14:02".
    pub label: String,

    /// Committed text at this point.
    pub content: String,

    /// Raw user text that produced this node.
    pub original_input: String,

    /// Assistant message generated for this node; `None` for manual snapshots.
    pub output_message_id: Option<MessageId>,

    /// Creation time. Monotonic within a graph, not unique.
    pub created_at: DateTime<Utc>,

    /// Previous node (`None` only for the head).
    pub prev_id: Option<NodeId>,

    /// Next node (`None` only for the tail).
    pub next_id: Option<NodeId>,

    /// Opaque caller payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VersionMetadata>,
}

impl VersionNode {
    /// Whether this node is the synthetic root.
    pub fn is_start_sentinel(&self) -> bool {
        self.label == START_LABEL
    }
}

// ============================================================================
// NewVersion
// ============================================================================

/// Arguments for [`VersionGraph::append_version`].
#[derive(Debug, Clone)]
pub struct NewVersion {
    content: String,
    label: String,
    original_input: Option<String>,
    output_message_id: Option<MessageId>,
    metadata: Option<VersionMetadata>,
}

impl NewVersion {
    /// A version with the given content and label.
    ///
    /// `original_input` defaults to `content`, `output_message_id` to `None`.
    pub fn new(content: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            label: label.into(),
            original_input: None,
            output_message_id: None,
            metadata: None,
        }
    }

    /// Set the raw user text that produced this version.
    pub fn with_original_input(mut self, input: impl Into<String>) -> Self {
        self.original_input = Some(input.into());
        self
    }

    /// Link the assistant message generated for this version.
    pub fn with_output_message(mut self, id: MessageId) -> Self {
        self.output_message_id = Some(id);
        self
    }

    /// Attach opaque metadata.
    pub fn with_metadata(mut self, metadata: VersionMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    fn into_node(self, prev_id: Option<NodeId>, created_at: DateTime<Utc>) -> VersionNode {
        let original_input = self.original_input.unwrap_or_else(|| self.content.clone());
        VersionNode {
            id: NodeId::generate(),
            label: self.label,
            content: self.content,
            original_input,
            output_message_id: self.output_message_id,
            created_at,
            prev_id,
            next_id: None,
            metadata: self.metadata,
        }
    }
}

// ============================================================================
// VersionGraph
// ============================================================================

/// Linear version history with a single active pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionGraph {
    nodes: BTreeMap<NodeId, VersionNode>,
    head_id: NodeId,
    tail_id: NodeId,
    active_id: NodeId,
}

impl Default for VersionGraph {
    fn default() -> Self {
        Self::start()
    }
}

impl VersionGraph {
    /// Build a single-node graph; head, tail and active all point at it.
    pub fn new(
        content: impl Into<String>,
        label: impl Into<String>,
        original_input: Option<String>,
        output_message_id: Option<MessageId>,
    ) -> Self {
        let mut version = NewVersion::new(content, label);
        version.original_input = original_input;
        version.output_message_id = output_message_id;

        let node = version.into_node(None, Utc::now());
        let id = node.id.clone();
        let mut nodes = BTreeMap::new();
        nodes.insert(id.clone(), node);

        Self {
            nodes,
            head_id: id.clone(),
            tail_id: id.clone(),
            active_id: id,
        }
    }

    /// An empty history: a lone `Start` sentinel.
    pub fn start() -> Self {
        Self::new("", START_LABEL, None, None)
    }

    /// Assemble a graph from parts. Callers must [`validate`](Self::validate) it.
    pub(crate) fn from_parts(
        nodes: BTreeMap<NodeId, VersionNode>,
        head_id: NodeId,
        tail_id: NodeId,
        active_id: NodeId,
    ) -> Self {
        Self {
            nodes,
            head_id,
            tail_id,
            active_id,
        }
    }

    pub fn head_id(&self) -> &NodeId {
        &self.head_id
    }

    pub fn tail_id(&self) -> &NodeId {
        &self.tail_id
    }

    pub fn active_id(&self) -> &NodeId {
        &self.active_id
    }

    /// All nodes keyed by id (map order, not history order).
    pub fn nodes(&self) -> &BTreeMap<NodeId, VersionNode> {
        &self.nodes
    }

    pub fn get(&self, id: &NodeId) -> Option<&VersionNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn active_node(&self) -> Option<&VersionNode> {
        self.nodes.get(&self.active_id)
    }

    /// Content of the active node.
    pub fn active_content(&self) -> &str {
        self.active_node().map(|n| n.content.as_str()).unwrap_or("")
    }

    /// Output message of `id`, or of the active node when `id` is `None`.
    pub fn output_message_id(&self, id: Option<&NodeId>) -> Option<&MessageId> {
        let id = id.unwrap_or(&self.active_id);
        self.nodes.get(id)?.output_message_id.as_ref()
    }

    // ------------------------------------------------------------------------
    // Mutating operations (copy-on-write)
    // ------------------------------------------------------------------------

    /// Commit a new version after the active node.
    ///
    /// Every node ahead of the active node is deleted first; the active node
    /// becomes the tail, then the new node is linked after it and becomes both
    /// tail and active. Use [`versions_ahead`](Self::versions_ahead) beforehand
    /// to warn about what will be discarded.
    pub fn append_version(&self, version: NewVersion) -> Self {
        let mut next = self.clone();
        let anchor_id = next.active_id.clone();

        let anchor_time = match next.nodes.get(&anchor_id) {
            Some(anchor) => anchor.created_at,
            None => {
                // Active pointer is dangling: nothing to attach to.
                let node = version.into_node(None, Utc::now());
                let id = node.id.clone();
                let mut nodes = BTreeMap::new();
                nodes.insert(id.clone(), node);
                return Self::from_parts(nodes, id.clone(), id.clone(), id);
            }
        };

        let pruned = next.prune_forward();
        if pruned > 0 {
            debug!(pruned, active = %anchor_id, "Discarded versions ahead of active node");
        }

        let created_at = Utc::now().max(anchor_time);
        let node = version.into_node(Some(anchor_id.clone()), created_at);
        let new_id = node.id.clone();

        if let Some(anchor) = next.nodes.get_mut(&anchor_id) {
            anchor.next_id = Some(new_id.clone());
        }
        next.nodes.insert(new_id.clone(), node);
        next.tail_id = new_id.clone();
        next.active_id = new_id;
        next
    }

    /// Remove every node after the active one and make the active node the tail.
    ///
    /// Returns the number of nodes removed.
    fn prune_forward(&mut self) -> usize {
        let anchor_id = self.active_id.clone();
        let mut cursor = match self.nodes.get_mut(&anchor_id) {
            Some(anchor) => anchor.next_id.take(),
            None => return 0,
        };

        let mut removed = 0;
        while let Some(id) = cursor {
            if id == anchor_id {
                break;
            }
            cursor = match self.nodes.remove(&id) {
                Some(node) => {
                    removed += 1;
                    node.next_id
                }
                None => None,
            };
        }

        self.tail_id = anchor_id;
        removed
    }

    /// Number of nodes ahead of the active one, i.e. what the next
    /// [`append_version`](Self::append_version) would discard.
    pub fn versions_ahead(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.active_node().and_then(|n| n.next_id.as_ref());
        while let Some(id) = cursor {
            if count >= self.nodes.len() {
                break;
            }
            count += 1;
            cursor = self.nodes.get(id).and_then(|n| n.next_id.as_ref());
        }
        count
    }

    /// Move the active pointer to `target`. Unknown ids leave the graph unchanged.
    pub fn jump_to(&self, target: &NodeId) -> Self {
        let mut next = self.clone();
        if next.nodes.contains_key(target) {
            next.active_id = target.clone();
        }
        next
    }

    /// Move the active pointer one step back.
    ///
    /// Returns `None` when there is no previous node or the previous node is
    /// the `Start` sentinel.
    pub fn undo(&self) -> Option<Self> {
        let prev_id = self.undo_target()?;
        let mut next = self.clone();
        next.active_id = prev_id.clone();
        Some(next)
    }

    /// Move the active pointer one step forward. Returns `None` at the tail.
    pub fn redo(&self) -> Option<Self> {
        let next_id = self.redo_target()?;
        let mut next = self.clone();
        next.active_id = next_id.clone();
        Some(next)
    }

    fn undo_target(&self) -> Option<&NodeId> {
        let prev_id = self.active_node()?.prev_id.as_ref()?;
        let prev = self.nodes.get(prev_id)?;
        if prev.is_start_sentinel() {
            return None;
        }
        Some(prev_id)
    }

    fn redo_target(&self) -> Option<&NodeId> {
        let next_id = self.active_node()?.next_id.as_ref()?;
        self.nodes.contains_key(next_id).then_some(next_id)
    }

    pub fn has_undo(&self) -> bool {
        self.undo_target().is_some()
    }

    pub fn has_redo(&self) -> bool {
        self.redo_target().is_some()
    }

    // ------------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------------

    /// Nodes in history order, head to tail.
    pub fn versions(&self) -> Vec<&VersionNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut cursor = Some(&self.head_id);
        while let Some(id) = cursor {
            if out.len() >= self.nodes.len() {
                break;
            }
            match self.nodes.get(id) {
                Some(node) => {
                    out.push(node);
                    cursor = node.next_id.as_ref();
                }
                None => break,
            }
        }
        out
    }

    /// Position of the active node in history order.
    pub fn active_index(&self) -> Option<usize> {
        self.versions().iter().position(|n| n.id == self.active_id)
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Check the structural invariants.
    ///
    /// # Errors
    ///
    /// Returns [`QuireError::CorruptGraph`] if the head or tail links are
    /// wrong, the chain has a cycle, a dangling link or an orphan, or the
    /// active pointer does not resolve.
    pub fn validate(&self) -> Result<(), QuireError> {
        let corrupt =
            |msg: String| -> Result<(), QuireError> { Err(QuireError::CorruptGraph(msg)) };

        if self.nodes.is_empty() {
            return corrupt("graph has no nodes".to_string());
        }
        for (key, node) in &self.nodes {
            if key != &node.id {
                return corrupt(format!("node stored under `{}` has id `{}`", key, node.id));
            }
        }

        match self.nodes.get(&self.head_id) {
            Some(head) if head.prev_id.is_none() => {}
            Some(_) => return corrupt(format!("head `{}` has a previous node", self.head_id)),
            None => return corrupt(format!("head `{}` is missing", self.head_id)),
        }
        match self.nodes.get(&self.tail_id) {
            Some(tail) if tail.next_id.is_none() => {}
            Some(_) => return corrupt(format!("tail `{}` has a next node", self.tail_id)),
            None => return corrupt(format!("tail `{}` is missing", self.tail_id)),
        }
        if !self.nodes.contains_key(&self.active_id) {
            return corrupt(format!("active `{}` is missing", self.active_id));
        }

        let mut seen = HashSet::new();
        let mut prev: Option<&NodeId> = None;
        let mut cursor = Some(&self.head_id);
        let mut last = &self.head_id;
        while let Some(id) = cursor {
            if !seen.insert(id) {
                return corrupt(format!("cycle at `{}`", id));
            }
            let Some(node) = self.nodes.get(id) else {
                return corrupt(format!("dangling link to `{}`", id));
            };
            if node.prev_id.as_ref() != prev {
                return corrupt(format!("back link of `{}` is inconsistent", id));
            }
            prev = Some(id);
            last = id;
            cursor = node.next_id.as_ref();
        }

        if last != &self.tail_id {
            return corrupt(format!("chain ends at `{}`, not tail `{}`", last, self.tail_id));
        }
        if seen.len() != self.nodes.len() {
            return corrupt(format!(
                "{} of {} nodes are unreachable from head",
                self.nodes.len() - seen.len(),
                self.nodes.len()
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
