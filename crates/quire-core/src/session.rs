//! Session tab types.
//!
//! A [`SessionTab`] is one editing context: identity, label, bound preset,
//! message log, version graph and the transient flags a host shows while a
//! request is in flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, ProjectId, TabId};
use crate::version_graph::VersionGraph;

// ============================================================================
// Messages
// ============================================================================

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            _ => Err(format!("Unknown message role: '{}'", s)),
        }
    }
}

/// One entry of a tab's message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A message with a provisional local id, stamped now.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// Patch applied by `UpdateMessage`. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageUpdate {
    /// Server-assigned id replacing the provisional one.
    pub id: Option<MessageId>,
    pub content: Option<String>,
}

impl MessageUpdate {
    /// Back-fill a server-assigned id.
    pub fn assign_id(id: MessageId) -> Self {
        Self {
            id: Some(id),
            content: None,
        }
    }

    pub(crate) fn apply(self, message: &mut Message) {
        if let Some(id) = self.id {
            message.id = id;
        }
        if let Some(content) = self.content {
            message.content = content;
        }
    }
}

// ============================================================================
// Preset
// ============================================================================

/// Named configuration record a tab is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub task_type: String,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

impl Preset {
    pub fn new(name: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            task_type: task_type.into(),
            options: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = Some(options);
        self
    }
}

// ============================================================================
// SessionTab
// ============================================================================

/// One editing session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTab {
    pub id: TabId,
    pub label: String,
    pub preset: Preset,
    /// Set after the first successful append to the message store.
    pub project_id: Option<ProjectId>,
    /// Live, uncommitted text.
    pub draft: String,
    pub messages: Vec<Message>,
    pub version_graph: VersionGraph,
    /// Set and cleared by the caller around an external request.
    pub sending: bool,
    pub error: Option<String>,
    /// Draft edited since the last project attach or explicit clear.
    pub is_dirty: bool,
}

impl SessionTab {
    /// A fresh tab with an empty history.
    pub fn new(label: impl Into<String>, preset: Preset) -> Self {
        Self {
            id: TabId::generate(),
            label: label.into(),
            preset,
            project_id: None,
            draft: String::new(),
            messages: Vec::new(),
            version_graph: VersionGraph::start(),
            sending: false,
            error: None,
            is_dirty: false,
        }
    }

    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Assistant messages in log order.
    pub fn assistant_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_assistant())
    }

    /// Assistant output linked to the active version, if it is still in the log.
    pub fn active_output(&self) -> Option<&Message> {
        let id = self.version_graph.output_message_id(None)?;
        self.message(id)
    }
}

/// First label not among `taken`: `base`, then `base 2`, `base 3`, …
pub fn unique_label<'a>(base: &str, taken: impl IntoIterator<Item = &'a str>) -> String {
    let taken: Vec<&str> = taken.into_iter().collect();
    if !taken.contains(&base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{} {}", base, n))
        .find(|candidate| !taken.contains(&candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version_graph::NewVersion;

    #[test]
    fn test_new_tab_defaults() {
        let tab = SessionTab::new("Rewrite", Preset::new("Rewrite", "rewrite"));
        assert!(tab.project_id.is_none());
        assert!(tab.draft.is_empty());
        assert!(!tab.is_dirty && !tab.sending);
        assert!(tab.error.is_none());
        assert_eq!(tab.version_graph.len(), 1);
        assert!(tab.version_graph.active_node().unwrap().is_start_sentinel());
    }

    #[test]
    fn test_unique_label() {
        assert_eq!(unique_label("Rewrite", ["Other"]), "Rewrite");
        assert_eq!(unique_label("Rewrite", ["Rewrite"]), "Rewrite 2");
        assert_eq!(
            unique_label("Rewrite", ["Rewrite", "Rewrite 2", "Rewrite 3"]),
            "Rewrite 4"
        );
        assert_eq!(unique_label("Rewrite", ["Rewrite", "Rewrite 3"]), "Rewrite 2");
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!("Assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert!("bot".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
    }

    #[test]
    fn test_message_update() {
        let mut message = Message::new(Role::User, "hi");
        MessageUpdate::assign_id(MessageId::new("server-1")).apply(&mut message);
        assert_eq!(message.id, MessageId::new("server-1"));
        assert_eq!(message.content, "hi");
    }

    #[test]
    fn test_active_output() {
        let mut tab = SessionTab::new("T", Preset::new("T", "freeform"));
        let reply = Message::new(Role::Assistant, "answer");
        tab.version_graph = tab
            .version_graph
            .append_version(NewVersion::new("q", "V1").with_output_message(reply.id.clone()));
        assert!(tab.active_output().is_none());
        tab.messages.push(reply.clone());
        assert_eq!(tab.active_output(), Some(&reply));
        assert_eq!(tab.assistant_messages().count(), 1);
    }
}
