//! Tab state and its transition function.
//!
//! [`reduce`] is the only way tab state changes. It consumes the state and
//! returns the next one; it never fails. Actions naming an unknown tab, moves
//! out of range and creates past capacity leave the state unchanged.

use tracing::debug;

use crate::constants::MAX_TABS;
use crate::ids::{MessageId, ProjectId, TabId};
use crate::session::{unique_label, Message, MessageUpdate, Preset, SessionTab};
use crate::version_graph::VersionGraph;

// ============================================================================
// TabState
// ============================================================================

/// Open tabs in display order, plus the active pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct TabState {
    pub tabs: Vec<SessionTab>,
    pub active_tab_id: Option<TabId>,
    /// Capacity; not persisted.
    pub max_tabs: usize,
}

impl Default for TabState {
    fn default() -> Self {
        Self::with_capacity(MAX_TABS)
    }
}

impl TabState {
    /// Empty state holding at most `max_tabs` tabs.
    pub fn with_capacity(max_tabs: usize) -> Self {
        Self {
            tabs: Vec::new(),
            active_tab_id: None,
            max_tabs,
        }
    }

    pub fn active_tab(&self) -> Option<&SessionTab> {
        self.tab(self.active_tab_id.as_ref()?)
    }

    pub fn tab(&self, id: &TabId) -> Option<&SessionTab> {
        self.tabs.iter().find(|t| &t.id == id)
    }

    pub fn tab_index(&self, id: &TabId) -> Option<usize> {
        self.tabs.iter().position(|t| &t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tabs.len() >= self.max_tabs
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.tabs.iter().map(|t| t.label.as_str())
    }

    fn tab_mut(&mut self, id: &TabId) -> Option<&mut SessionTab> {
        self.tabs.iter_mut().find(|t| &t.id == id)
    }
}

// ============================================================================
// Actions
// ============================================================================

/// A requested state transition.
#[derive(Debug, Clone)]
pub enum TabAction {
    /// Open a fresh tab bound to `preset` and make it active.
    CreateTab { preset: Preset },
    /// Open a prepared tab (e.g. a reopened project) and make it active.
    InsertTab { tab: Box<SessionTab> },
    CloseTab { id: TabId },
    SwitchTab { id: TabId },
    /// Move the tab at `from` to position `to`.
    ReorderTabs { from: usize, to: usize },
    UpdateDraft { id: TabId, text: String },
    PushMessage { id: TabId, message: Message },
    UpdateMessage {
        id: TabId,
        message_id: MessageId,
        update: MessageUpdate,
    },
    AttachProject { id: TabId, project_id: ProjectId },
    SetVersionGraph { id: TabId, graph: VersionGraph },
    SetPreset { id: TabId, preset: Preset },
    MarkDirty { id: TabId, dirty: bool },
    SetSending { id: TabId, sending: bool },
    SetError { id: TabId, error: Option<String> },
    /// Close every tab.
    Reset,
}

impl TabAction {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateTab { .. } => "create_tab",
            Self::InsertTab { .. } => "insert_tab",
            Self::CloseTab { .. } => "close_tab",
            Self::SwitchTab { .. } => "switch_tab",
            Self::ReorderTabs { .. } => "reorder_tabs",
            Self::UpdateDraft { .. } => "update_draft",
            Self::PushMessage { .. } => "push_message",
            Self::UpdateMessage { .. } => "update_message",
            Self::AttachProject { .. } => "attach_project",
            Self::SetVersionGraph { .. } => "set_version_graph",
            Self::SetPreset { .. } => "set_preset",
            Self::MarkDirty { .. } => "mark_dirty",
            Self::SetSending { .. } => "set_sending",
            Self::SetError { .. } => "set_error",
            Self::Reset => "reset",
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Apply `action` to `state`.
pub fn reduce(mut state: TabState, action: TabAction) -> TabState {
    debug!(action = action.name(), "Reducing tab action");

    match action {
        TabAction::CreateTab { preset } => {
            if state.is_full() {
                debug!(max = state.max_tabs, "Tab limit reached, create ignored");
                return state;
            }
            let label = unique_label(&preset.name, state.labels());
            let tab = SessionTab::new(label, preset);
            state.active_tab_id = Some(tab.id.clone());
            state.tabs.push(tab);
        }

        TabAction::InsertTab { tab } => {
            if state.is_full() || state.tab(&tab.id).is_some() {
                return state;
            }
            let mut tab = *tab;
            tab.label = unique_label(&tab.label, state.labels());
            state.active_tab_id = Some(tab.id.clone());
            state.tabs.push(tab);
        }

        TabAction::CloseTab { id } => {
            let Some(index) = state.tab_index(&id) else {
                return state;
            };
            state.tabs.remove(index);
            if state.active_tab_id.as_ref() == Some(&id) {
                state.active_tab_id = state
                    .tabs
                    .get(index)
                    .or_else(|| index.checked_sub(1).and_then(|i| state.tabs.get(i)))
                    .or_else(|| state.tabs.first())
                    .map(|t| t.id.clone());
            }
        }

        TabAction::SwitchTab { id } => {
            if state.tab(&id).is_some() {
                state.active_tab_id = Some(id);
            }
        }

        TabAction::ReorderTabs { from, to } => {
            let len = state.tabs.len();
            if from == to || from >= len || to >= len {
                return state;
            }
            let tab = state.tabs.remove(from);
            state.tabs.insert(to, tab);
        }

        TabAction::UpdateDraft { id, text } => {
            if let Some(tab) = state.tab_mut(&id) {
                tab.draft = text;
                tab.is_dirty = true;
            }
        }

        TabAction::PushMessage { id, message } => {
            if let Some(tab) = state.tab_mut(&id) {
                tab.messages.push(message);
            }
        }

        TabAction::UpdateMessage {
            id,
            message_id,
            update,
        } => {
            if let Some(message) = state
                .tab_mut(&id)
                .and_then(|t| t.messages.iter_mut().find(|m| m.id == message_id))
            {
                update.apply(message);
            }
        }

        TabAction::AttachProject { id, project_id } => {
            if let Some(tab) = state.tab_mut(&id) {
                tab.project_id = Some(project_id);
                tab.is_dirty = false;
            }
        }

        TabAction::SetVersionGraph { id, graph } => {
            if let Some(tab) = state.tab_mut(&id) {
                tab.version_graph = graph;
            }
        }

        TabAction::SetPreset { id, preset } => {
            if let Some(tab) = state.tab_mut(&id) {
                tab.preset = preset;
            }
        }

        TabAction::MarkDirty { id, dirty } => {
            if let Some(tab) = state.tab_mut(&id) {
                tab.is_dirty = dirty;
            }
        }

        TabAction::SetSending { id, sending } => {
            if let Some(tab) = state.tab_mut(&id) {
                tab.sending = sending;
            }
        }

        TabAction::SetError { id, error } => {
            if let Some(tab) = state.tab_mut(&id) {
                tab.error = error;
            }
        }

        TabAction::Reset => {
            state.tabs.clear();
            state.active_tab_id = None;
        }
    }

    state
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use crate::version_graph::NewVersion;

    fn preset(name: &str) -> Preset {
        Preset::new(name, "freeform")
    }

    fn with_tabs(names: &[&str]) -> TabState {
        names.iter().fold(TabState::default(), |s, name| {
            reduce(s, TabAction::CreateTab { preset: preset(name) })
        })
    }

    fn ids(state: &TabState) -> Vec<TabId> {
        state.tabs.iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn test_create_tab_becomes_active() {
        let state = with_tabs(&["Rewrite"]);
        assert_eq!(state.len(), 1);
        let tab = state.active_tab().unwrap();
        assert_eq!(tab.label, "Rewrite");
        assert_eq!(tab.version_graph.len(), 1);
        assert!(!tab.is_dirty);
    }

    #[test]
    fn test_create_tab_deduplicates_labels() {
        let state = with_tabs(&["Rewrite", "Rewrite", "Rewrite"]);
        let labels: Vec<&str> = state.labels().collect();
        assert_eq!(labels, vec!["Rewrite", "Rewrite 2", "Rewrite 3"]);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let names = vec!["T"; MAX_TABS];
        let state = with_tabs(&names);
        assert!(state.is_full());
        let active = state.active_tab_id.clone();

        let state = reduce(state, TabAction::CreateTab { preset: preset("T") });
        assert_eq!(state.len(), MAX_TABS);
        assert_eq!(state.active_tab_id, active);
    }

    #[test]
    fn test_close_active_picks_next_then_previous() {
        let state = with_tabs(&["A", "B", "C"]);
        let [a, b, c]: [TabId; 3] = ids(&state).try_into().unwrap();

        // Closing the middle active tab activates the one that slid into its place.
        let state = reduce(state, TabAction::SwitchTab { id: b.clone() });
        let state = reduce(state, TabAction::CloseTab { id: b });
        assert_eq!(state.active_tab_id, Some(c.clone()));

        // Closing the last tab activates the one before it.
        let state = reduce(state, TabAction::CloseTab { id: c });
        assert_eq!(state.active_tab_id, Some(a.clone()));

        let state = reduce(state, TabAction::CloseTab { id: a });
        assert!(state.is_empty());
        assert_eq!(state.active_tab_id, None);
    }

    #[test]
    fn test_close_inactive_keeps_active() {
        let state = with_tabs(&["A", "B"]);
        let [a, b]: [TabId; 2] = ids(&state).try_into().unwrap();
        let state = reduce(state, TabAction::CloseTab { id: a });
        assert_eq!(state.active_tab_id, Some(b));
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let state = with_tabs(&["A"]);
        let ghost = TabId::new("ghost");
        let actions = vec![
            TabAction::CloseTab { id: ghost.clone() },
            TabAction::SwitchTab { id: ghost.clone() },
            TabAction::UpdateDraft {
                id: ghost.clone(),
                text: "x".into(),
            },
            TabAction::SetSending {
                id: ghost.clone(),
                sending: true,
            },
            TabAction::AttachProject {
                id: ghost,
                project_id: ProjectId::new("p"),
            },
        ];
        for action in actions {
            let next = reduce(state.clone(), action);
            assert_eq!(next, state);
        }
    }

    #[test]
    fn test_reorder() {
        let state = with_tabs(&["A", "B", "C"]);
        let before = ids(&state);

        assert_eq!(reduce(state.clone(), TabAction::ReorderTabs { from: 1, to: 1 }), state);
        assert_eq!(reduce(state.clone(), TabAction::ReorderTabs { from: 0, to: 3 }), state);
        assert_eq!(reduce(state.clone(), TabAction::ReorderTabs { from: 5, to: 0 }), state);

        let moved = reduce(state, TabAction::ReorderTabs { from: 0, to: 2 });
        assert_eq!(
            ids(&moved),
            vec![before[1].clone(), before[2].clone(), before[0].clone()]
        );
    }

    #[test]
    fn test_draft_marks_dirty_and_attach_clears_it() {
        let state = with_tabs(&["A"]);
        let id = state.tabs[0].id.clone();

        let state = reduce(
            state,
            TabAction::UpdateDraft {
                id: id.clone(),
                text: String::new(),
            },
        );
        assert!(state.tabs[0].is_dirty, "dirty even when the text is empty");

        let state = reduce(
            state,
            TabAction::AttachProject {
                id: id.clone(),
                project_id: ProjectId::new("p1"),
            },
        );
        assert!(!state.tabs[0].is_dirty);
        assert_eq!(state.tabs[0].project_id, Some(ProjectId::new("p1")));
    }

    #[test]
    fn test_update_message_backfills_id() {
        let state = with_tabs(&["A"]);
        let id = state.tabs[0].id.clone();
        let message = Message::new(Role::User, "hello");
        let local = message.id.clone();

        let state = reduce(state, TabAction::PushMessage { id: id.clone(), message });
        let state = reduce(
            state,
            TabAction::UpdateMessage {
                id: id.clone(),
                message_id: local,
                update: MessageUpdate::assign_id(MessageId::new("srv-1")),
            },
        );
        assert_eq!(state.tabs[0].messages[0].id, MessageId::new("srv-1"));

        // Unknown message id is ignored.
        let again = reduce(
            state.clone(),
            TabAction::UpdateMessage {
                id,
                message_id: MessageId::new("nope"),
                update: MessageUpdate::assign_id(MessageId::new("x")),
            },
        );
        assert_eq!(again, state);
    }

    #[test]
    fn test_insert_tab() {
        let state = with_tabs(&["Doc"]);
        let mut tab = SessionTab::new("Doc", preset("Doc"));
        tab.project_id = Some(ProjectId::new("p"));
        let tab_id = tab.id.clone();

        let state = reduce(state, TabAction::InsertTab { tab: Box::new(tab.clone()) });
        assert_eq!(state.len(), 2);
        assert_eq!(state.active_tab_id, Some(tab_id));
        assert_eq!(state.active_tab().unwrap().label, "Doc 2");

        // Same id twice is ignored.
        let again = reduce(state.clone(), TabAction::InsertTab { tab: Box::new(tab) });
        assert_eq!(again.len(), 2);
    }

    #[test]
    fn test_field_replacements_and_reset() {
        let state = with_tabs(&["A"]);
        let id = state.tabs[0].id.clone();
        let graph = VersionGraph::start().append_version(NewVersion::new("v", "V1"));

        let state = reduce(
            state,
            TabAction::SetVersionGraph {
                id: id.clone(),
                graph: graph.clone(),
            },
        );
        let state = reduce(
            state,
            TabAction::SetError {
                id: id.clone(),
                error: Some("boom".into()),
            },
        );
        let state = reduce(
            state,
            TabAction::SetPreset {
                id: id.clone(),
                preset: preset("Other"),
            },
        );
        let tab = &state.tabs[0];
        assert_eq!(tab.version_graph, graph);
        assert_eq!(tab.error.as_deref(), Some("boom"));
        assert_eq!(tab.preset.name, "Other");
        assert_eq!(tab.label, "A", "label is not derived from the preset");

        let state = reduce(state, TabAction::Reset);
        assert!(state.is_empty());
        assert!(state.active_tab_id.is_none());
    }
}
