//! Host-side workflows that combine the manager with external collaborators.
//!
//! The reducer only records what it is told. These functions run the usual
//! sequences around it: sending a draft (project creation, message append,
//! id back-fill, generation, commit), taking a manual snapshot, and reopening
//! a stored project in a new tab. External calls run synchronously on the
//! caller's thread.

use chrono::{Duration, Local};
use tracing::{debug, info, warn};

use crate::errors::QuireError;
use crate::ids::{MessageId, NodeId, ProjectId, TabId};
use crate::manager::TabManager;
use crate::migrate::{migrate_version_graph, StoredVersionGraph};
use crate::ports::{MessageStore, PersistenceSink, PresetCatalog};
use crate::session::{Message, MessageUpdate, Preset, Role, SessionTab};
use crate::tabs::TabAction;
use crate::version_graph::{NewVersion, VersionGraph, VersionMetadata};

// ============================================================================
// Send
// ============================================================================

/// Settings for [`send_draft`].
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Owner recorded on newly created projects.
    pub owner: String,
    /// Maximum messages the store keeps per project.
    pub message_cap: usize,
}

/// Result of [`send_draft`].
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Unknown tab, a send already in flight, or a blank draft.
    Skipped,
    /// A version was committed.
    Sent {
        project_id: ProjectId,
        version_id: NodeId,
        output_message_id: MessageId,
        /// Versions discarded because the active node was not the tail.
        pruned: usize,
    },
    /// A step failed; the message is also stored as the tab's error.
    Failed(String),
}

/// Send the tab's draft through `generate` and commit the result as a version.
///
/// Failures are never returned: they are logged, stored in the tab's `error`
/// and reported as [`SendOutcome::Failed`]. Steps that completed before the
/// failure are kept. The `sending` flag is cleared on every path.
pub fn send_draft<S, M, G>(
    manager: &mut TabManager<S>,
    store: &M,
    tab_id: &TabId,
    generate: G,
    options: &SendOptions,
) -> SendOutcome
where
    S: PersistenceSink,
    M: MessageStore + ?Sized,
    G: FnOnce(&str) -> Result<String, QuireError>,
{
    let Some(tab) = manager.state().tab(tab_id) else {
        return SendOutcome::Skipped;
    };
    if tab.sending || tab.draft.trim().is_empty() {
        return SendOutcome::Skipped;
    }
    let draft = tab.draft.clone();

    manager.dispatch(TabAction::SetSending {
        id: tab_id.clone(),
        sending: true,
    });
    manager.dispatch(TabAction::SetError {
        id: tab_id.clone(),
        error: None,
    });

    let result = run_send(manager, store, tab_id, &draft, generate, options);

    manager.dispatch(TabAction::SetSending {
        id: tab_id.clone(),
        sending: false,
    });

    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            let message = e.to_string();
            warn!(tab = %tab_id, "Send failed: {}", message);
            manager.dispatch(TabAction::SetError {
                id: tab_id.clone(),
                error: Some(message.clone()),
            });
            SendOutcome::Failed(message)
        }
    }
}

fn run_send<S, M, G>(
    manager: &mut TabManager<S>,
    store: &M,
    tab_id: &TabId,
    draft: &str,
    generate: G,
    options: &SendOptions,
) -> Result<SendOutcome, QuireError>
where
    S: PersistenceSink,
    M: MessageStore + ?Sized,
    G: FnOnce(&str) -> Result<String, QuireError>,
{
    let tab = manager
        .state()
        .tab(tab_id)
        .ok_or_else(|| QuireError::TabNotFound(tab_id.to_string()))?;
    let preset = tab.preset.clone();
    let was_dirty = tab.is_dirty;
    let (project_id, is_new) = match tab.project_id.clone() {
        Some(id) => (id, false),
        None => {
            let label = tab.label.clone();
            let created = store.create(&label, &options.owner, preset.id.as_deref())?;
            info!(project = %created.id, "Created project for tab");
            (created.id, true)
        }
    };

    let user = Message::new(Role::User, draft);
    record_message(manager, store, tab_id, &project_id, user, options.message_cap)?;

    // The project is the tab's from its first stored message, so a retry after
    // a failed generation reuses it. Dirty clears only once a version commits.
    if is_new {
        manager.dispatch(TabAction::AttachProject {
            id: tab_id.clone(),
            project_id: project_id.clone(),
        });
        if was_dirty {
            manager.dispatch(TabAction::MarkDirty {
                id: tab_id.clone(),
                dirty: true,
            });
        }
    }

    let reply = generate(draft)?;
    let assistant = Message::new(Role::Assistant, reply);
    let output_message_id =
        record_message(manager, store, tab_id, &project_id, assistant, options.message_cap)?;

    let graph = current_graph(manager, tab_id)?;
    let pruned = graph.versions_ahead();
    let metadata = VersionMetadata {
        task_type: Some(preset.task_type.clone()),
        options: preset.options.clone(),
        ..VersionMetadata::default()
    };
    let graph = graph.append_version(
        NewVersion::new(draft, format!("Generated {}", Local::now().format("%H:%M")))
            .with_original_input(draft)
            .with_output_message(output_message_id.clone())
            .with_metadata(metadata),
    );
    let version_id = graph.active_id().clone();

    manager.dispatch(TabAction::SetVersionGraph {
        id: tab_id.clone(),
        graph: graph.clone(),
    });
    manager.dispatch(TabAction::AttachProject {
        id: tab_id.clone(),
        project_id: project_id.clone(),
    });
    store.save_version_graph(&project_id, &graph)?;

    debug!(tab = %tab_id, version = %version_id, pruned, "Committed generated version");
    Ok(SendOutcome::Sent {
        project_id,
        version_id,
        output_message_id,
        pruned,
    })
}

/// Push `message` locally, append it to the store, then back-fill the store's id.
fn record_message<S, M>(
    manager: &mut TabManager<S>,
    store: &M,
    tab_id: &TabId,
    project_id: &ProjectId,
    message: Message,
    cap: usize,
) -> Result<MessageId, QuireError>
where
    S: PersistenceSink,
    M: MessageStore + ?Sized,
{
    let local_id = message.id.clone();
    manager.dispatch(TabAction::PushMessage {
        id: tab_id.clone(),
        message: message.clone(),
    });

    let result = store.append_messages(project_id, std::slice::from_ref(&message), cap)?;
    let Some(created) = result.created.into_iter().next() else {
        return Ok(local_id);
    };

    if created.id != local_id {
        manager.dispatch(TabAction::UpdateMessage {
            id: tab_id.clone(),
            message_id: local_id,
            update: MessageUpdate::assign_id(created.id.clone()),
        });
    }
    Ok(created.id)
}

fn current_graph<S: PersistenceSink>(
    manager: &TabManager<S>,
    tab_id: &TabId,
) -> Result<VersionGraph, QuireError> {
    manager
        .state()
        .tab(tab_id)
        .map(|t| t.version_graph.clone())
        .ok_or_else(|| QuireError::TabNotFound(tab_id.to_string()))
}

// ============================================================================
// Snapshot
// ============================================================================

/// Commit the tab's draft as a manual version (no output message).
///
/// Returns the number of versions discarded because the active node was not
/// the tail. The new history is saved to the tab's project, if it has one,
/// through [`commit_graph`].
pub fn snapshot_draft<S, M>(
    manager: &mut TabManager<S>,
    store: &M,
    tab_id: &TabId,
    label: Option<&str>,
) -> Result<usize, QuireError>
where
    S: PersistenceSink,
    M: MessageStore + ?Sized,
{
    let tab = manager
        .state()
        .tab(tab_id)
        .ok_or_else(|| QuireError::TabNotFound(tab_id.to_string()))?;
    let draft = tab.draft.clone();
    let graph = &tab.version_graph;

    let label = label
        .map(str::to_string)
        .unwrap_or_else(|| format!("Snapshot {}", Local::now().format("%H:%M")));
    let pruned = graph.versions_ahead();
    let graph = graph.append_version(NewVersion::new(draft, label));

    commit_graph(manager, store, tab_id, graph);
    Ok(pruned)
}

const HISTORY_SAVE_ERROR: &str = "Could not save history";

/// Replace the tab's version graph and save it to the tab's project.
///
/// Tabs without a project only change locally. A failed save is logged and
/// stored as the tab's error; the new graph stays in place. The next
/// successful save clears that error.
pub fn commit_graph<S, M>(
    manager: &mut TabManager<S>,
    store: &M,
    tab_id: &TabId,
    graph: VersionGraph,
) where
    S: PersistenceSink,
    M: MessageStore + ?Sized,
{
    let Some(tab) = manager.state().tab(tab_id) else {
        return;
    };
    let project_id = tab.project_id.clone();
    let stale_error = tab
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with(HISTORY_SAVE_ERROR));
    let saved = match &project_id {
        Some(project_id) => store.save_version_graph(project_id, &graph),
        None => Ok(()),
    };

    manager.dispatch(TabAction::SetVersionGraph {
        id: tab_id.clone(),
        graph,
    });

    match saved {
        Err(e) => {
            warn!(tab = %tab_id, "Failed to save history to project: {}", e);
            manager.dispatch(TabAction::SetError {
                id: tab_id.clone(),
                error: Some(format!("{}: {}", HISTORY_SAVE_ERROR, e)),
            });
        }
        Ok(()) if stale_error => {
            manager.dispatch(TabAction::SetError {
                id: tab_id.clone(),
                error: None,
            });
        }
        Ok(()) => {}
    }
}

// ============================================================================
// Open project
// ============================================================================

/// Settings for [`open_project`].
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Newest messages to load.
    pub limit: usize,
    /// Relink window for legacy graphs.
    pub tolerance: Duration,
}

/// Open a stored project in a new tab and make it active.
///
/// The project's preset is looked up in `catalog` by its stored id; `fallback`
/// is used when it has none or the catalog no longer has it. If the project is
/// already open its tab is activated instead.
///
/// # Errors
///
/// Returns [`QuireError::TabLimitReached`] when no tab can be opened,
/// [`QuireError::CorruptGraph`] when the stored graph cannot be upgraded into
/// a valid one, and store errors as they come.
pub fn open_project<S, M, C>(
    manager: &mut TabManager<S>,
    store: &M,
    catalog: &C,
    project_id: &ProjectId,
    fallback: Preset,
    options: &OpenOptions,
) -> Result<TabId, QuireError>
where
    S: PersistenceSink,
    M: MessageStore + ?Sized,
    C: PresetCatalog + ?Sized,
{
    let already_open = manager
        .state()
        .tabs
        .iter()
        .find(|t| t.project_id.as_ref() == Some(project_id))
        .map(|t| t.id.clone());
    if let Some(id) = already_open {
        manager.dispatch(TabAction::SwitchTab { id: id.clone() });
        return Ok(id);
    }
    if manager.state().is_full() {
        return Err(QuireError::TabLimitReached(manager.state().max_tabs));
    }

    let snapshot = store.get(project_id, options.limit)?;

    let version_graph = match snapshot.version_graph {
        Some(raw) => {
            let stored: StoredVersionGraph = serde_json::from_value(raw)
                .map_err(|e| QuireError::CorruptGraph(format!("project `{}`: {}", project_id, e)))?;
            let graph = migrate_version_graph(stored, &snapshot.messages, options.tolerance);
            graph.validate()?;
            graph
        }
        None => VersionGraph::start(),
    };

    let preset = match snapshot.preset_id.as_deref() {
        Some(preset_id) => catalog.find(preset_id).unwrap_or_else(|e| {
            debug!("Using fallback preset: {}", e);
            fallback
        }),
        None => fallback,
    };

    let label = snapshot
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| preset.name.clone());

    let mut tab = SessionTab::new(label, preset);
    tab.project_id = Some(project_id.clone());
    tab.draft = version_graph.active_content().to_string();
    tab.messages = snapshot.messages;
    tab.version_graph = version_graph;
    let tab_id = tab.id.clone();

    manager.dispatch(TabAction::InsertTab { tab: Box::new(tab) });
    info!(project = %project_id, tab = %tab_id, "Opened project");
    Ok(tab_id)
}

// ============================================================================
// Tests
// ============================================================================
