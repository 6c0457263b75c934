//! Quire Engine – wires configuration, stores and the tab manager together.
//!
//! The [`QuireEngine`] is the entry point for hosts that want the file-backed
//! setup: tab state under `<data_dir>/state`, projects under
//! `<data_dir>/projects` and presets from `<data_dir>/presets.yaml`. It also
//! resolves the short tab and version references the CLI accepts.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::QuireConfig;
use crate::constants::CONFIG_FILENAME;
use crate::db_adapter::{DbKeyValueStore, DbMessageStore, DbPresetCatalog};
use crate::errors::QuireError;
use crate::ids::{NodeId, ProjectId, TabId};
use crate::manager::TabManager;
use crate::ports::{KvPersistence, PresetCatalog};
use crate::session::SessionTab;
use crate::session_flow::{
    commit_graph, open_project, send_draft, snapshot_draft, OpenOptions, SendOptions,
    SendOutcome,
};
use crate::tabs::TabAction;
use crate::version_graph::VersionGraph;

/// Minimum length of an id prefix accepted as a reference.
pub const MIN_PREFIX_LEN: usize = 4;

/// Sink used by the file-backed engine.
pub type FileSink = KvPersistence<DbKeyValueStore>;

// ============================================================================
// QuireEngine
// ============================================================================

/// File-backed Quire session.
///
/// # Example
///
/// ```ignore
/// use quire_core::QuireEngine;
///
/// let mut engine = QuireEngine::with_defaults()?;
/// let tab = engine.create_tab("Rewrite")?;
/// engine.update_draft(&tab, "First paragraph")?;
/// engine.snapshot(&tab, None)?;
/// ```
pub struct QuireEngine {
    config: QuireConfig,
    data_dir: PathBuf,
    manager: TabManager<FileSink>,
    messages: DbMessageStore,
    presets: DbPresetCatalog,
}

impl QuireEngine {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Open the engine over `data_dir` and restore persisted tabs.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn open(config: QuireConfig, data_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        config.validate()?;
        let data_dir = data_dir.into();

        let sink = KvPersistence::new(
            DbKeyValueStore::in_data_dir(&data_dir),
            config.storage_key.clone(),
        );
        let mut manager = TabManager::with_options(sink, config.max_tabs, config.autosave);
        manager.restore(config.migration_tolerance());

        debug!(
            "Opened data dir {} with {} tab(s)",
            data_dir.display(),
            manager.state().len()
        );

        Ok(Self {
            messages: DbMessageStore::in_data_dir(&data_dir),
            presets: DbPresetCatalog::in_data_dir(&data_dir),
            config,
            data_dir,
            manager,
        })
    }

    /// Open `~/.quire` with `~/.quire/config.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no home directory or the configuration
    /// cannot be loaded.
    pub fn with_defaults() -> anyhow::Result<Self> {
        let data_dir = QuireConfig::default_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
        Self::with_data_dir(&data_dir)
    }

    /// Open `data_dir` with the `config.yaml` inside it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded.
    pub fn with_data_dir(data_dir: &Path) -> anyhow::Result<Self> {
        let config = QuireConfig::from_path(&data_dir.join(CONFIG_FILENAME))?;
        Self::open(config, data_dir)
    }

    pub fn config(&self) -> &QuireConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn manager(&self) -> &TabManager<FileSink> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut TabManager<FileSink> {
        &mut self.manager
    }

    pub fn messages(&self) -> &DbMessageStore {
        &self.messages
    }

    pub fn presets(&self) -> &DbPresetCatalog {
        &self.presets
    }

    // -------------------------------------------------------------------------
    // Reference resolution
    // -------------------------------------------------------------------------

    /// Resolve a tab reference: full id, unique prefix, or 1-based position.
    ///
    /// # Errors
    ///
    /// Returns [`QuireError::TabNotFound`] or [`QuireError::AmbiguousReference`].
    pub fn resolve_tab(&self, reference: &str) -> Result<TabId, QuireError> {
        let tabs = &self.manager.state().tabs;
        let ids: Vec<&str> = tabs.iter().map(|t| t.id.as_str()).collect();
        let index = resolve_reference(reference, &ids)?
            .ok_or_else(|| QuireError::TabNotFound(reference.to_string()))?;
        Ok(tabs[index].id.clone())
    }

    /// Resolve `reference` against the tab if given, else the active tab.
    ///
    /// # Errors
    ///
    /// Returns [`QuireError::NoActiveTab`] when `reference` is `None` and no
    /// tab is open.
    pub fn resolve_tab_or_active(&self, reference: Option<&str>) -> Result<TabId, QuireError> {
        match reference {
            Some(r) => self.resolve_tab(r),
            None => self.active_tab().map(|t| t.id.clone()),
        }
    }

    /// Resolve a version reference within a tab's history, in history order.
    ///
    /// # Errors
    ///
    /// Returns [`QuireError::VersionNotFound`] or [`QuireError::AmbiguousReference`].
    pub fn resolve_node(&self, tab_id: &TabId, reference: &str) -> Result<NodeId, QuireError> {
        let tab = self.tab(tab_id)?;
        let versions = tab.version_graph.versions();
        let ids: Vec<&str> = versions.iter().map(|n| n.id.as_str()).collect();
        let index = resolve_reference(reference, &ids)?
            .ok_or_else(|| QuireError::VersionNotFound(reference.to_string()))?;
        Ok(versions[index].id.clone())
    }

    pub fn tab(&self, id: &TabId) -> Result<&SessionTab, QuireError> {
        self.manager
            .state()
            .tab(id)
            .ok_or_else(|| QuireError::TabNotFound(id.to_string()))
    }

    pub fn active_tab(&self) -> Result<&SessionTab, QuireError> {
        self.manager.active_tab().ok_or(QuireError::NoActiveTab)
    }

    // -------------------------------------------------------------------------
    // Tab operations
    // -------------------------------------------------------------------------

    /// Open a tab for the named preset and make it active.
    ///
    /// # Errors
    ///
    /// Returns [`QuireError::TabLimitReached`] at capacity and
    /// [`QuireError::PresetNotFound`] for an unknown preset.
    pub fn create_tab(&mut self, preset_name: &str) -> Result<TabId, QuireError> {
        if self.manager.state().is_full() {
            return Err(QuireError::TabLimitReached(self.manager.state().max_tabs));
        }
        let preset = self.presets.find(preset_name)?;
        self.manager.dispatch(TabAction::CreateTab { preset });
        self.active_tab().map(|t| t.id.clone())
    }

    pub fn close_tab(&mut self, id: &TabId) {
        self.manager.dispatch(TabAction::CloseTab { id: id.clone() });
    }

    pub fn switch_tab(&mut self, id: &TabId) {
        self.manager.dispatch(TabAction::SwitchTab { id: id.clone() });
    }

    /// Move the tab at 0-based `from` to `to`. Out-of-range moves are ignored.
    pub fn move_tab(&mut self, from: usize, to: usize) {
        self.manager.dispatch(TabAction::ReorderTabs { from, to });
    }

    pub fn update_draft(&mut self, id: &TabId, text: &str) -> Result<(), QuireError> {
        self.tab(id)?;
        self.manager.dispatch(TabAction::UpdateDraft {
            id: id.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    /// Commit the draft as a manual version; returns the number of discarded versions.
    pub fn snapshot(&mut self, id: &TabId, label: Option<&str>) -> Result<usize, QuireError> {
        snapshot_draft(&mut self.manager, &self.messages, id, label)
    }

    /// Send the draft through `generate`, recording both messages in the project store.
    pub fn send<G>(&mut self, id: &TabId, generate: G) -> SendOutcome
    where
        G: FnOnce(&str) -> Result<String, QuireError>,
    {
        let options = SendOptions {
            owner: self.config.owner.clone(),
            message_cap: self.config.message_cap,
        };
        send_draft(&mut self.manager, &self.messages, id, generate, &options)
    }

    /// Step the tab's history back. Returns `false` at the oldest version.
    pub fn undo(&mut self, id: &TabId) -> Result<bool, QuireError> {
        let graph = self.tab(id)?.version_graph.undo();
        Ok(self.set_graph(id, graph))
    }

    /// Step the tab's history forward. Returns `false` at the newest version.
    pub fn redo(&mut self, id: &TabId) -> Result<bool, QuireError> {
        let graph = self.tab(id)?.version_graph.redo();
        Ok(self.set_graph(id, graph))
    }

    pub fn jump(&mut self, id: &TabId, node: &NodeId) -> Result<(), QuireError> {
        let tab = self.tab(id)?;
        if !tab.version_graph.contains(node) {
            return Err(QuireError::VersionNotFound(node.to_string()));
        }
        let graph = tab.version_graph.jump_to(node);
        self.set_graph(id, Some(graph));
        Ok(())
    }

    fn set_graph(&mut self, id: &TabId, graph: Option<VersionGraph>) -> bool {
        match graph {
            Some(graph) => {
                commit_graph(&mut self.manager, &self.messages, id, graph);
                true
            }
            None => false,
        }
    }

    /// Open a stored project in a tab (or switch to it if already open).
    ///
    /// # Errors
    ///
    /// Returns [`QuireError::ProjectNotFound`] for unknown ids, and the errors
    /// of [`open_project`].
    pub fn open_project(&mut self, project_id: &ProjectId) -> Result<TabId, QuireError> {
        let fallback = self
            .presets
            .presets()?
            .into_iter()
            .next()
            .ok_or_else(|| QuireError::PresetCatalog("catalog is empty".to_string()))?;
        let options = OpenOptions {
            limit: self.config.history_limit,
            tolerance: self.config.migration_tolerance(),
        };
        open_project(
            &mut self.manager,
            &self.messages,
            &self.presets,
            project_id,
            fallback,
            &options,
        )
    }

    /// Close every tab and remove the persisted record.
    pub fn reset(&mut self) {
        self.manager.clear();
    }

    /// Write any pending state.
    pub fn flush(&mut self) {
        self.manager.flush();
    }
}

/// Index of the entry `reference` names among `ids`.
///
/// Tries, in order: exact id, 1-based position, unique prefix of at least
/// [`MIN_PREFIX_LEN`] characters. `Ok(None)` means nothing matched.
pub fn resolve_reference(reference: &str, ids: &[&str]) -> Result<Option<usize>, QuireError> {
    let reference = reference.trim();
    if let Some(index) = ids.iter().position(|id| *id == reference) {
        return Ok(Some(index));
    }
    if let Ok(position) = reference.parse::<usize>() {
        if position >= 1 && position <= ids.len() {
            return Ok(Some(position - 1));
        }
    }
    if reference.len() < MIN_PREFIX_LEN {
        return Ok(None);
    }

    let matches: Vec<usize> = ids
        .iter()
        .enumerate()
        .filter(|(_, id)| id.starts_with(reference))
        .map(|(i, _)| i)
        .collect();
    match matches.as_slice() {
        [] => Ok(None),
        [index] => Ok(Some(*index)),
        many => Err(QuireError::AmbiguousReference {
            reference: reference.to_string(),
            count: many.len(),
        }),
    }
}
