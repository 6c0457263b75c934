//! Tab manager: the reducer plus persistence.
//!
//! [`TabManager`] owns the [`TabState`] and a [`PersistenceSink`]. Every
//! dispatched action is reduced first; the durable snapshot is then compared
//! with the last one written and saved only when it changed. Nothing is
//! written before [`TabManager::restore`] has run, so restoring never
//! overwrites the record it is reading.

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::constants::MAX_TABS;
use crate::persistence::{restore_state, PersistedTabs};
use crate::ports::PersistenceSink;
use crate::session::SessionTab;
use crate::tabs::{reduce, TabAction, TabState};

/// Single writer for tab state.
pub struct TabManager<S: PersistenceSink> {
    state: TabState,
    sink: S,
    initialized: bool,
    last_saved: Option<PersistedTabs>,
    autosave: bool,
    pending: bool,
}

impl<S: PersistenceSink> TabManager<S> {
    /// Manager with the default capacity and autosave on.
    pub fn new(sink: S) -> Self {
        Self::with_options(sink, MAX_TABS, true)
    }

    pub fn with_options(sink: S, max_tabs: usize, autosave: bool) -> Self {
        Self {
            state: TabState::with_capacity(max_tabs),
            sink,
            initialized: false,
            last_saved: None,
            autosave,
            pending: false,
        }
    }

    pub fn state(&self) -> &TabState {
        &self.state
    }

    pub fn active_tab(&self) -> Option<&SessionTab> {
        self.state.active_tab()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether a changed snapshot is waiting for [`flush`](Self::flush).
    pub fn has_pending(&self) -> bool {
        self.pending
    }

    /// Load persisted tabs. Runs once; later calls do nothing.
    ///
    /// A missing record leaves the state empty. An unreadable or corrupt
    /// record is removed from the sink and logged; the caller never sees an
    /// error. Restoring does not write.
    pub fn restore(&mut self, tolerance: Duration) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        let raw = match self.sink.load() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No persisted tabs");
                self.last_saved = Some(PersistedTabs::snapshot(&self.state));
                return;
            }
            Err(e) => {
                warn!("Failed to read persisted tabs: {}", e);
                self.purge();
                return;
            }
        };

        match restore_state(raw, self.state.max_tabs, tolerance) {
            Ok(state) => {
                info!(tabs = state.len(), "Restored persisted tabs");
                self.state = state;
            }
            Err(e) => {
                warn!("Discarding persisted tabs: {}", e);
                self.purge();
                return;
            }
        }
        self.last_saved = Some(PersistedTabs::snapshot(&self.state));
    }

    fn purge(&mut self) {
        if let Err(e) = self.sink.clear() {
            warn!("Failed to remove persisted tabs: {}", e);
        }
        self.last_saved = Some(PersistedTabs::snapshot(&self.state));
    }

    /// Apply `action`, then persist if the durable snapshot changed.
    pub fn dispatch(&mut self, action: TabAction) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, action);

        if !self.initialized {
            return;
        }
        let snapshot = PersistedTabs::snapshot(&self.state);
        if self.last_saved.as_ref() == Some(&snapshot) {
            return;
        }
        if self.autosave {
            self.save(snapshot);
        } else {
            self.pending = true;
        }
    }

    /// Write the current snapshot if one is pending.
    pub fn flush(&mut self) {
        if !self.pending {
            return;
        }
        let snapshot = PersistedTabs::snapshot(&self.state);
        self.save(snapshot);
    }

    fn save(&mut self, snapshot: PersistedTabs) {
        match self.sink.save(&snapshot) {
            Ok(()) => {
                debug!(tabs = snapshot.tabs.len(), "Saved tab state");
                self.last_saved = Some(snapshot);
                self.pending = false;
            }
            Err(e) => {
                warn!("Failed to save tab state: {}", e);
                self.pending = true;
                if let Some(id) = self.state.active_tab_id.clone() {
                    let state = std::mem::take(&mut self.state);
                    self.state = reduce(
                        state,
                        TabAction::SetError {
                            id,
                            error: Some(format!("Could not save tabs: {}", e)),
                        },
                    );
                }
            }
        }
    }

    /// Remove the stored record and close every tab.
    pub fn clear(&mut self) {
        if let Err(e) = self.sink.clear() {
            warn!("Failed to remove persisted tabs: {}", e);
        }
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, TabAction::Reset);
        self.last_saved = Some(PersistedTabs::snapshot(&self.state));
        self.pending = false;
    }
}

impl<S: PersistenceSink> Drop for TabManager<S> {
    fn drop(&mut self) {
        self.flush();
    }
}
