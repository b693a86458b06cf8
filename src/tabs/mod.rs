//! Tab registry: the single source of truth for which tabs are open.
//!
//! Tabs are client-only pointers to sessions. A tab may exist before its
//! session does (`is_creating`), and at most one tab may point at a given
//! session id. The registry also remembers recently closed tabs so they can
//! be reopened.
//!
//! Like the other stores, [`TabRegistry`] is a cheap `Clone` handle over an
//! `Arc<RwLock<..>>`; clones share state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

#[cfg(test)]
mod tests;

mod closed;
mod lifecycle;

pub use closed::ClosedTab;

/// Default count of closed tabs remembered for reopen.
pub const DEFAULT_MAX_CLOSED_TABS: usize = 20;

/// Client-generated tab identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TabId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// An open tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    /// Tab identifier.
    pub tab_id: TabId,
    /// Session the tab shows; `None` while the session is being created.
    pub session_id: Option<String>,
    /// Display title.
    pub title: String,
    /// Optional stage pointer.
    pub stage_id: Option<i64>,
    /// Session creation is in flight.
    pub is_creating: bool,
    /// Session deletion is in flight.
    pub is_deleting: bool,
    /// When the session history was last loaded into the message log.
    pub loaded_at: Option<DateTime<Utc>>,
}

/// Fields for [`TabRegistry::create_tab`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTab {
    /// Session to point at, if it already exists.
    pub session_id: Option<String>,
    /// Display title.
    pub title: String,
    /// Optional stage pointer.
    pub stage_id: Option<i64>,
    /// Whether the session is still being created.
    pub is_creating: bool,
}

impl NewTab {
    /// A pending tab whose session has not been created yet.
    pub fn pending(title: impl Into<String>) -> Self {
        Self {
            session_id: None,
            title: title.into(),
            stage_id: None,
            is_creating: true,
        }
    }

    /// A tab for an existing session.
    pub fn for_session(session_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            title: title.into(),
            stage_id: None,
            is_creating: false,
        }
    }

    /// Sets the stage pointer.
    pub fn with_stage(mut self, stage_id: Option<i64>) -> Self {
        self.stage_id = stage_id;
        self
    }
}

/// Partial update for [`TabRegistry::update_tab`]; `None` fields are left as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabUpdate {
    /// New session id.
    pub session_id: Option<String>,
    /// New title.
    pub title: Option<String>,
    /// New stage pointer (`Some(None)` clears it).
    pub stage_id: Option<Option<i64>>,
    /// New creating flag.
    pub is_creating: Option<bool>,
    /// New deleting flag.
    pub is_deleting: Option<bool>,
}

impl TabUpdate {
    /// An update that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the tab at `session_id`.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Changes the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Changes the stage pointer.
    pub fn with_stage(mut self, stage_id: Option<i64>) -> Self {
        self.stage_id = Some(stage_id);
        self
    }

    /// Sets the creating flag.
    pub fn with_creating(mut self, is_creating: bool) -> Self {
        self.is_creating = Some(is_creating);
        self
    }

    /// Sets the deleting flag.
    pub fn with_deleting(mut self, is_deleting: bool) -> Self {
        self.is_deleting = Some(is_deleting);
        self
    }
}

/// A tab captured together with its position, for restoring after a failed
/// mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSnapshot {
    /// The tab as it was.
    pub tab: Tab,
    /// Index in the open-tab order.
    pub position: usize,
    /// Whether it was the active tab.
    pub was_active: bool,
}

#[derive(Debug, Default)]
pub(crate) struct RegistryState {
    pub(crate) tabs: HashMap<TabId, Tab>,
    pub(crate) order: Vec<TabId>,
    pub(crate) active: Option<TabId>,
    pub(crate) closed: VecDeque<ClosedTab>,
}

impl RegistryState {
    /// Returns the tab (other than `except`) that references `session_id`.
    pub(crate) fn owner_of(&self, session_id: &str, except: Option<&TabId>) -> Option<&TabId> {
        self.order.iter().find(|id| {
            Some(*id) != except
                && self
                    .tabs
                    .get(*id)
                    .and_then(|t| t.session_id.as_deref())
                    == Some(session_id)
        })
    }
}

/// Thread-safe registry of open tabs.
#[derive(Debug, Clone)]
pub struct TabRegistry {
    pub(crate) state: Arc<RwLock<RegistryState>>,
    pub(crate) max_closed_tabs: usize,
}

impl TabRegistry {
    /// Creates an empty registry remembering up to [`DEFAULT_MAX_CLOSED_TABS`]
    /// closed tabs.
    pub fn new() -> Self {
        Self::with_max_closed(DEFAULT_MAX_CLOSED_TABS)
    }

    /// Creates an empty registry with a custom closed-tab retention limit.
    pub fn with_max_closed(max_closed_tabs: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
            max_closed_tabs,
        }
    }

    /// Returns the tab with `tab_id`.
    pub async fn get(&self, tab_id: &TabId) -> Option<Tab> {
        let state = self.state.read().await;
        state.tabs.get(tab_id).cloned()
    }

    /// Returns every open tab in open order.
    pub async fn list(&self) -> Vec<Tab> {
        let state = self.state.read().await;
        state
            .order
            .iter()
            .filter_map(|id| state.tabs.get(id).cloned())
            .collect()
    }

    /// Returns the number of open tabs.
    pub async fn tab_count(&self) -> usize {
        let state = self.state.read().await;
        state.order.len()
    }

    /// Returns the active tab.
    pub async fn active_tab(&self) -> Option<Tab> {
        let state = self.state.read().await;
        state
            .active
            .as_ref()
            .and_then(|id| state.tabs.get(id).cloned())
    }

    /// Returns the tab pointing at `session_id`.
    pub async fn find_tab_by_session(&self, session_id: &str) -> Option<TabId> {
        let state = self.state.read().await;
        state.owner_of(session_id, None).cloned()
    }

    /// Returns `true` if the tab's session history has been loaded.
    pub async fn is_history_loaded(&self, tab_id: &TabId) -> bool {
        let state = self.state.read().await;
        state
            .tabs
            .get(tab_id)
            .map(|t| t.loaded_at.is_some())
            .unwrap_or(false)
    }

    /// Stamps the tab's `loaded_at` with the current time.
    ///
    /// Returns `false` if the tab does not exist.
    pub async fn mark_history_loaded(&self, tab_id: &TabId) -> bool {
        let mut state = self.state.write().await;
        match state.tabs.get_mut(tab_id) {
            Some(tab) => {
                tab.loaded_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Captures the tab pointing at `session_id`, with its position.
    pub async fn snapshot_for_session(&self, session_id: &str) -> Option<TabSnapshot> {
        let state = self.state.read().await;
        let tab_id = state.owner_of(session_id, None)?;
        let position = state.order.iter().position(|id| id == tab_id)?;
        Some(TabSnapshot {
            tab: state.tabs.get(tab_id)?.clone(),
            position,
            was_active: state.active.as_ref() == Some(tab_id),
        })
    }

    /// Puts a captured tab back exactly as it was.
    ///
    /// Any tab currently registered under the same id is replaced.
    pub async fn restore(&self, snapshot: TabSnapshot) {
        let mut state = self.state.write().await;
        let TabSnapshot {
            tab,
            position,
            was_active,
        } = snapshot;
        let tab_id = tab.tab_id.clone();

        state.order.retain(|id| *id != tab_id);
        let position = position.min(state.order.len());
        state.order.insert(position, tab_id.clone());
        state.tabs.insert(tab_id.clone(), tab);
        if was_active {
            state.active = Some(tab_id);
        }
    }
}

impl Default for TabRegistry {
    fn default() -> Self {
        Self::new()
    }
}
