//! Closed-tab history for the TabRegistry.
//!
//! Closing a tab remembers which session it showed so it can be reopened.
//! The history is bounded; the oldest entry is evicted once it is full.

use super::{NewTab, Tab, TabId, TabRegistry};
use crate::SyncError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A tab the user closed recently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosedTab {
    /// Session the tab showed.
    pub session_id: String,
    /// Title at close time.
    pub title: String,
    /// Stage pointer at close time.
    pub stage_id: Option<i64>,
    /// When the tab was closed.
    pub closed_at: DateTime<Utc>,
}

impl ClosedTab {
    fn from_tab(tab: &Tab, session_id: String) -> Self {
        Self {
            session_id,
            title: tab.title.clone(),
            stage_id: tab.stage_id,
            closed_at: Utc::now(),
        }
    }
}

impl TabRegistry {
    /// Closes a tab on user request.
    ///
    /// The tab is removed like [`TabRegistry::delete_tab`] and, if it pointed
    /// at a session, recorded in the closed-tab history. Returns the removed
    /// tab, or `None` if it did not exist.
    pub async fn close_tab(&self, tab_id: &TabId) -> Option<Tab> {
        let tab = self.delete_tab(tab_id).await?;

        if let Some(session_id) = tab.session_id.clone() {
            let mut state = self.state.write().await;
            state.closed.retain(|c| c.session_id != session_id);
            state
                .closed
                .push_back(ClosedTab::from_tab(&tab, session_id));
            while state.closed.len() > self.max_closed_tabs {
                state.closed.pop_front();
            }
        }
        Some(tab)
    }

    /// Returns the closed-tab history, most recently closed first.
    pub async fn list_closed(&self) -> Vec<ClosedTab> {
        let state = self.state.read().await;
        state.closed.iter().rev().cloned().collect()
    }

    /// Reopens a tab for a recently closed session.
    ///
    /// The entry leaves the history. If a tab for the session is already open
    /// (it was reopened some other way), that tab is returned unchanged.
    ///
    /// # Errors
    ///
    /// [`SyncError::NotClosed`] if the session is not in the history.
    pub async fn reopen_closed(&self, session_id: &str) -> Result<Tab, SyncError> {
        let closed = {
            let mut state = self.state.write().await;
            let pos = state
                .closed
                .iter()
                .position(|c| c.session_id == session_id)
                .ok_or_else(|| SyncError::NotClosed(session_id.to_string()))?;
            let closed = state.closed.remove(pos);
            let open = state
                .owner_of(session_id, None)
                .and_then(|id| state.tabs.get(id))
                .cloned();
            if let Some(open) = open {
                return Ok(open);
            }
            closed
        };

        let Some(closed) = closed else {
            return Err(SyncError::NotClosed(session_id.to_string()));
        };
        self.create_tab(
            TabId::generate(),
            NewTab::for_session(closed.session_id, closed.title).with_stage(closed.stage_id),
        )
        .await
    }

    /// Drops a session from the closed-tab history.
    ///
    /// Returns `true` if an entry was removed.
    pub async fn forget_closed(&self, session_id: &str) -> bool {
        let mut state = self.state.write().await;
        let before = state.closed.len();
        state.closed.retain(|c| c.session_id != session_id);
        state.closed.len() != before
    }
}
