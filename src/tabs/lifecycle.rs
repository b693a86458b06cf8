//! Tab lifecycle operations for the TabRegistry.
//!
//! Creation, partial updates, removal and activation.

use super::{NewTab, Tab, TabId, TabRegistry, TabUpdate};
use crate::SyncError;

impl TabRegistry {
    /// Registers a new tab.
    ///
    /// The first tab ever created becomes active. Creation does not otherwise
    /// change which tab is active.
    ///
    /// # Errors
    ///
    /// - [`SyncError::TabExists`] if `tab_id` is already registered.
    /// - [`SyncError::SessionAlreadyOpen`] if another tab already points at
    ///   the session.
    ///
    /// # Example
    ///
    /// ```
    /// use session_sync::tabs::{NewTab, TabId, TabRegistry};
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let registry = TabRegistry::new();
    ///     let tab = registry
    ///         .create_tab(TabId::new("t1"), NewTab::for_session("s1", "Notes"))
    ///         .await
    ///         .expect("new tab");
    ///     assert_eq!(tab.session_id.as_deref(), Some("s1"));
    ///
    ///     // A second tab for the same session is refused.
    ///     let dup = registry
    ///         .create_tab(TabId::new("t2"), NewTab::for_session("s1", "Again"))
    ///         .await;
    ///     assert!(dup.is_err());
    /// }
    /// ```
    pub async fn create_tab(&self, tab_id: TabId, new_tab: NewTab) -> Result<Tab, SyncError> {
        let mut state = self.state.write().await;

        if state.tabs.contains_key(&tab_id) {
            return Err(SyncError::TabExists(tab_id));
        }
        if let Some(session_id) = new_tab.session_id.as_deref() {
            if let Some(owner) = state.owner_of(session_id, None) {
                return Err(SyncError::SessionAlreadyOpen {
                    session_id: session_id.to_string(),
                    tab_id: owner.clone(),
                });
            }
        }

        let tab = Tab {
            tab_id: tab_id.clone(),
            session_id: new_tab.session_id,
            title: new_tab.title,
            stage_id: new_tab.stage_id,
            is_creating: new_tab.is_creating,
            is_deleting: false,
            loaded_at: None,
        };
        state.tabs.insert(tab_id.clone(), tab.clone());
        state.order.push(tab_id.clone());
        if state.active.is_none() {
            state.active = Some(tab_id.clone());
        }
        tracing::debug!(%tab_id, session_id = ?tab.session_id, "tab created");
        Ok(tab)
    }

    /// Applies a partial update to a tab and returns the updated tab.
    ///
    /// Pointing a tab at a different session resets its `loaded_at`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::TabNotFound`] if no tab has `tab_id`.
    /// - [`SyncError::SessionAlreadyOpen`] if the new session is already
    ///   referenced by another tab.
    pub async fn update_tab(&self, tab_id: &TabId, update: TabUpdate) -> Result<Tab, SyncError> {
        let mut state = self.state.write().await;

        if !state.tabs.contains_key(tab_id) {
            return Err(SyncError::TabNotFound(tab_id.clone()));
        }
        if let Some(session_id) = update.session_id.as_deref() {
            if let Some(owner) = state.owner_of(session_id, Some(tab_id)) {
                return Err(SyncError::SessionAlreadyOpen {
                    session_id: session_id.to_string(),
                    tab_id: owner.clone(),
                });
            }
        }

        let tab = state
            .tabs
            .get_mut(tab_id)
            .ok_or_else(|| SyncError::TabNotFound(tab_id.clone()))?;
        if let Some(session_id) = update.session_id {
            if tab.session_id.as_deref() != Some(session_id.as_str()) {
                tab.loaded_at = None;
            }
            tab.session_id = Some(session_id);
        }
        if let Some(title) = update.title {
            tab.title = title;
        }
        if let Some(stage_id) = update.stage_id {
            tab.stage_id = stage_id;
        }
        if let Some(is_creating) = update.is_creating {
            tab.is_creating = is_creating;
        }
        if let Some(is_deleting) = update.is_deleting {
            tab.is_deleting = is_deleting;
        }
        Ok(tab.clone())
    }

    /// Removes a tab without recording it in the closed-tab history.
    ///
    /// Used when a session is deleted or its creation failed. If the removed
    /// tab was active, its right-hand neighbour becomes active (or the
    /// left-hand one when it was last).
    pub async fn delete_tab(&self, tab_id: &TabId) -> Option<Tab> {
        let mut state = self.state.write().await;
        let tab = state.tabs.remove(tab_id)?;

        let position = state.order.iter().position(|id| id == tab_id);
        state.order.retain(|id| id != tab_id);
        if state.active.as_ref() == Some(tab_id) {
            let next = position.and_then(|pos| {
                state
                    .order
                    .get(pos)
                    .or_else(|| pos.checked_sub(1).and_then(|prev| state.order.get(prev)))
                    .cloned()
            });
            state.active = next;
        }
        tracing::debug!(%tab_id, "tab removed");
        Some(tab)
    }

    /// Makes the tab pointing at `session_id` the active tab.
    ///
    /// # Errors
    ///
    /// [`SyncError::NoTabForSession`] if no open tab references the session.
    pub async fn set_active_tab(&self, session_id: &str) -> Result<TabId, SyncError> {
        let mut state = self.state.write().await;
        let tab_id = state
            .owner_of(session_id, None)
            .cloned()
            .ok_or_else(|| SyncError::NoTabForSession(session_id.to_string()))?;
        state.active = Some(tab_id.clone());
        Ok(tab_id)
    }

    /// Makes `tab_id` the active tab.
    ///
    /// # Errors
    ///
    /// [`SyncError::TabNotFound`] if no tab has `tab_id`.
    pub async fn activate_tab(&self, tab_id: &TabId) -> Result<(), SyncError> {
        let mut state = self.state.write().await;
        if !state.tabs.contains_key(tab_id) {
            return Err(SyncError::TabNotFound(tab_id.clone()));
        }
        state.active = Some(tab_id.clone());
        Ok(())
    }
}
