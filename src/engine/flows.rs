//! Tab flows on the Engine: new tabs, opening, closing and switching.

use super::Engine;
use crate::backend::CreateSessionOptions;
use crate::directory::find_session;
use crate::events::EngineEvent;
use crate::navigation::NavigateOptions;
use crate::tabs::{NewTab, Tab, TabId, TabUpdate};
use crate::SyncError;

impl Engine {
    /// Opens a tab for a brand-new session titled `title`.
    ///
    /// A pending tab appears at once; when the backend has created the
    /// session the tab is pointed at it. If creation fails the pending tab is
    /// removed and the error returned. The new tab is not activated; use
    /// [`Engine::switch_to`] for that.
    pub async fn open_new_tab(&self, title: &str) -> Result<Tab, SyncError> {
        let scope = self.require_scope().await?;
        let tab_id = TabId::generate();
        self.tabs
            .create_tab(tab_id.clone(), NewTab::pending(title))
            .await?;
        self.events.emit(EngineEvent::TabsChanged);

        let options = CreateSessionOptions::new(scope.clone(), title);
        let session_id = match self.backend.create_session(&options).await {
            Ok(session_id) => session_id,
            Err(error) => {
                tracing::warn!(%tab_id, %error, "session creation failed, removing pending tab");
                self.tabs.delete_tab(&tab_id).await;
                self.events.emit(EngineEvent::TabsChanged);
                return Err(error.into());
            }
        };

        let update = TabUpdate::new()
            .with_session_id(session_id.clone())
            .with_creating(false);
        let mut tab = match self.tabs.update_tab(&tab_id, update).await {
            Ok(tab) => tab,
            Err(error) => {
                // The pending tab was closed while the backend was creating.
                tracing::warn!(
                    %tab_id,
                    session_id,
                    %error,
                    "session created but its tab is gone"
                );
                self.refresh_after_create(&scope).await;
                return Err(error);
            }
        };
        tracing::info!(%tab_id, session_id, "session created");

        if self.refresh_after_create(&scope).await {
            self.reconciler.reconcile(&scope, &session_id).await;
        }
        if let Some(current) = self.tabs.get(&tab_id).await {
            tab = current;
        }
        self.events.emit(EngineEvent::TabsChanged);
        Ok(tab)
    }

    /// Invalidates the directory after a create and refetches it when
    /// configured to. Returns `true` if a fresh listing was loaded.
    async fn refresh_after_create(&self, scope: &crate::Scope) -> bool {
        self.directory.invalidate(scope).await;
        if !self.settings.refetch_after_mutation {
            return false;
        }
        match self.directory.refetch(scope).await {
            Ok(_) => true,
            Err(error) => {
                tracing::warn!(%scope, %error, "refetch after create failed");
                false
            }
        }
    }

    /// Opens a tab for an existing session, or returns the one already open.
    ///
    /// Title and stage come from the directory when the session is known.
    pub async fn open_session(&self, session_id: &str) -> Result<Tab, SyncError> {
        if let Some(tab_id) = self.tabs.find_tab_by_session(session_id).await {
            return self
                .tabs
                .get(&tab_id)
                .await
                .ok_or(SyncError::TabNotFound(tab_id));
        }

        let scope = self.require_scope().await?;
        let sessions = self.directory.fetch(&scope).await?;
        let new_tab = match find_session(&sessions, session_id) {
            Some(session) => NewTab::for_session(session_id, session.title.clone())
                .with_stage(session.stage_reference),
            None => NewTab::for_session(session_id, session_id),
        };

        let tab = self.tabs.create_tab(TabId::generate(), new_tab).await?;
        self.tabs.forget_closed(session_id).await;
        self.reconcile_and_emit(session_id).await;
        self.events.emit(EngineEvent::TabsChanged);
        Ok(self.tabs.get(&tab.tab_id).await.unwrap_or(tab))
    }

    /// Reopens a recently closed session.
    pub async fn reopen_closed(&self, session_id: &str) -> Result<Tab, SyncError> {
        let tab = self.tabs.reopen_closed(session_id).await?;
        self.reconcile_and_emit(session_id).await;
        self.events.emit(EngineEvent::TabsChanged);
        Ok(self.tabs.get(&tab.tab_id).await.unwrap_or(tab))
    }

    /// Closes a tab on user request; it can be reopened later.
    ///
    /// A live stream into the tab's session keeps running.
    pub async fn close_tab(&self, tab_id: &TabId) -> Option<Tab> {
        let tab = self.tabs.close_tab(tab_id).await?;
        self.events.emit(EngineEvent::TabsChanged);
        Some(tab)
    }

    /// Navigates to `session_id` through the navigation guard.
    ///
    /// Opens a tab for the session if none exists, activates it and
    /// reconciles its log. Returns `Ok(false)` if the guard refused.
    pub async fn switch_to(
        &self,
        session_id: &str,
        options: NavigateOptions,
    ) -> Result<bool, SyncError> {
        let live_before = self.streaming.active_sessions();

        let accepted = self
            .guard
            .guarded_navigate(
                session_id,
                || async {
                    if self.tabs.find_tab_by_session(session_id).await.is_none() {
                        self.open_session(session_id).await?;
                    }
                    self.tabs.set_active_tab(session_id).await?;
                    self.reconcile_and_emit(session_id).await;
                    Ok::<(), SyncError>(())
                },
                options,
            )
            .await?;

        if accepted {
            if options.force_abort {
                for aborted in live_before.iter().filter(|s| !self.streaming.is_active(s)) {
                    self.reconciler.forget(aborted);
                    self.events.emit(EngineEvent::StreamAborted {
                        session_id: aborted.clone(),
                    });
                }
            }
            self.events.emit(EngineEvent::Navigated {
                target: session_id.to_string(),
            });
            self.events.emit(EngineEvent::TabsChanged);
        }
        Ok(accepted)
    }

    async fn reconcile_and_emit(&self, session_id: &str) {
        let Some(scope) = self.scope().await else {
            return;
        };
        let outcome = self.reconciler.reconcile(&scope, session_id).await;
        if matches!(outcome, crate::reconciler::SyncOutcome::Synced { .. }) {
            self.events.emit(EngineEvent::MessagesChanged {
                session_id: session_id.to_string(),
            });
        }
    }
}
