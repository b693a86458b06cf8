//! Optimistic delete and rename.
//!
//! Both mutations follow the same protocol: capture everything the change
//! touches into one [`MutationSnapshot`], apply the change locally so the UI
//! reflects it at once, then call the backend. On success the local state is
//! kept (and the directory optionally refetched); on failure the snapshot is
//! restored as a unit and the error is returned.

use crate::backend::{BackendError, SessionBackend};
use crate::directory::{CacheEntry, DirectoryCache};
use crate::messages::MessageLog;
use crate::reconciler::Reconciler;
use crate::tabs::{TabRegistry, TabSnapshot, TabUpdate};
use crate::{Message, Scope, SyncError};
use serde::Serialize;
use std::sync::Arc;

/// What a mutation does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationKind {
    /// Delete the session.
    Delete,
    /// Give the session a new title.
    Rename {
        /// New title.
        title: String,
    },
}

/// How a successful mutation was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    /// The backend accepted the change.
    Committed,
    /// The backend no longer knew the session; the delete had already
    /// happened elsewhere.
    AlreadyResolved,
}

/// Everything a mutation touched, as it was before the local apply.
#[derive(Debug, Clone)]
pub struct MutationSnapshot {
    scope: Scope,
    session_id: String,
    cache: Option<CacheEntry>,
    tab: Option<TabSnapshot>,
    /// Only captured for deletes; the inner `None` means "no log".
    messages: Option<Option<Vec<Message>>>,
}

impl MutationSnapshot {
    /// Scope the mutation ran in.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Session the mutation targets.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The cache entry before the mutation.
    pub fn cache(&self) -> Option<&CacheEntry> {
        self.cache.as_ref()
    }

    /// The owning tab before the mutation.
    pub fn tab(&self) -> Option<&TabSnapshot> {
        self.tab.as_ref()
    }
}

/// A mutation that has been applied locally but not yet sent.
#[derive(Debug)]
#[must_use = "a locally applied mutation must be committed or rolled back"]
pub struct AppliedMutation {
    kind: MutationKind,
    snapshot: MutationSnapshot,
}

impl AppliedMutation {
    /// What the mutation does.
    pub fn kind(&self) -> &MutationKind {
        &self.kind
    }

    /// State captured before the local apply.
    pub fn snapshot(&self) -> &MutationSnapshot {
        &self.snapshot
    }
}

/// The optimistic mutation layer.
#[derive(Clone)]
pub struct OptimisticMutations {
    backend: Arc<dyn SessionBackend>,
    directory: DirectoryCache,
    tabs: TabRegistry,
    messages: MessageLog,
    reconciler: Reconciler,
    refetch_after_mutation: bool,
}

impl std::fmt::Debug for OptimisticMutations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticMutations")
            .field("refetch_after_mutation", &self.refetch_after_mutation)
            .finish_non_exhaustive()
    }
}

impl OptimisticMutations {
    /// Creates the mutation layer.
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        directory: DirectoryCache,
        tabs: TabRegistry,
        messages: MessageLog,
        reconciler: Reconciler,
        refetch_after_mutation: bool,
    ) -> Self {
        Self {
            backend,
            directory,
            tabs,
            messages,
            reconciler,
            refetch_after_mutation,
        }
    }

    /// Deletes a session: local apply, remote call, commit or rollback.
    pub async fn delete_session(
        &self,
        scope: &Scope,
        session_id: &str,
    ) -> Result<MutationOutcome, SyncError> {
        let applied = self
            .apply_local(scope, session_id, MutationKind::Delete)
            .await;
        self.commit_or_rollback(applied).await
    }

    /// Renames a session: local apply, remote call, commit or rollback.
    pub async fn rename_session(
        &self,
        scope: &Scope,
        session_id: &str,
        title: &str,
    ) -> Result<MutationOutcome, SyncError> {
        let kind = MutationKind::Rename {
            title: title.to_string(),
        };
        let applied = self.apply_local(scope, session_id, kind).await;
        self.commit_or_rollback(applied).await
    }

    /// Captures the affected state and applies the mutation locally.
    ///
    /// A delete removes the session from the cached directory, flags its tab
    /// as deleting and clears its message log. A rename changes the title in
    /// the cache and on the tab. Sessions missing from the cache are still
    /// applied to the tab and log.
    pub async fn apply_local(
        &self,
        scope: &Scope,
        session_id: &str,
        kind: MutationKind,
    ) -> AppliedMutation {
        let cache = self.directory.snapshot(scope).await;
        let tab = self.tabs.snapshot_for_session(session_id).await;
        let tab_id = tab.as_ref().map(|t| t.tab.tab_id.clone());

        let messages = match &kind {
            MutationKind::Delete => {
                self.directory
                    .update(scope, |list| list.retain(|s| s.session_id != session_id))
                    .await;
                if let Some(tab_id) = &tab_id {
                    self.update_tab(tab_id, TabUpdate::new().with_deleting(true))
                        .await;
                }
                Some(self.messages.clear_messages(session_id).await)
            }
            MutationKind::Rename { title } => {
                self.directory
                    .update(scope, |list| {
                        if let Some(s) = list.iter_mut().find(|s| s.session_id == session_id) {
                            s.title = title.clone();
                        }
                    })
                    .await;
                if let Some(tab_id) = &tab_id {
                    self.update_tab(tab_id, TabUpdate::new().with_title(title.clone()))
                        .await;
                }
                None
            }
        };

        tracing::debug!(%scope, session_id, ?kind, "mutation applied locally");
        AppliedMutation {
            kind,
            snapshot: MutationSnapshot {
                scope: scope.clone(),
                session_id: session_id.to_string(),
                cache,
                tab,
                messages,
            },
        }
    }

    /// Sends a locally applied mutation to the backend.
    ///
    /// On success the local state is kept. On failure the snapshot is
    /// restored and the backend error returned. A delete the backend answers
    /// with `NotFound` counts as [`MutationOutcome::AlreadyResolved`].
    pub async fn commit_or_rollback(
        &self,
        applied: AppliedMutation,
    ) -> Result<MutationOutcome, SyncError> {
        let AppliedMutation { kind, snapshot } = applied;
        let session_id = snapshot.session_id.as_str();

        let remote = match &kind {
            MutationKind::Delete => self.backend.delete_session(session_id).await,
            MutationKind::Rename { title } => {
                self.backend.rename_session(session_id, title).await
            }
        };

        let outcome = match (&kind, remote) {
            (_, Ok(())) => MutationOutcome::Committed,
            (MutationKind::Delete, Err(BackendError::NotFound(_))) => {
                tracing::info!(session_id, "session already gone on the server");
                MutationOutcome::AlreadyResolved
            }
            (_, Err(error)) => {
                tracing::warn!(session_id, ?kind, %error, "mutation failed, rolling back");
                self.rollback(snapshot).await;
                return Err(error.into());
            }
        };

        if kind == MutationKind::Delete {
            if let Some(tab) = &snapshot.tab {
                self.tabs.delete_tab(&tab.tab.tab_id).await;
            }
            self.tabs.forget_closed(session_id).await;
            self.reconciler.forget(session_id);
        }
        tracing::info!(session_id, ?kind, ?outcome, "mutation committed");

        if self.refetch_after_mutation {
            if let Err(error) = self.directory.refetch(&snapshot.scope).await {
                tracing::warn!(scope = %snapshot.scope, %error, "refetch after mutation failed");
            }
        }
        Ok(outcome)
    }

    /// Restores everything captured in `snapshot`.
    pub async fn rollback(&self, snapshot: MutationSnapshot) {
        let MutationSnapshot {
            scope,
            session_id,
            cache,
            tab,
            messages,
        } = snapshot;

        self.directory.restore(&scope, cache).await;
        if let Some(tab) = tab {
            self.tabs.restore(tab).await;
        }
        if let Some(log) = messages {
            if !self.messages.restore_messages(&session_id, log).await {
                tracing::warn!(session_id, "message log not restored, session is streaming");
            }
        }
    }

    async fn update_tab(&self, tab_id: &crate::tabs::TabId, update: TabUpdate) {
        if let Err(error) = self.tabs.update_tab(tab_id, update).await {
            tracing::debug!(%tab_id, %error, "tab vanished during mutation");
        }
    }
}
