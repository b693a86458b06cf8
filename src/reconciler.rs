//! Pushes directory data into the message log and the tab registry.
//!
//! Directory data is only trusted for sessions that are not streaming, and
//! it only ever replaces a log when it carries more messages than the log
//! holds (or the log is empty). A log the user is watching grow is never
//! shrunk by an older server snapshot.

use crate::directory::DirectoryCache;
use crate::messages::{MessageLog, ReplaceOutcome};
use crate::streaming::StreamingTracker;
use crate::tabs::{TabRegistry, TabUpdate};
use crate::Scope;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Result of reconciling one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// A stream owns the log; nothing was touched.
    Streaming,
    /// The session is not in the cached directory.
    NotCached,
    /// The backend count matches the last sync; nothing to do.
    AlreadySynced,
    /// The log holds more messages than the backend; local data wins.
    LocalNewer,
    /// Log and backend agree.
    UpToDate,
    /// The log was replaced with `count` messages from the backend.
    Synced {
        /// Messages written.
        count: usize,
    },
}

/// Directory → message log / tab reconciler.
#[derive(Debug, Clone)]
pub struct Reconciler {
    directory: DirectoryCache,
    messages: MessageLog,
    tabs: TabRegistry,
    streaming: StreamingTracker,
    /// Backend history length at the last sync, per session.
    synced: Arc<Mutex<HashMap<String, usize>>>,
}

impl Reconciler {
    /// Creates a reconciler over the given stores.
    pub fn new(
        directory: DirectoryCache,
        messages: MessageLog,
        tabs: TabRegistry,
        streaming: StreamingTracker,
    ) -> Self {
        Self {
            directory,
            messages,
            tabs,
            streaming,
            synced: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Reconciles one session against the cached directory for `scope`.
    pub async fn reconcile(&self, scope: &Scope, session_id: &str) -> SyncOutcome {
        if self.streaming.is_active(session_id) {
            tracing::debug!(session_id, "reconcile skipped, session is streaming");
            return SyncOutcome::Streaming;
        }

        let Some(cached) = self.directory.lookup(scope, session_id).await else {
            return SyncOutcome::NotCached;
        };

        let tab_id = self.tabs.find_tab_by_session(session_id).await;
        if let Some(tab_id) = &tab_id {
            if let Some(tab) = self.tabs.get(tab_id).await {
                let stale_meta =
                    tab.title != cached.title || tab.stage_id != cached.stage_reference;
                if stale_meta && !tab.is_creating && !tab.is_deleting {
                    let update = TabUpdate::new()
                        .with_title(cached.title.clone())
                        .with_stage(cached.stage_reference);
                    if let Err(error) = self.tabs.update_tab(tab_id, update).await {
                        tracing::debug!(%tab_id, %error, "tab vanished during reconcile");
                    }
                }
            }
        }

        let backend = cached.chat_history.len();
        let existing = self.messages.message_count(session_id).await;

        if self.last_synced(session_id) == Some(backend) && existing == backend {
            return SyncOutcome::AlreadySynced;
        }

        if existing != 0 && backend <= existing {
            if backend < existing {
                tracing::debug!(session_id, backend, existing, "local log is newer, keeping it");
                return SyncOutcome::LocalNewer;
            }
            self.record(session_id, backend);
            return SyncOutcome::UpToDate;
        }

        let messages = cached.messages();
        let count = messages.len();
        let accept = |held: usize| held == 0 || backend > held;
        match self.messages.replace_if(session_id, messages, accept).await {
            ReplaceOutcome::Replaced => {}
            ReplaceOutcome::Streaming => return SyncOutcome::Streaming,
            ReplaceOutcome::Kept { existing } if backend < existing => {
                tracing::debug!(
                    session_id,
                    backend,
                    existing,
                    "log grew during reconcile, keeping it"
                );
                return SyncOutcome::LocalNewer;
            }
            ReplaceOutcome::Kept { .. } => {
                self.record(session_id, backend);
                return SyncOutcome::UpToDate;
            }
        }
        self.record(session_id, backend);
        if let Some(tab_id) = &tab_id {
            self.tabs.mark_history_loaded(tab_id).await;
        }
        tracing::debug!(session_id, count, "message log synced from directory");
        SyncOutcome::Synced { count }
    }

    /// Reconciles every session that has an open tab.
    pub async fn reconcile_scope(&self, scope: &Scope) -> Vec<(String, SyncOutcome)> {
        let session_ids: Vec<String> = self
            .tabs
            .list()
            .await
            .into_iter()
            .filter_map(|tab| tab.session_id)
            .collect();

        let mut outcomes = Vec::with_capacity(session_ids.len());
        for session_id in session_ids {
            let outcome = self.reconcile(scope, &session_id).await;
            outcomes.push((session_id, outcome));
        }
        outcomes
    }

    /// Drops the idempotence record for `session_id` so the next pass
    /// compares counts from scratch.
    pub fn forget(&self, session_id: &str) {
        self.synced
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
    }

    /// Backend count recorded at the last sync of `session_id`.
    pub fn last_synced(&self, session_id: &str) -> Option<usize> {
        self.synced
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .copied()
    }

    fn record(&self, session_id: &str, backend: usize) {
        self.synced
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.to_string(), backend);
    }
}
