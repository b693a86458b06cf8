//! Engine facade.
//!
//! [`Engine`] owns one instance of every store, wires them together and is
//! the only surface the UI, the router and the transport talk to. It also
//! owns the currently selected [`Scope`].
//!
//! # Example
//!
//! ```
//! use session_sync::backend::InMemoryBackend;
//! use session_sync::engine::{Engine, EngineSettings};
//! use session_sync::{Scope, Session};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let scope = Scope::new("ws", "proj", "user", "chat");
//!     let backend = InMemoryBackend::new();
//!     backend.seed(scope.clone(), vec![Session::new("s1", "Notes")]).await;
//!
//!     let engine = Engine::new(Arc::new(backend), EngineSettings::default());
//!     engine.set_scope(scope).await.expect("directory");
//!     let tab = engine.open_session("s1").await.expect("tab");
//!     assert_eq!(tab.title, "Notes");
//! }
//! ```

use crate::backend::SessionBackend;
use crate::directory::DirectoryCache;
use crate::events::{EngineEvent, EventBus};
use crate::messages::MessageLog;
use crate::mutation::OptimisticMutations;
use crate::navigation::NavigationGuard;
use crate::reconciler::{Reconciler, SyncOutcome};
use crate::streaming::StreamingTracker;
use crate::tabs::{ClosedTab, Tab, TabRegistry};
use crate::transport::StreamControl;
use crate::{EngineDump, Message, Scope, SyncError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

#[cfg(test)]
mod tests;

mod flows;
mod mutations;
mod settings;
mod stream;

pub use settings::EngineSettings;

/// The synchronization engine.
///
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct Engine {
    backend: Arc<dyn SessionBackend>,
    directory: DirectoryCache,
    streaming: StreamingTracker,
    messages: MessageLog,
    tabs: TabRegistry,
    reconciler: Reconciler,
    mutations: OptimisticMutations,
    transport: StreamControl,
    guard: NavigationGuard,
    events: EventBus,
    settings: EngineSettings,
    scope: Arc<RwLock<Option<Scope>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.settings)
            .field("scope", &self.scope)
            .field("subscriber_count", &self.events.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine talking to `backend`.
    pub fn new(backend: Arc<dyn SessionBackend>, settings: EngineSettings) -> Self {
        let streaming = StreamingTracker::new();
        let directory = DirectoryCache::new(Arc::clone(&backend));
        let messages = MessageLog::new(streaming.clone());
        let tabs = TabRegistry::with_max_closed(settings.max_closed_tabs);
        let reconciler = Reconciler::new(
            directory.clone(),
            messages.clone(),
            tabs.clone(),
            streaming.clone(),
        );
        let mutations = OptimisticMutations::new(
            Arc::clone(&backend),
            directory.clone(),
            tabs.clone(),
            messages.clone(),
            reconciler.clone(),
            settings.refetch_after_mutation,
        );
        let transport = StreamControl::new(streaming.clone(), messages.clone());
        let guard = NavigationGuard::new(streaming.clone(), transport.clone(), settings.navigation);

        Self {
            backend,
            directory,
            streaming,
            messages,
            tabs,
            reconciler,
            mutations,
            transport,
            guard,
            events: EventBus::new(settings.channel_capacity),
            settings,
            scope: Arc::new(RwLock::new(None)),
        }
    }

    /// Selects `scope`, loads its directory and reconciles the open tabs.
    pub async fn set_scope(&self, scope: Scope) -> Result<Vec<crate::Session>, SyncError> {
        *self.scope.write().await = Some(scope.clone());
        let sessions = self.directory.fetch(&scope).await?;
        tracing::info!(%scope, sessions = sessions.len(), "scope loaded");
        self.events.emit(EngineEvent::ScopeLoaded {
            scope: scope.clone(),
            session_count: sessions.len(),
        });
        let outcomes = self.reconciler.reconcile_scope(&scope).await;
        self.emit_synced(&outcomes);
        Ok(sessions)
    }

    /// Refetches the directory for the current scope and reconciles.
    pub async fn refresh(&self) -> Result<Vec<crate::Session>, SyncError> {
        let scope = self.require_scope().await?;
        let sessions = self.directory.refetch(&scope).await?;
        self.events.emit(EngineEvent::DirectoryRefreshed {
            scope: scope.clone(),
            session_count: sessions.len(),
        });
        let outcomes = self.reconciler.reconcile_scope(&scope).await;
        self.emit_synced(&outcomes);
        self.events.emit(EngineEvent::TabsChanged);
        Ok(sessions)
    }

    /// The currently selected scope.
    pub async fn scope(&self) -> Option<Scope> {
        self.scope.read().await.clone()
    }

    pub(crate) async fn require_scope(&self) -> Result<Scope, SyncError> {
        self.scope().await.ok_or(SyncError::NoScope)
    }

    fn emit_synced(&self, outcomes: &[(String, SyncOutcome)]) {
        for (session_id, outcome) in outcomes {
            if matches!(outcome, SyncOutcome::Synced { .. }) {
                self.events.emit(EngineEvent::MessagesChanged {
                    session_id: session_id.clone(),
                });
            }
        }
    }

    // -- Selectors ----------------------------------------------------------

    /// Open tabs in open order.
    pub async fn tabs(&self) -> Vec<Tab> {
        self.tabs.list().await
    }

    /// The active tab.
    pub async fn active_tab(&self) -> Option<Tab> {
        self.tabs.active_tab().await
    }

    /// Messages of the active tab's session; empty if there is none.
    pub async fn active_messages(&self) -> Vec<Message> {
        match self.active_tab().await.and_then(|t| t.session_id) {
            Some(session_id) => self.messages.get_messages(&session_id).await,
            None => Vec::new(),
        }
    }

    /// Messages of `session_id`.
    pub async fn messages(&self, session_id: &str) -> Vec<Message> {
        self.messages.get_messages(session_id).await
    }

    /// Recently closed tabs, most recent first.
    pub async fn closed_tabs(&self) -> Vec<ClosedTab> {
        self.tabs.list_closed().await
    }

    /// Whether a stream is writing to `session_id`.
    pub fn is_streaming(&self, session_id: &str) -> bool {
        self.streaming.is_active(session_id)
    }

    /// Whether any stream is live.
    pub fn any_streaming(&self) -> bool {
        self.streaming.has_any_active()
    }

    /// Subscribes to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Captures every store.
    pub async fn dump(&self) -> EngineDump {
        let mut messages = BTreeMap::new();
        for session_id in self.messages.session_ids().await {
            let log = self.messages.get_messages(&session_id).await;
            messages.insert(session_id, log);
        }
        let streaming = self
            .streaming
            .active_sessions()
            .into_iter()
            .filter_map(|id| self.streaming.activity(&id).map(|a| (id, a)))
            .collect();

        EngineDump {
            scope: self.scope().await,
            tabs: self.tabs.list().await,
            active_tab: self.tabs.active_tab().await.map(|t| t.tab_id),
            closed_tabs: self.tabs.list_closed().await,
            messages,
            streaming,
            directory: self.directory.entry_info().await,
            navigation: self.guard.state(),
        }
    }

    // -- Component access ---------------------------------------------------

    /// Engine settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The directory cache.
    pub fn directory(&self) -> &DirectoryCache {
        &self.directory
    }

    /// The tab registry.
    pub fn tab_registry(&self) -> &TabRegistry {
        &self.tabs
    }

    /// The message log store.
    pub fn message_log(&self) -> &MessageLog {
        &self.messages
    }

    /// The streaming tracker.
    pub fn tracker(&self) -> &StreamingTracker {
        &self.streaming
    }

    /// The reconciler.
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// The navigation guard.
    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }
}
