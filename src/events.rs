//! Change notifications for UI subscribers.
//!
//! The engine publishes an [`EngineEvent`] after every state change that a
//! view might want to re-render for. Delivery is best-effort: events are
//! dropped when nobody is subscribed, and slow subscribers see
//! `RecvError::Lagged` once they fall more than the channel capacity behind.

use crate::mutation::{MutationKind, MutationOutcome};
use crate::Scope;
use serde::Serialize;
use tokio::sync::broadcast;

/// Default capacity for the event channel.
/// This allows for bursty token streams without dropping notifications.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// A state change published by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A scope was selected and its directory loaded.
    ScopeLoaded {
        /// The selected scope.
        scope: Scope,
        /// Sessions in the directory.
        session_count: usize,
    },
    /// The directory for the current scope was refetched.
    DirectoryRefreshed {
        /// The refreshed scope.
        scope: Scope,
        /// Sessions in the directory.
        session_count: usize,
    },
    /// Tabs were created, updated, closed or re-activated.
    TabsChanged,
    /// The message log of a session changed.
    MessagesChanged {
        /// The affected session.
        session_id: String,
    },
    /// A stream started writing to a session.
    StreamStarted {
        /// The streaming session.
        session_id: String,
    },
    /// A stream finished normally.
    StreamEnded {
        /// The session that was streaming.
        session_id: String,
    },
    /// A stream was aborted.
    StreamAborted {
        /// The session that was streaming.
        session_id: String,
    },
    /// Every streaming flag was cleared by force.
    StreamsCleared {
        /// Sessions that were flagged.
        sessions: Vec<String>,
    },
    /// A navigation was accepted and its action completed.
    Navigated {
        /// Navigation target.
        target: String,
    },
    /// A mutation was accepted by the backend.
    MutationCommitted {
        /// Targeted session.
        session_id: String,
        /// What was done.
        mutation: MutationKind,
        /// How it was resolved.
        outcome: MutationOutcome,
    },
    /// A mutation failed and local state was restored.
    MutationRolledBack {
        /// Targeted session.
        session_id: String,
        /// What was attempted.
        mutation: MutationKind,
        /// Why it failed.
        error: String,
    },
}

/// Broadcast channel of [`EngineEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to every current subscriber.
    pub fn emit(&self, event: EngineEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    /// Subscribes to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}
