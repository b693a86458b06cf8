//! Tests for the Engine facade.
//!
//! Tests are organized into categories:
//! - `scope`: scope selection, refresh, selectors and dump
//! - `stream`: transport callbacks
//! - `tabs`: new-tab creation, open/close/reopen, switching
//! - `mutations`: delete and rename through the facade
//! - `events`: event publication

mod mutations;
mod tabs;

use super::{Engine, EngineSettings};
use crate::backend::InMemoryBackend;
use crate::{HistoryEntry, Scope, Session};
use std::sync::Arc;

pub(super) fn scope() -> Scope {
    Scope::new("ws", "proj", "user", "chat")
}

/// Helper: a session whose backend history holds `n` alternating entries.
pub(super) fn session(id: &str, n: usize) -> Session {
    let mut session = Session::new(id, format!("Title {}", id));
    session.chat_history = (0..n)
        .map(|i| {
            let role = if i % 2 == 0 { "user" } else { "assistant" };
            HistoryEntry::new(role, format!("{} entry {}", id, i), 1_700_000_000.0 + i as f64)
        })
        .collect();
    session
}

/// Helper: an engine over a backend seeded with `sessions`, scope selected.
pub(super) async fn engine_with(sessions: Vec<Session>) -> (Engine, InMemoryBackend) {
    engine_with_settings(sessions, EngineSettings::default()).await
}

pub(super) async fn engine_with_settings(
    sessions: Vec<Session>,
    settings: EngineSettings,
) -> (Engine, InMemoryBackend) {
    let backend = InMemoryBackend::new();
    backend.seed(scope(), sessions).await;
    let engine = Engine::new(Arc::new(backend.clone()), settings);
    engine.set_scope(scope()).await.expect("load scope");
    (engine, backend)
}
