//! Tests for the DirectoryCache module.
//!
//! Tests are organized into categories:
//! - `basic`: reads, lookup, invalidation
//! - `fetch`: fetch/refetch against the backend, failure handling
//! - `ordering`: out-of-order response protection
//! - `local`: snapshot, restore and in-place updates


use super::DirectoryCache;
use crate::backend::{BackendError, CreateSessionOptions, InMemoryBackend, SessionBackend};
use crate::{Scope, Session};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(super) fn scope() -> Scope {
    Scope::new("ws", "proj", "user", "chat")
}

pub(super) fn sessions(ids: &[&str]) -> Vec<Session> {
    ids.iter()
        .map(|id| Session::new(*id, format!("Title {}", id)))
        .collect()
}

/// Helper: a cache over an in-memory backend seeded with `ids` in [`scope`].
pub(super) async fn seeded(ids: &[&str]) -> (DirectoryCache, InMemoryBackend) {
    let backend = InMemoryBackend::new();
    backend.seed(scope(), sessions(ids)).await;
    let cache = DirectoryCache::new(Arc::new(backend.clone()));
    (cache, backend)
}

/// Backend that answers `get_sessions` with the directory as it was when the
/// request was made, after a per-call delay.
#[derive(Clone, Default)]
pub(super) struct DelayedBackend {
    pub(super) directory: Arc<Mutex<Vec<Session>>>,
    pub(super) delays: Arc<Mutex<VecDeque<Duration>>>,
}

impl DelayedBackend {
    pub(super) fn set_directory(&self, sessions: Vec<Session>) {
        *self.directory.lock().unwrap() = sessions;
    }

    pub(super) fn push_delay(&self, delay: Duration) {
        self.delays.lock().unwrap().push_back(delay);
    }
}

#[async_trait]
impl SessionBackend for DelayedBackend {
    async fn get_sessions(&self, _scope: &Scope) -> Result<Vec<Session>, BackendError> {
        let answer = self.directory.lock().unwrap().clone();
        let delay = self.delays.lock().unwrap().pop_front().unwrap_or_default();
        tokio::time::sleep(delay).await;
        Ok(answer)
    }

    async fn delete_session(&self, _session_id: &str) -> Result<(), BackendError> {
        Err(BackendError::Rejected("unsupported".into()))
    }

    async fn rename_session(&self, _session_id: &str, _title: &str) -> Result<(), BackendError> {
        Err(BackendError::Rejected("unsupported".into()))
    }

    async fn create_session(&self, _options: &CreateSessionOptions) -> Result<String, BackendError> {
        Err(BackendError::Rejected("unsupported".into()))
    }
}
