//! In-memory [`SessionBackend`] used by scenario replay and tests.
//!
//! Sessions are kept per scope. Failures can be queued per operation with
//! [`InMemoryBackend::fail_next`]; queued failures are consumed one call at a
//! time, in order.

use super::{BackendError, CreateSessionOptions, Operation, SessionBackend};
use crate::{HistoryEntry, Scope, Session, SessionMetadata};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

/// Session backend holding every directory in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    directories: Arc<RwLock<HashMap<Scope, Vec<Session>>>>,
    failures: Arc<Mutex<HashMap<Operation, VecDeque<BackendError>>>>,
    calls: Arc<Mutex<Vec<Operation>>>,
    latency: Option<Duration>,
}

impl InMemoryBackend {
    /// Creates an empty backend that answers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a backend that sleeps for `latency` before answering each call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Replaces the directory for `scope`.
    pub async fn seed(&self, scope: Scope, sessions: Vec<Session>) {
        let mut directories = self.directories.write().await;
        directories.insert(scope, sessions);
    }

    /// Returns the server-side sessions for `scope`.
    pub async fn sessions(&self, scope: &Scope) -> Vec<Session> {
        let directories = self.directories.read().await;
        directories.get(scope).cloned().unwrap_or_default()
    }

    /// Appends a history entry to a server-side session.
    ///
    /// Returns `false` if the session does not exist in `scope`.
    pub async fn push_history(&self, scope: &Scope, session_id: &str, entry: HistoryEntry) -> bool {
        let mut directories = self.directories.write().await;
        let Some(session) = directories
            .get_mut(scope)
            .and_then(|sessions| sessions.iter_mut().find(|s| s.session_id == session_id))
        else {
            return false;
        };
        session.chat_history.push(entry);
        true
    }

    /// Queues `error` as the result of the next call to `operation`.
    pub fn fail_next(&self, operation: Operation, error: BackendError) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.entry(operation).or_default().push_back(error);
    }

    /// Returns every operation invoked so far, in call order.
    pub fn calls(&self) -> Vec<Operation> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Records the call, waits for the configured latency and returns any
    /// queued failure for `operation`.
    async fn enter(&self, operation: Operation) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(operation);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        match failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(error) => {
                tracing::debug!(%operation, %error, "injected backend failure");
                Err(error)
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SessionBackend for InMemoryBackend {
    async fn get_sessions(&self, scope: &Scope) -> Result<Vec<Session>, BackendError> {
        self.enter(Operation::GetSessions).await?;
        Ok(self.sessions(scope).await)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), BackendError> {
        self.enter(Operation::Delete).await?;
        let mut directories = self.directories.write().await;
        for sessions in directories.values_mut() {
            if let Some(pos) = sessions.iter().position(|s| s.session_id == session_id) {
                sessions.remove(pos);
                return Ok(());
            }
        }
        Err(BackendError::NotFound(session_id.to_string()))
    }

    async fn rename_session(&self, session_id: &str, new_title: &str) -> Result<(), BackendError> {
        self.enter(Operation::Rename).await?;
        let mut directories = self.directories.write().await;
        let session = directories
            .values_mut()
            .flat_map(|sessions| sessions.iter_mut())
            .find(|s| s.session_id == session_id)
            .ok_or_else(|| BackendError::NotFound(session_id.to_string()))?;
        session.title = new_title.to_string();
        Ok(())
    }

    async fn create_session(&self, options: &CreateSessionOptions) -> Result<String, BackendError> {
        self.enter(Operation::Create).await?;
        let session_id = uuid::Uuid::new_v4().to_string();
        let session = Session {
            session_id: session_id.clone(),
            title: options.title.clone(),
            stage_reference: options.stage_id,
            chat_history: Vec::new(),
            metadata: SessionMetadata {
                is_main_thread: options.is_main_thread,
                ..SessionMetadata::default()
            },
            created_at: Utc::now().timestamp_millis() as f64 / 1000.0,
        };
        let mut directories = self.directories.write().await;
        directories
            .entry(options.scope.clone())
            .or_default()
            .push(session);
        Ok(session_id)
    }
}
