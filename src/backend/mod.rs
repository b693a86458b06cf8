//! Remote session API consumed by the engine.
//!
//! The engine never talks to the network directly; it goes through a
//! [`SessionBackend`] implementation. [`memory::InMemoryBackend`] is the
//! implementation used by scenario replay and tests.

use crate::{Scope, Session};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod memory;

pub use memory::InMemoryBackend;

/// Errors returned by backend calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Network or server failure; retrying may succeed.
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// The targeted session does not exist on the server.
    #[error("session not found on server: {0}")]
    NotFound(String),

    /// The server refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl BackendError {
    /// Returns `true` if the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

/// Backend operations, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// `GetSessions(scope)`.
    GetSessions,
    /// `DeleteSession(session_id)`.
    Delete,
    /// `RenameSession(session_id, title)`.
    Rename,
    /// `CreateSession(options)`.
    Create,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::GetSessions => "get_sessions",
            Operation::Delete => "delete",
            Operation::Rename => "rename",
            Operation::Create => "create",
        };
        write!(f, "{}", s)
    }
}

/// Parameters for `CreateSession`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionOptions {
    /// Scope the new session belongs to.
    pub scope: Scope,
    /// Initial title.
    pub title: String,
    /// Optional stage pointer.
    #[serde(default)]
    pub stage_id: Option<i64>,
    /// Whether the new session is the scope's main thread.
    #[serde(default)]
    pub is_main_thread: bool,
}

impl CreateSessionOptions {
    /// Options for a plain (non-main-thread) session without a stage.
    pub fn new(scope: Scope, title: impl Into<String>) -> Self {
        Self {
            scope,
            title: title.into(),
            stage_id: None,
            is_main_thread: false,
        }
    }
}

/// The remote session API.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Lists every session in `scope`.
    async fn get_sessions(&self, scope: &Scope) -> Result<Vec<Session>, BackendError>;

    /// Deletes a session.
    async fn delete_session(&self, session_id: &str) -> Result<(), BackendError>;

    /// Renames a session.
    async fn rename_session(&self, session_id: &str, new_title: &str) -> Result<(), BackendError>;

    /// Creates a session and returns its id.
    async fn create_session(&self, options: &CreateSessionOptions) -> Result<String, BackendError>;
}
