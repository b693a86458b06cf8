//! Session & stream state synchronization engine.
//!
//! This crate keeps three independently updated views of a chat workspace
//! consistent with each other:
//!
//! - the server-authoritative session directory ([`directory::DirectoryCache`]),
//! - the client-side tab registry ([`tabs::TabRegistry`]),
//! - the per-session message logs written token-by-token by a live stream
//!   ([`messages::MessageLog`]).
//!
//! Cross-store consistency is only enforced at two seams: the
//! [`reconciler::Reconciler`] (directory → logs/tabs) and the
//! [`mutation::OptimisticMutations`] layer (local apply + rollback). Every
//! user-initiated transition passes through the [`navigation::NavigationGuard`].
//! The [`engine::Engine`] facade wires all of them together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Backend seam: the remote session API and an in-memory implementation.
pub mod backend;

/// Configuration loading, schema and XDG path resolution.
pub mod config;

/// Server-authoritative session directory cache.
pub mod directory;

/// Engine facade wiring every component together.
pub mod engine;

/// Change notifications for UI subscribers.
pub mod events;

/// Tracing subscriber initialization.
pub mod logging;

/// Per-session message logs.
pub mod messages;

/// Optimistic delete/rename with snapshot rollback.
pub mod mutation;

/// Navigation guard state machine.
pub mod navigation;

/// Directory → message log / tab reconciliation.
pub mod reconciler;

/// Scripted scenarios replayed against the engine.
pub mod scenario;

/// Streaming activity tracker.
pub mod streaming;

/// Tab registry with closed-tab history.
pub mod tabs;

/// Transport-facing stream control (start/chunk/end/abort).
pub mod transport;

mod dump;
pub use dump::*;

/// Identifies which session directory a cache entry belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    /// Workspace identifier.
    pub workspace_id: String,
    /// Project identifier.
    pub project_id: String,
    /// User identifier.
    pub user_id: String,
    /// Component identifier.
    pub component_id: String,
}

impl Scope {
    /// Creates a new scope from its four identifiers.
    pub fn new(
        workspace_id: impl Into<String>,
        project_id: impl Into<String>,
        user_id: impl Into<String>,
        component_id: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            project_id: project_id.into(),
            user_id: user_id.into(),
            component_id: component_id.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.workspace_id, self.project_id, self.user_id, self.component_id
        )
    }
}

/// Author of a message as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message typed by the user.
    User,
    /// Message produced by the agent.
    Agent,
    /// System or tool message.
    System,
}

impl Role {
    /// Normalizes a backend role string into a UI role.
    ///
    /// The backend calls agent output `assistant`; unknown roles (tool
    /// output, function results) are shown as system messages.
    pub fn from_backend(role: &str) -> Self {
        match role.to_ascii_lowercase().as_str() {
            "user" => Role::User,
            "assistant" | "agent" => Role::Agent,
            _ => Role::System,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::System => "system",
        };
        write!(f, "{}", s)
    }
}

/// Error type for parsing Role from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError(pub String);

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid role: {}", self.0)
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "agent" => Ok(Role::Agent),
            "system" => Ok(Role::System),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// A message as held by the message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier, unique within its session.
    pub id: String,
    /// Author role.
    pub role: Role,
    /// Message body; grows token-by-token while streaming.
    pub content: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Free-form metadata carried over from the backend or transport.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Message {
    /// Creates a message stamped with the current time and no metadata.
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            metadata: Map::new(),
        }
    }
}

/// A message as stored by the backend inside `Session::chat_history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Backend message id; older sessions may not carry one.
    #[serde(default)]
    pub id: Option<String>,
    /// Backend role string (`user`, `assistant`, `system`, ...).
    pub role: String,
    /// Message body.
    pub content: String,
    /// Unix epoch seconds, fractional part allowed.
    #[serde(default)]
    pub created_at: f64,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl HistoryEntry {
    /// Creates a history entry without id or metadata.
    pub fn new(role: impl Into<String>, content: impl Into<String>, created_at: f64) -> Self {
        Self {
            id: None,
            role: role.into(),
            content: content.into(),
            created_at,
            metadata: Map::new(),
        }
    }

    /// Converts this entry into the UI message shape.
    ///
    /// `fallback_id` is used when the backend did not assign an id, so that
    /// repeated conversions of the same history yield identical messages.
    pub fn to_message(&self, fallback_id: String) -> Message {
        Message {
            id: self.id.clone().unwrap_or(fallback_id),
            role: Role::from_backend(&self.role),
            content: self.content.clone(),
            created_at: timestamp_from_backend(self.created_at),
            metadata: self.metadata.clone(),
        }
    }
}

/// Session metadata as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Whether this session is the scope's main thread.
    #[serde(default)]
    pub is_main_thread: bool,
    /// Every other key, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Server-authoritative session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Stable, never-reused identifier.
    pub session_id: String,
    /// Display title.
    pub title: String,
    /// Optional stage pointer.
    #[serde(default)]
    pub stage_reference: Option<i64>,
    /// Full message history in backend shape.
    #[serde(default)]
    pub chat_history: Vec<HistoryEntry>,
    /// Backend metadata.
    #[serde(default)]
    pub metadata: SessionMetadata,
    /// Unix epoch seconds.
    #[serde(default)]
    pub created_at: f64,
}

impl Session {
    /// Creates an empty session with the given id and title.
    pub fn new(session_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            title: title.into(),
            stage_reference: None,
            chat_history: Vec::new(),
            metadata: SessionMetadata::default(),
            created_at: 0.0,
        }
    }

    /// Converts the backend history into UI messages.
    pub fn messages(&self) -> Vec<Message> {
        self.chat_history
            .iter()
            .enumerate()
            .map(|(i, entry)| entry.to_message(format!("{}-{}", self.session_id, i)))
            .collect()
    }
}

/// Converts a backend timestamp (Unix epoch seconds) into a `DateTime<Utc>`.
///
/// Non-finite or out-of-range values map to the Unix epoch.
pub fn timestamp_from_backend(seconds: f64) -> DateTime<Utc> {
    if !seconds.is_finite() {
        return DateTime::<Utc>::default();
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1_000_000_000.0).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999)).unwrap_or_default()
}

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A remote call failed.
    #[error("backend request failed: {0}")]
    Backend(#[from] backend::BackendError),

    /// Attempted to create a tab whose id is already registered.
    #[error("Tab already exists: {0}")]
    TabExists(tabs::TabId),

    /// Tab was not found in the registry.
    #[error("Tab not found: {0}")]
    TabNotFound(tabs::TabId),

    /// Another tab already points at this session.
    #[error("Session {session_id} is already open in tab {tab_id}")]
    SessionAlreadyOpen {
        /// The session that is already referenced.
        session_id: String,
        /// The tab referencing it.
        tab_id: tabs::TabId,
    },

    /// No open tab references the session.
    #[error("No tab open for session: {0}")]
    NoTabForSession(String),

    /// The operation needs a scope but none has been selected.
    #[error("No scope selected")]
    NoScope,

    /// The session has no entry in the closed-tab history.
    #[error("Session was not recently closed: {0}")]
    NotClosed(String),
}

#[cfg(test)]
mod tests;
