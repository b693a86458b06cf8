//! Scripted scenarios replayed against the engine.
//!
//! A scenario seeds an [`InMemoryBackend`] with a directory and then drives
//! the [`Engine`] through a list of [`Step`]s, the way a UI and a transport
//! would. It is the input format of `sessync replay`.
//!
//! ```json
//! {
//!   "scope": {"workspace_id": "ws", "project_id": "p", "user_id": "u", "component_id": "c"},
//!   "sessions": [{"session_id": "s1", "title": "Notes"}],
//!   "steps": [
//!     {"op": "load_scope"},
//!     {"op": "open_session", "session_id": "s1"},
//!     {"op": "stream_start", "session_id": "s1"},
//!     {"op": "stream_token", "session_id": "s1", "message_id": "r1", "text": "Hi"},
//!     {"op": "stream_end", "session_id": "s1"}
//!   ]
//! }
//! ```

use crate::backend::{BackendError, InMemoryBackend, Operation};
use crate::engine::{Engine, EngineSettings};
use crate::navigation::NavigateOptions;
use crate::transport::StreamChunk;
use crate::{EngineDump, HistoryEntry, Message, Role, Scope, Session, SyncError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Errors loading a scenario file.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// The file could not be read.
    #[error("Failed to read scenario file: {path}")]
    Read {
        /// Path of the scenario file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid scenario.
    #[error("Invalid scenario {path}: {source}")]
    Parse {
        /// Path of the scenario file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// A directory to seed plus the steps to run against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scope the sessions are seeded into.
    pub scope: Scope,
    /// Server-side sessions at the start of the run.
    #[serde(default)]
    pub sessions: Vec<Session>,
    /// Steps, run in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Kind of failure injected by [`Step::FailNext`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network or server failure.
    #[default]
    Transient,
    /// The session does not exist on the server.
    NotFound,
    /// The server refused the request.
    Rejected,
}

impl FailureKind {
    fn into_error(self, message: String) -> BackendError {
        match self {
            FailureKind::Transient => BackendError::Transient(message),
            FailureKind::NotFound => BackendError::NotFound(message),
            FailureKind::Rejected => BackendError::Rejected(message),
        }
    }
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Select the scenario scope and load its directory.
    LoadScope,
    /// Open (or find) the tab for a session.
    OpenSession {
        /// Target session.
        session_id: String,
    },
    /// Open a tab for a brand-new session.
    NewTab {
        /// Title of the new session.
        title: String,
    },
    /// Navigate to a session through the guard.
    Switch {
        /// Target session.
        session_id: String,
        /// Abort live streams instead of refusing.
        #[serde(default)]
        force_abort: bool,
    },
    /// The transport started a stream.
    StreamStart {
        /// Streaming session.
        session_id: String,
    },
    /// The transport delivered a complete message.
    StreamMessage {
        /// Streaming session.
        session_id: String,
        /// Message id.
        message_id: String,
        /// Author.
        #[serde(default = "default_stream_role")]
        role: Role,
        /// Body.
        content: String,
    },
    /// The transport delivered a token.
    StreamToken {
        /// Streaming session.
        session_id: String,
        /// Message the token extends.
        message_id: String,
        /// Token text.
        text: String,
    },
    /// The transport finished the stream.
    StreamEnd {
        /// Streaming session.
        session_id: String,
    },
    /// The user stopped the stream.
    StreamAbort {
        /// Streaming session.
        session_id: String,
    },
    /// The server persisted a message (no engine call).
    PushHistory {
        /// Target session.
        session_id: String,
        /// Backend role string.
        role: String,
        /// Body.
        content: String,
    },
    /// Refetch the directory and reconcile.
    Refresh,
    /// Rename a session.
    Rename {
        /// Target session.
        session_id: String,
        /// New title.
        title: String,
    },
    /// Delete a session.
    Delete {
        /// Target session.
        session_id: String,
    },
    /// Close the tab showing a session.
    CloseTab {
        /// Session shown by the tab.
        session_id: String,
    },
    /// Reopen a recently closed session.
    ReopenClosed {
        /// Target session.
        session_id: String,
    },
    /// Make the next backend call of `operation` fail.
    FailNext {
        /// Operation to fail.
        operation: Operation,
        /// Failure kind.
        #[serde(default)]
        kind: FailureKind,
        /// Error message.
        #[serde(default)]
        message: String,
    },
    /// Wait.
    Sleep {
        /// Milliseconds to wait.
        ms: u64,
    },
    /// Clear every streaming flag and reset the guard.
    ForceCleanup,
}

fn default_stream_role() -> Role {
    Role::Agent
}

impl Step {
    /// The step's `op` name.
    pub fn name(&self) -> &'static str {
        match self {
            Step::LoadScope => "load_scope",
            Step::OpenSession { .. } => "open_session",
            Step::NewTab { .. } => "new_tab",
            Step::Switch { .. } => "switch",
            Step::StreamStart { .. } => "stream_start",
            Step::StreamMessage { .. } => "stream_message",
            Step::StreamToken { .. } => "stream_token",
            Step::StreamEnd { .. } => "stream_end",
            Step::StreamAbort { .. } => "stream_abort",
            Step::PushHistory { .. } => "push_history",
            Step::Refresh => "refresh",
            Step::Rename { .. } => "rename",
            Step::Delete { .. } => "delete",
            Step::CloseTab { .. } => "close_tab",
            Step::ReopenClosed { .. } => "reopen_closed",
            Step::FailNext { .. } => "fail_next",
            Step::Sleep { .. } => "sleep",
            Step::ForceCleanup => "force_cleanup",
        }
    }
}

impl Scenario {
    /// Parses a scenario from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reads and parses a scenario file.
    pub fn from_path(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ScenarioError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// What happened when a step ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Position in the step list.
    pub index: usize,
    /// The step's `op` name.
    pub op: &'static str,
    /// Whether the step did what it asked for.
    pub ok: bool,
    /// Result or error description.
    pub detail: String,
}

/// Result of a replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Replay {
    /// One report per step.
    pub reports: Vec<StepReport>,
    /// Engine state after the last step.
    pub dump: EngineDump,
}

/// Runs scenarios against a fresh engine over an in-memory backend.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    engine: Engine,
    backend: InMemoryBackend,
}

impl ScenarioRunner {
    /// Creates a runner with a fresh engine using `settings`.
    pub fn new(settings: EngineSettings) -> Self {
        let backend = InMemoryBackend::new();
        let engine = Engine::new(Arc::new(backend.clone()), settings);
        Self { engine, backend }
    }

    /// The engine under test.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The backend the engine talks to.
    pub fn backend(&self) -> &InMemoryBackend {
        &self.backend
    }

    /// Seeds the backend and runs every step.
    ///
    /// A failing step is reported and the replay continues.
    pub async fn run(&self, scenario: &Scenario) -> Replay {
        self.backend
            .seed(scenario.scope.clone(), scenario.sessions.clone())
            .await;

        let mut reports = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            let (ok, detail) = match self.run_step(&scenario.scope, step).await {
                Ok(detail) => (true, detail),
                Err(detail) => (false, detail),
            };
            if ok {
                tracing::info!(index, op = step.name(), %detail, "step done");
            } else {
                tracing::warn!(index, op = step.name(), %detail, "step failed");
            }
            reports.push(StepReport {
                index,
                op: step.name(),
                ok,
                detail,
            });
        }

        Replay {
            reports,
            dump: self.engine.dump().await,
        }
    }

    async fn run_step(&self, scope: &Scope, step: &Step) -> Result<String, String> {
        let engine = &self.engine;
        match step {
            Step::LoadScope => {
                let sessions = engine.set_scope(scope.clone()).await.map_err(err)?;
                Ok(format!("{} sessions", sessions.len()))
            }
            Step::OpenSession { session_id } => {
                let tab = engine.open_session(session_id).await.map_err(err)?;
                Ok(format!("tab {}", tab.tab_id))
            }
            Step::NewTab { title } => {
                let tab = engine.open_new_tab(title).await.map_err(err)?;
                Ok(format!(
                    "tab {} -> {}",
                    tab.tab_id,
                    tab.session_id.unwrap_or_default()
                ))
            }
            Step::Switch {
                session_id,
                force_abort,
            } => {
                let options = NavigateOptions {
                    force_abort: *force_abort,
                };
                if let Err(rejection) = engine.guard().check(session_id, *force_abort) {
                    return Err(rejection.to_string());
                }
                match engine.switch_to(session_id, options).await.map_err(err)? {
                    true => Ok("navigated".to_string()),
                    false => Err("navigation refused".to_string()),
                }
            }
            Step::StreamStart { session_id } => {
                engine.on_stream_start(session_id);
                Ok("streaming".to_string())
            }
            Step::StreamMessage {
                session_id,
                message_id,
                role,
                content,
            } => {
                let chunk = StreamChunk::Message(Message::new(message_id, *role, content));
                delivered(engine.on_stream_chunk(session_id, chunk).await)
            }
            Step::StreamToken {
                session_id,
                message_id,
                text,
            } => {
                let chunk = StreamChunk::Token {
                    message_id: message_id.clone(),
                    text: text.clone(),
                };
                delivered(engine.on_stream_chunk(session_id, chunk).await)
            }
            Step::StreamEnd { session_id } => match engine.on_stream_end(session_id).await {
                true => Ok("ended".to_string()),
                false => Err("no live stream".to_string()),
            },
            Step::StreamAbort { session_id } => match engine.abort_stream(session_id) {
                true => Ok("aborted".to_string()),
                false => Err("no live stream".to_string()),
            },
            Step::PushHistory {
                session_id,
                role,
                content,
            } => {
                let entry = HistoryEntry::new(
                    role.as_str(),
                    content.as_str(),
                    chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
                );
                match self.backend.push_history(scope, session_id, entry).await {
                    true => Ok("persisted".to_string()),
                    false => Err(format!("no server session {}", session_id)),
                }
            }
            Step::Refresh => {
                let sessions = engine.refresh().await.map_err(err)?;
                Ok(format!("{} sessions", sessions.len()))
            }
            Step::Rename { session_id, title } => {
                let outcome = engine.rename_session(session_id, title).await.map_err(err)?;
                Ok(format!("{:?}", outcome))
            }
            Step::Delete { session_id } => {
                let outcome = engine.delete_session(session_id).await.map_err(err)?;
                Ok(format!("{:?}", outcome))
            }
            Step::CloseTab { session_id } => {
                let tab_id = engine
                    .tab_registry()
                    .find_tab_by_session(session_id)
                    .await
                    .ok_or_else(|| err(SyncError::NoTabForSession(session_id.clone())))?;
                engine
                    .close_tab(&tab_id)
                    .await
                    .map(|tab| format!("closed {}", tab.tab_id))
                    .ok_or_else(|| format!("tab {} vanished", tab_id))
            }
            Step::ReopenClosed { session_id } => {
                let tab = engine.reopen_closed(session_id).await.map_err(err)?;
                Ok(format!("tab {}", tab.tab_id))
            }
            Step::FailNext {
                operation,
                kind,
                message,
            } => {
                self.backend
                    .fail_next(*operation, kind.into_error(message.clone()));
                Ok(format!("next {} fails", operation))
            }
            Step::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(format!("slept {}ms", ms))
            }
            Step::ForceCleanup => {
                let cleared = engine.force_cleanup();
                Ok(format!("cleared {:?}", cleared))
            }
        }
    }
}

fn err(error: SyncError) -> String {
    error.to_string()
}

fn delivered(applied: bool) -> Result<String, String> {
    match applied {
        true => Ok("applied".to_string()),
        false => Err("dropped, no live stream".to_string()),
    }
}

/// Replays `scenario` on a fresh engine.
pub async fn replay(scenario: &Scenario, settings: EngineSettings) -> Replay {
    ScenarioRunner::new(settings).run(scenario).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_op() {
        let json = r#"{
            "scope": {"workspace_id": "w", "project_id": "p", "user_id": "u", "component_id": "c"},
            "steps": [
                {"op": "load_scope"},
                {"op": "open_session", "session_id": "s1"},
                {"op": "new_tab", "title": "x"},
                {"op": "switch", "session_id": "s1"},
                {"op": "stream_start", "session_id": "s1"},
                {"op": "stream_message", "session_id": "s1", "message_id": "m", "content": "c"},
                {"op": "stream_token", "session_id": "s1", "message_id": "m", "text": "t"},
                {"op": "stream_end", "session_id": "s1"},
                {"op": "stream_abort", "session_id": "s1"},
                {"op": "push_history", "session_id": "s1", "role": "assistant", "content": "a"},
                {"op": "refresh"},
                {"op": "rename", "session_id": "s1", "title": "y"},
                {"op": "delete", "session_id": "s1"},
                {"op": "close_tab", "session_id": "s1"},
                {"op": "reopen_closed", "session_id": "s1"},
                {"op": "fail_next", "operation": "rename", "message": "boom"},
                {"op": "sleep", "ms": 400},
                {"op": "force_cleanup"}
            ]
        }"#;
        let scenario = Scenario::from_json(json).expect("valid scenario");
        assert!(scenario.sessions.is_empty());
        assert_eq!(scenario.steps.len(), 18);
        assert_eq!(
            scenario.steps[3],
            Step::Switch {
                session_id: "s1".into(),
                force_abort: false
            }
        );
        assert!(matches!(
            &scenario.steps[5],
            Step::StreamMessage { role: Role::Agent, .. }
        ));
        assert_eq!(
            scenario.steps[15],
            Step::FailNext {
                operation: Operation::Rename,
                kind: FailureKind::Transient,
                message: "boom".into()
            }
        );
    }

    #[test]
    fn unknown_op_is_rejected() {
        let json = r#"{
            "scope": {"workspace_id": "w", "project_id": "p", "user_id": "u", "component_id": "c"},
            "steps": [{"op": "teleport"}]
        }"#;
        assert!(Scenario::from_json(json).is_err());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = Scenario::from_path(&dir.path().join("none.json")).expect_err("missing");
        assert!(matches!(err, ScenarioError::Read { .. }));
    }

    #[test]
    fn step_names_match_serialized_op() {
        let step = Step::StreamToken {
            session_id: "s".into(),
            message_id: "m".into(),
            text: "t".into(),
        };
        let json = serde_json::to_value(&step).expect("serialize");
        assert_eq!(json["op"], step.name());
    }

    #[tokio::test]
    async fn failing_step_does_not_stop_replay() {
        let scenario = Scenario {
            scope: Scope::new("w", "p", "u", "c"),
            sessions: vec![Session::new("s1", "One")],
            steps: vec![
                Step::LoadScope,
                Step::StreamEnd {
                    session_id: "s1".into(),
                },
                Step::OpenSession {
                    session_id: "s1".into(),
                },
            ],
        };
        let replay = replay(&scenario, EngineSettings::default()).await;
        let ok: Vec<bool> = replay.reports.iter().map(|r| r.ok).collect();
        assert_eq!(ok, vec![true, false, true]);
        assert_eq!(replay.dump.tabs.len(), 1);
    }
}
