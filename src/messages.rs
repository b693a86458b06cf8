//! Per-session message log.
//!
//! The log for a session is replaced wholesale by the reconciler when the
//! session is idle and grows append-only while a stream is writing to it.
//! [`MessageLog::set_messages`] refuses to touch a streaming session; the
//! check happens under the log's write lock so a sync can never land after
//! a stream has started.

use crate::streaming::StreamingTracker;
use crate::{Message, Role};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result of [`MessageLog::replace_if`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The log was replaced.
    Replaced,
    /// A stream owns the log; nothing was touched.
    Streaming,
    /// The predicate refused the log holding `existing` messages.
    Kept {
        /// Messages held at the time of the check.
        existing: usize,
    },
}

/// Thread-safe store of message logs keyed by session id.
#[derive(Debug, Clone)]
pub struct MessageLog {
    logs: Arc<RwLock<HashMap<String, Vec<Message>>>>,
    streaming: StreamingTracker,
}

impl MessageLog {
    /// Creates an empty log store guarded by `streaming`.
    pub fn new(streaming: StreamingTracker) -> Self {
        Self {
            logs: Arc::new(RwLock::new(HashMap::new())),
            streaming,
        }
    }

    /// Returns the messages for `session_id`, or an empty list if unknown.
    pub async fn get_messages(&self, session_id: &str) -> Vec<Message> {
        let logs = self.logs.read().await;
        logs.get(session_id).cloned().unwrap_or_default()
    }

    /// Returns how many messages are held for `session_id`.
    pub async fn message_count(&self, session_id: &str) -> usize {
        let logs = self.logs.read().await;
        logs.get(session_id).map(Vec::len).unwrap_or(0)
    }

    /// Replaces the log for `session_id`.
    ///
    /// No-op while the session is streaming. Returns `true` if the log was
    /// replaced.
    pub async fn set_messages(&self, session_id: &str, messages: Vec<Message>) -> bool {
        let mut logs = self.logs.write().await;
        if self.streaming.is_active(session_id) {
            tracing::debug!(
                session_id,
                incoming = messages.len(),
                "skipping message replace, session is streaming"
            );
            return false;
        }
        logs.insert(session_id.to_string(), messages);
        true
    }

    /// Replaces the log for `session_id` if `accept` approves the current
    /// message count.
    ///
    /// The streaming check, the count check and the write happen under one
    /// write lock, so a stream that starts and ends in between cannot be
    /// overwritten by an older snapshot.
    pub async fn replace_if<F>(
        &self,
        session_id: &str,
        messages: Vec<Message>,
        accept: F,
    ) -> ReplaceOutcome
    where
        F: FnOnce(usize) -> bool,
    {
        let mut logs = self.logs.write().await;
        if self.streaming.is_active(session_id) {
            tracing::debug!(session_id, "skipping message replace, session is streaming");
            return ReplaceOutcome::Streaming;
        }
        let existing = logs.get(session_id).map(Vec::len).unwrap_or(0);
        if !accept(existing) {
            return ReplaceOutcome::Kept { existing };
        }
        logs.insert(session_id.to_string(), messages);
        ReplaceOutcome::Replaced
    }

    /// Appends a complete message to the log.
    ///
    /// If the last message has the same id the transport is re-sending a
    /// growing message; it replaces the last one as long as its content is
    /// not shorter. Returns `false` if the message was ignored.
    pub async fn append_message(&self, session_id: &str, message: Message) -> bool {
        let mut logs = self.logs.write().await;
        let log = logs.entry(session_id.to_string()).or_default();
        match log.last_mut() {
            Some(last) if last.id == message.id => {
                if message.content.len() < last.content.len() {
                    tracing::debug!(
                        session_id,
                        message_id = %message.id,
                        "ignoring re-sent message shorter than the one already held"
                    );
                    return false;
                }
                *last = message;
            }
            _ => log.push(message),
        }
        true
    }

    /// Appends a token to the message `message_id`.
    ///
    /// The token extends the last message when its id matches; otherwise a
    /// new agent message is started.
    pub async fn append_token(&self, session_id: &str, message_id: &str, text: &str) {
        let mut logs = self.logs.write().await;
        let log = logs.entry(session_id.to_string()).or_default();
        match log.last_mut() {
            Some(last) if last.id == message_id => last.content.push_str(text),
            _ => log.push(Message::new(message_id, Role::Agent, text)),
        }
    }

    /// Removes the log for `session_id` and returns it.
    pub async fn clear_messages(&self, session_id: &str) -> Option<Vec<Message>> {
        let mut logs = self.logs.write().await;
        logs.remove(session_id)
    }

    /// Puts a previously cleared log back.
    ///
    /// `None` means the session had no log; any log created since is removed.
    /// Subject to the same streaming guard as [`MessageLog::set_messages`].
    pub async fn restore_messages(&self, session_id: &str, messages: Option<Vec<Message>>) -> bool {
        match messages {
            Some(messages) => self.set_messages(session_id, messages).await,
            None => {
                let mut logs = self.logs.write().await;
                if self.streaming.is_active(session_id) {
                    return false;
                }
                logs.remove(session_id);
                true
            }
        }
    }

    /// Returns every session id that has a log, sorted.
    pub async fn session_ids(&self) -> Vec<String> {
        let logs = self.logs.read().await;
        let mut ids: Vec<String> = logs.keys().cloned().collect();
        ids.sort();
        ids
    }
}
