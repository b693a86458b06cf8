//! Inbound surface for the streaming transport.
//!
//! The transport itself is a black box; it tells the engine when a stream
//! starts, hands over chunks as they arrive and reports the end. Each live
//! stream owns a [`CancellationToken`] that the transport should watch: it is
//! cancelled when the stream is aborted (user navigation, deletion, forced
//! cleanup).

use crate::messages::MessageLog;
use crate::streaming::StreamingTracker;
use crate::Message;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// One unit of streamed content.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// A complete message (user echo, tool output, or a re-sent agent message).
    Message(Message),
    /// An incremental piece of agent text for message `message_id`.
    Token {
        /// Message the token belongs to.
        message_id: String,
        /// Text to append.
        text: String,
    },
}

/// Starts, feeds, ends and aborts streams.
#[derive(Debug, Clone)]
pub struct StreamControl {
    streaming: StreamingTracker,
    messages: MessageLog,
    tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl StreamControl {
    /// Creates a controller writing into `messages` and flagging `streaming`.
    pub fn new(streaming: StreamingTracker, messages: MessageLog) -> Self {
        Self {
            streaming,
            messages,
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Marks `session_id` as streaming and returns the stream's cancellation
    /// token.
    ///
    /// Starting a stream for a session that already has one cancels the old
    /// token; the session stays active.
    pub fn start(&self, session_id: &str) -> CancellationToken {
        self.streaming.set_active(session_id);
        let token = CancellationToken::new();
        let previous = self
            .tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.to_string(), token.clone());
        if let Some(previous) = previous {
            tracing::warn!(session_id, "stream restarted, cancelling previous stream");
            previous.cancel();
        }
        tracing::debug!(session_id, "stream started");
        token
    }

    /// Applies one chunk to the session's message log.
    ///
    /// Chunks for a session with no live stream are dropped. Returns `true`
    /// if the chunk was applied.
    pub async fn chunk(&self, session_id: &str, chunk: StreamChunk) -> bool {
        if !self.streaming.record_chunk(session_id) {
            tracing::warn!(session_id, "dropping chunk for session with no live stream");
            return false;
        }
        match chunk {
            StreamChunk::Message(message) => self.messages.append_message(session_id, message).await,
            StreamChunk::Token { message_id, text } => {
                self.messages
                    .append_token(session_id, &message_id, &text)
                    .await;
                true
            }
        }
    }

    /// Marks the stream finished. Returns `false` if none was live.
    pub fn end(&self, session_id: &str) -> bool {
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
        let was_active = self.streaming.set_inactive(session_id);
        if was_active {
            tracing::debug!(session_id, "stream ended");
        }
        was_active
    }

    /// Cancels the stream for `session_id`. Partial content stays in the log.
    ///
    /// Returns `false` if no stream was live.
    pub fn abort(&self, session_id: &str) -> bool {
        let token = self
            .tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
        if let Some(token) = token {
            token.cancel();
        }
        let was_active = self.streaming.set_inactive(session_id);
        if was_active {
            tracing::info!(session_id, "stream aborted");
        }
        was_active
    }

    /// Aborts every live stream and returns the affected sessions.
    pub fn abort_all(&self) -> Vec<String> {
        let sessions = self.streaming.active_sessions();
        for session_id in &sessions {
            self.abort(session_id);
        }
        sessions
    }

    /// Clears every streaming flag and cancels every token, whatever state
    /// they are in. Returns the sessions that were flagged.
    pub fn force_cleanup(&self) -> Vec<String> {
        let tokens: Vec<(String, CancellationToken)> = self
            .tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .collect();
        for (_, token) in &tokens {
            token.cancel();
        }
        let cleared = self.streaming.clear_all();
        if !cleared.is_empty() || !tokens.is_empty() {
            tracing::warn!(
                sessions = ?cleared,
                tokens = tokens.len(),
                "forced stream cleanup"
            );
        }
        cleared
    }
}
