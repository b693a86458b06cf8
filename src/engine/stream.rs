//! Transport callbacks on the Engine.

use super::Engine;
use crate::events::EngineEvent;
use crate::reconciler::SyncOutcome;
use crate::transport::StreamChunk;
use tokio_util::sync::CancellationToken;

impl Engine {
    /// A stream started writing to `session_id`.
    ///
    /// The returned token is cancelled if the stream is aborted; the
    /// transport should stop delivering chunks when it fires.
    pub fn on_stream_start(&self, session_id: &str) -> CancellationToken {
        let token = self.transport.start(session_id);
        self.events.emit(EngineEvent::StreamStarted {
            session_id: session_id.to_string(),
        });
        token
    }

    /// A chunk arrived for `session_id`.
    ///
    /// Returns `false` if the chunk was dropped because no stream is live.
    pub async fn on_stream_chunk(&self, session_id: &str, chunk: StreamChunk) -> bool {
        let applied = self.transport.chunk(session_id, chunk).await;
        if applied {
            self.events.emit(EngineEvent::MessagesChanged {
                session_id: session_id.to_string(),
            });
        }
        applied
    }

    /// The stream for `session_id` finished.
    ///
    /// Clears the streaming flag and, if configured, refetches the directory
    /// so the reconciler can pick up what the server persisted. Returns
    /// `false` if no stream was live.
    pub async fn on_stream_end(&self, session_id: &str) -> bool {
        if !self.transport.end(session_id) {
            tracing::warn!(session_id, "stream end for session with no live stream");
            return false;
        }
        self.reconciler.forget(session_id);
        self.events.emit(EngineEvent::StreamEnded {
            session_id: session_id.to_string(),
        });

        if self.settings.refetch_on_stream_end {
            if let Some(scope) = self.scope().await {
                match self.directory.refetch(&scope).await {
                    Ok(_) => {
                        let outcome = self.reconciler.reconcile(&scope, session_id).await;
                        if matches!(outcome, SyncOutcome::Synced { .. }) {
                            self.events.emit(EngineEvent::MessagesChanged {
                                session_id: session_id.to_string(),
                            });
                        }
                    }
                    Err(error) => {
                        tracing::warn!(session_id, %error, "refetch after stream end failed");
                    }
                }
            }
        }
        true
    }

    /// Aborts the stream for `session_id`, keeping its partial content.
    ///
    /// Returns `false` if no stream was live.
    pub fn abort_stream(&self, session_id: &str) -> bool {
        if !self.transport.abort(session_id) {
            return false;
        }
        self.reconciler.forget(session_id);
        self.events.emit(EngineEvent::StreamAborted {
            session_id: session_id.to_string(),
        });
        true
    }

    /// Clears every streaming flag and resets the navigation guard.
    ///
    /// Recovery path for a stream that never reported its end.
    pub fn force_cleanup(&self) -> Vec<String> {
        let cleared = self.guard.force_cleanup();
        for session_id in &cleared {
            self.reconciler.forget(session_id);
        }
        self.events.emit(EngineEvent::StreamsCleared {
            sessions: cleared.clone(),
        });
        cleared
    }
}
