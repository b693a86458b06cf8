//! Streaming activity tracker.
//!
//! Records which sessions currently have a stream writing into their message
//! log. The tracker is a plain state holder: no I/O, no side effects. Writes
//! go through a synchronous lock so that a stream start is visible to every
//! reader before the next await point, which is what lets the message log
//! and the navigation guard check it without racing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Bookkeeping for one active stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamActivity {
    /// When the stream was marked active.
    pub started_at: DateTime<Utc>,
    /// Chunks recorded since the stream started.
    pub chunks: u64,
    /// When the last chunk was recorded.
    pub last_chunk_at: Option<DateTime<Utc>>,
    /// Start order, used to pick the oldest stream deterministically.
    #[serde(skip)]
    seq: u64,
}

#[derive(Debug, Default)]
struct TrackerState {
    active: HashMap<String, StreamActivity>,
    next_seq: u64,
}

/// Thread-safe map from session id to streaming activity.
///
/// Cloning the tracker yields another handle to the same state.
#[derive(Debug, Clone, Default)]
pub struct StreamingTracker {
    inner: Arc<RwLock<TrackerState>>,
}

impl StreamingTracker {
    /// Creates a tracker with no active streams.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `session_id` as streaming.
    ///
    /// Returns `false` if the session was already active (its activity record
    /// is left untouched).
    pub fn set_active(&self, session_id: &str) -> bool {
        let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if state.active.contains_key(session_id) {
            return false;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.active.insert(
            session_id.to_string(),
            StreamActivity {
                started_at: Utc::now(),
                chunks: 0,
                last_chunk_at: None,
                seq,
            },
        );
        true
    }

    /// Marks `session_id` as no longer streaming.
    ///
    /// Returns `true` if the session was active.
    pub fn set_inactive(&self, session_id: &str) -> bool {
        let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());
        state.active.remove(session_id).is_some()
    }

    /// Returns `true` if a stream is writing to `session_id`.
    pub fn is_active(&self, session_id: &str) -> bool {
        let state = self.inner.read().unwrap_or_else(|e| e.into_inner());
        state.active.contains_key(session_id)
    }

    /// Returns `true` if any session is streaming.
    pub fn has_any_active(&self) -> bool {
        let state = self.inner.read().unwrap_or_else(|e| e.into_inner());
        !state.active.is_empty()
    }

    /// Returns the session whose stream started first, if any.
    ///
    /// Navigation decisions assume at most one stream at a time; when several
    /// are active the oldest one is reported.
    pub fn active_session_id(&self) -> Option<String> {
        let state = self.inner.read().unwrap_or_else(|e| e.into_inner());
        state
            .active
            .iter()
            .min_by_key(|(_, activity)| activity.seq)
            .map(|(id, _)| id.clone())
    }

    /// Returns every streaming session, oldest first.
    pub fn active_sessions(&self) -> Vec<String> {
        let state = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<(&String, u64)> =
            state.active.iter().map(|(id, a)| (id, a.seq)).collect();
        entries.sort_by_key(|(_, seq)| *seq);
        entries.into_iter().map(|(id, _)| id.clone()).collect()
    }

    /// Records a chunk for an active stream.
    ///
    /// Returns `false` if the session is not streaming.
    pub fn record_chunk(&self, session_id: &str) -> bool {
        let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());
        match state.active.get_mut(session_id) {
            Some(activity) => {
                activity.chunks += 1;
                activity.last_chunk_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Returns the activity record for `session_id`.
    pub fn activity(&self, session_id: &str) -> Option<StreamActivity> {
        let state = self.inner.read().unwrap_or_else(|e| e.into_inner());
        state.active.get(session_id).cloned()
    }

    /// Clears every streaming flag and returns the sessions that were active.
    pub fn clear_all(&self) -> Vec<String> {
        let cleared = self.active_sessions();
        let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());
        state.active.clear();
        cleared
    }
}
