//! Network refresh for the DirectoryCache.

use super::{CacheEntry, DirectoryCache};
use crate::backend::BackendError;
use crate::{Scope, Session};
use chrono::Utc;

impl DirectoryCache {
    /// Returns the sessions for `scope`.
    ///
    /// Served from the cache when a fresh entry exists; otherwise the
    /// backend is asked (see [`DirectoryCache::refetch`]).
    pub async fn fetch(&self, scope: &Scope) -> Result<Vec<Session>, BackendError> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(scope) {
                if !entry.stale {
                    return Ok(entry.sessions.clone());
                }
            }
        }
        self.refetch(scope).await
    }

    /// Asks the backend for the sessions in `scope` and caches the answer.
    ///
    /// On failure the error is returned and any cached value is kept. If a
    /// newer fetch or a local write landed while this request was in flight,
    /// the response is dropped and the current cached list is returned.
    pub async fn refetch(&self, scope: &Scope) -> Result<Vec<Session>, BackendError> {
        let ticket = self.next_ticket();
        tracing::debug!(%scope, ticket, "fetching session directory");

        let sessions = match self.backend.get_sessions(scope).await {
            Ok(sessions) => sessions,
            Err(error) => {
                tracing::warn!(%scope, %error, "session directory fetch failed, keeping cached value");
                return Err(error);
            }
        };

        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(scope) {
            if entry.version > ticket {
                tracing::debug!(
                    %scope,
                    ticket,
                    version = entry.version,
                    "discarding out-of-order directory response"
                );
                return Ok(entry.sessions.clone());
            }
        }

        entries.insert(
            scope.clone(),
            CacheEntry {
                sessions: sessions.clone(),
                stale: false,
                fetched_at: Some(Utc::now()),
                version: ticket,
            },
        );
        Ok(sessions)
    }
}
