//! Session directory cache.
//!
//! Holds the last-fetched, server-authoritative session list for each
//! [`Scope`]. The cache is read-mostly: it is refreshed only when a caller
//! asks for it ([`DirectoryCache::fetch`] on a stale or missing entry,
//! [`DirectoryCache::refetch`] always), never on a timer.
//!
//! Every fetch and every local write takes a ticket from one monotonically
//! increasing clock. A fetch response is stored only if its ticket is newer
//! than the entry's version, so a slow response that was requested before a
//! newer fetch or an optimistic write can never overwrite it.

use crate::backend::SessionBackend;
use crate::{Scope, Session};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[cfg(test)]
mod tests;

mod fetch;

/// Returns the session with `session_id` from a fetched list.
///
/// `None` means "unknown", not "deleted".
pub fn find_session<'a>(sessions: &'a [Session], session_id: &str) -> Option<&'a Session> {
    sessions.iter().find(|s| s.session_id == session_id)
}

/// One cached directory.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    sessions: Vec<Session>,
    stale: bool,
    fetched_at: Option<DateTime<Utc>>,
    version: u64,
}

impl CacheEntry {
    /// The cached sessions.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Whether the next fetch must go to the backend.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// When the entry was last filled from the backend.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }
}

/// Summary of one cache entry, for dumps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryInfo {
    /// Scope of the entry.
    pub scope: Scope,
    /// Number of cached sessions.
    pub session_count: usize,
    /// Whether the entry is stale.
    pub stale: bool,
    /// Last successful fetch.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Version of the last applied write.
    pub version: u64,
}

/// Thread-safe cache of session directories keyed by scope.
#[derive(Clone)]
pub struct DirectoryCache {
    backend: Arc<dyn SessionBackend>,
    entries: Arc<RwLock<HashMap<Scope, CacheEntry>>>,
    clock: Arc<AtomicU64>,
}

impl std::fmt::Debug for DirectoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryCache")
            .field("entries", &self.entries)
            .field("clock", &self.clock)
            .finish()
    }
}

impl DirectoryCache {
    /// Creates an empty cache backed by `backend`.
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            backend,
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Takes the next ticket from the cache clock.
    fn next_ticket(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the cached sessions for `scope` without touching the network.
    ///
    /// Stale entries are returned as well.
    pub async fn get(&self, scope: &Scope) -> Option<Vec<Session>> {
        let entries = self.entries.read().await;
        entries.get(scope).map(|e| e.sessions.clone())
    }

    /// Looks up one session in the cached directory for `scope`.
    pub async fn lookup(&self, scope: &Scope, session_id: &str) -> Option<Session> {
        let entries = self.entries.read().await;
        entries
            .get(scope)
            .and_then(|e| find_session(&e.sessions, session_id))
            .cloned()
    }

    /// Marks the entry for `scope` stale; its data stays readable.
    ///
    /// Returns `false` if nothing is cached for `scope`.
    pub async fn invalidate(&self, scope: &Scope) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(scope) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    /// Captures the entry for `scope` so it can be put back later.
    pub async fn snapshot(&self, scope: &Scope) -> Option<CacheEntry> {
        let entries = self.entries.read().await;
        entries.get(scope).cloned()
    }

    /// Puts a captured entry back; `None` removes whatever is cached now.
    ///
    /// Counts as a local write: fetches that started earlier are discarded.
    pub async fn restore(&self, scope: &Scope, snapshot: Option<CacheEntry>) {
        let version = self.next_ticket();
        let mut entries = self.entries.write().await;
        match snapshot {
            Some(mut entry) => {
                entry.version = version;
                entries.insert(scope.clone(), entry);
            }
            None => {
                entries.remove(scope);
            }
        }
    }

    /// Edits the cached session list for `scope` in place.
    ///
    /// Returns `false` if nothing is cached for `scope`. Counts as a local
    /// write like [`DirectoryCache::restore`].
    pub async fn update<F>(&self, scope: &Scope, f: F) -> bool
    where
        F: FnOnce(&mut Vec<Session>),
    {
        let version = self.next_ticket();
        let mut entries = self.entries.write().await;
        match entries.get_mut(scope) {
            Some(entry) => {
                f(&mut entry.sessions);
                entry.version = version;
                true
            }
            None => false,
        }
    }

    /// Returns every cached scope, sorted.
    pub async fn scopes(&self) -> Vec<Scope> {
        let entries = self.entries.read().await;
        let mut scopes: Vec<Scope> = entries.keys().cloned().collect();
        scopes.sort();
        scopes
    }

    /// Returns a summary of every cache entry, sorted by scope.
    pub async fn entry_info(&self) -> Vec<EntryInfo> {
        let entries = self.entries.read().await;
        let mut info: Vec<EntryInfo> = entries
            .iter()
            .map(|(scope, e)| EntryInfo {
                scope: scope.clone(),
                session_count: e.sessions.len(),
                stale: e.stale,
                fetched_at: e.fetched_at,
                version: e.version,
            })
            .collect();
        info.sort_by(|a, b| a.scope.cmp(&b.scope));
        info
    }
}
