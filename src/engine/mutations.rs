//! Session mutations on the Engine.

use super::Engine;
use crate::events::EngineEvent;
use crate::mutation::{MutationKind, MutationOutcome};
use crate::SyncError;

impl Engine {
    /// Deletes a session optimistically.
    ///
    /// A live stream into the session is aborted first. On failure every
    /// local change is rolled back and the error returned.
    pub async fn delete_session(&self, session_id: &str) -> Result<MutationOutcome, SyncError> {
        let scope = self.require_scope().await?;
        self.abort_stream(session_id);

        let result = self.mutations.delete_session(&scope, session_id).await;
        self.after_mutation(&scope, session_id, MutationKind::Delete, &result)
            .await;
        result
    }

    /// Renames a session optimistically.
    pub async fn rename_session(
        &self,
        session_id: &str,
        title: &str,
    ) -> Result<MutationOutcome, SyncError> {
        let scope = self.require_scope().await?;
        let result = self
            .mutations
            .rename_session(&scope, session_id, title)
            .await;
        let kind = MutationKind::Rename {
            title: title.to_string(),
        };
        self.after_mutation(&scope, session_id, kind, &result).await;
        result
    }

    async fn after_mutation(
        &self,
        scope: &crate::Scope,
        session_id: &str,
        mutation: MutationKind,
        result: &Result<MutationOutcome, SyncError>,
    ) {
        match result {
            Ok(outcome) => {
                self.events.emit(EngineEvent::MutationCommitted {
                    session_id: session_id.to_string(),
                    mutation,
                    outcome: *outcome,
                });
                let outcomes = self.reconciler.reconcile_scope(scope).await;
                self.emit_synced(&outcomes);
            }
            Err(error) => {
                self.events.emit(EngineEvent::MutationRolledBack {
                    session_id: session_id.to_string(),
                    mutation,
                    error: error.to_string(),
                });
            }
        }
        self.events.emit(EngineEvent::MessagesChanged {
            session_id: session_id.to_string(),
        });
        self.events.emit(EngineEvent::TabsChanged);
    }
}
