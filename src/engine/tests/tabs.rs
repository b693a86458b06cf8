//! Tab flows on the Engine.

use super::{engine_with, scope, session};
use crate::backend::{BackendError, InMemoryBackend, Operation};
use crate::engine::{Engine, EngineSettings};
use crate::navigation::NavigateOptions;
use crate::tabs::TabId;
use crate::SyncError;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// open_new_tab
// =============================================================================

#[tokio::test]
async fn new_tab_gets_created_session() {
    let (engine, backend) = engine_with(vec![]).await;

    let tab = engine.open_new_tab("Fresh loop").await.expect("create");
    let session_id = tab.session_id.clone().expect("session assigned");
    assert!(!tab.is_creating);
    assert_eq!(tab.title, "Fresh loop");

    let server = backend.sessions(&scope()).await;
    assert_eq!(server.len(), 1);
    assert_eq!(server[0].session_id, session_id);
    assert!(engine.directory().lookup(&scope(), &session_id).await.is_some());
}

#[tokio::test]
async fn failed_creation_removes_pending_tab() {
    let (engine, backend) = engine_with(vec![]).await;
    backend.fail_next(Operation::Create, BackendError::Transient("503".into()));

    let err = engine.open_new_tab("Doomed").await.expect_err("create fails");
    assert!(matches!(err, SyncError::Backend(_)));
    assert!(engine.tabs().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn closing_pending_tab_still_lists_created_session() {
    let backend = InMemoryBackend::new().with_latency(Duration::from_millis(50));
    let engine = Engine::new(Arc::new(backend.clone()), EngineSettings::default());
    engine.set_scope(scope()).await.expect("load scope");

    let closer = async {
        loop {
            if let Some(tab) = engine.tabs().await.into_iter().next() {
                assert!(tab.is_creating);
                return engine.close_tab(&tab.tab_id).await;
            }
            tokio::task::yield_now().await;
        }
    };
    let (created, closed) = tokio::join!(engine.open_new_tab("Short-lived"), closer);

    assert!(closed.is_some());
    assert!(matches!(created, Err(SyncError::TabNotFound(_))));
    assert!(engine.tabs().await.is_empty());

    let server = backend.sessions(&scope()).await;
    assert_eq!(server.len(), 1);
    assert!(engine
        .directory()
        .lookup(&scope(), &server[0].session_id)
        .await
        .is_some());
}

// =============================================================================
// open_session / close_tab / reopen_closed
// =============================================================================

#[tokio::test]
async fn open_session_uses_directory_title_and_loads_history() {
    let (engine, _) = engine_with(vec![session("s1", 3)]).await;
    let tab = engine.open_session("s1").await.expect("open");

    assert_eq!(tab.title, "Title s1");
    assert!(tab.loaded_at.is_some());
    assert_eq!(engine.messages("s1").await.len(), 3);
}

#[tokio::test]
async fn open_session_twice_returns_same_tab() {
    let (engine, _) = engine_with(vec![session("s1", 0)]).await;
    let first = engine.open_session("s1").await.expect("open");
    let second = engine.open_session("s1").await.expect("open again");
    assert_eq!(first.tab_id, second.tab_id);
    assert_eq!(engine.tabs().await.len(), 1);
}

#[tokio::test]
async fn open_unknown_session_uses_id_as_title() {
    let (engine, _) = engine_with(vec![]).await;
    let tab = engine.open_session("mystery").await.expect("open");
    assert_eq!(tab.title, "mystery");
}

#[tokio::test]
async fn close_and_reopen_tab() {
    let (engine, _) = engine_with(vec![session("s1", 2)]).await;
    let tab = engine.open_session("s1").await.expect("open");

    engine.close_tab(&tab.tab_id).await.expect("close");
    assert!(engine.tabs().await.is_empty());
    assert_eq!(engine.closed_tabs().await.len(), 1);

    let reopened = engine.reopen_closed("s1").await.expect("reopen");
    assert_eq!(reopened.session_id.as_deref(), Some("s1"));
    assert!(engine.closed_tabs().await.is_empty());
    assert!(engine.close_tab(&TabId::new("nope")).await.is_none());
}

// =============================================================================
// switch_to
// =============================================================================

#[tokio::test(start_paused = true)]
async fn switch_opens_and_activates() {
    let (engine, _) = engine_with(vec![session("s1", 1), session("s2", 2)]).await;
    engine.open_session("s1").await.expect("open");

    assert_eq!(
        engine.switch_to("s2", NavigateOptions::default()).await.ok(),
        Some(true)
    );
    let active = engine.active_tab().await.expect("active");
    assert_eq!(active.session_id.as_deref(), Some("s2"));
    assert_eq!(engine.active_messages().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn switch_is_refused_while_streaming() {
    let (engine, _) = engine_with(vec![session("s1", 1), session("s2", 2)]).await;
    engine.open_session("s1").await.expect("open");
    engine.on_stream_start("s1");

    assert_eq!(
        engine.switch_to("s2", NavigateOptions::default()).await.ok(),
        Some(false)
    );
    assert!(engine.is_streaming("s1"));
    assert_eq!(
        engine.active_tab().await.and_then(|t| t.session_id).as_deref(),
        Some("s1")
    );
}

#[tokio::test(start_paused = true)]
async fn forced_switch_aborts_stream() {
    let (engine, _) = engine_with(vec![session("s1", 1), session("s2", 2)]).await;
    engine.open_session("s1").await.expect("open");
    let token = engine.on_stream_start("s1");

    assert_eq!(
        engine.switch_to("s2", NavigateOptions::forced()).await.ok(),
        Some(true)
    );
    assert!(token.is_cancelled());
    assert!(!engine.any_streaming());
}

#[tokio::test(start_paused = true)]
async fn rapid_switches_are_debounced() {
    let (engine, _) = engine_with(vec![session("s1", 0), session("s2", 0)]).await;

    assert_eq!(engine.switch_to("s1", NavigateOptions::default()).await.ok(), Some(true));
    assert_eq!(engine.switch_to("s2", NavigateOptions::default()).await.ok(), Some(false));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(engine.switch_to("s2", NavigateOptions::default()).await.ok(), Some(true));
}
