//! Delete and rename through the Engine.

use super::{engine_with, scope, session};
use crate::backend::{BackendError, Operation};
use crate::mutation::MutationOutcome;
use crate::transport::StreamChunk;

#[tokio::test]
async fn delete_removes_tab_log_and_server_session() {
    let (engine, backend) = engine_with(vec![session("s1", 2), session("s2", 0)]).await;
    engine.open_session("s1").await.expect("open");

    let outcome = engine.delete_session("s1").await.expect("delete");
    assert_eq!(outcome, MutationOutcome::Committed);
    assert!(engine.tabs().await.is_empty());
    assert!(engine.messages("s1").await.is_empty());
    assert_eq!(backend.sessions(&scope()).await.len(), 1);
    assert!(engine.directory().lookup(&scope(), "s1").await.is_none());
}

#[tokio::test]
async fn deleting_streaming_session_aborts_stream_first() {
    let (engine, _) = engine_with(vec![session("s1", 0)]).await;
    engine.open_session("s1").await.expect("open");
    let token = engine.on_stream_start("s1");
    engine
        .on_stream_chunk(
            "s1",
            StreamChunk::Token {
                message_id: "r".into(),
                text: "partial".into(),
            },
        )
        .await;

    engine.delete_session("s1").await.expect("delete");
    assert!(token.is_cancelled());
    assert!(!engine.is_streaming("s1"));
    assert!(engine.messages("s1").await.is_empty());
}

#[tokio::test]
async fn failed_delete_leaves_everything_as_it_was() {
    let (engine, backend) = engine_with(vec![session("s1", 2)]).await;
    engine.open_session("s1").await.expect("open");
    let before = engine.dump().await;
    backend.fail_next(Operation::Delete, BackendError::Transient("timeout".into()));

    assert!(engine.delete_session("s1").await.is_err());

    let after = engine.dump().await;
    assert_eq!(after.tabs, before.tabs);
    assert_eq!(after.messages, before.messages);
    assert_eq!(
        engine.directory().get(&scope()).await.map(|s| s.len()),
        Some(1)
    );
}

#[tokio::test]
async fn rename_updates_tab_and_directory() {
    let (engine, backend) = engine_with(vec![session("s1", 0)]).await;
    engine.open_session("s1").await.expect("open");

    engine.rename_session("s1", "Renamed").await.expect("rename");
    assert_eq!(engine.tabs().await[0].title, "Renamed");
    assert_eq!(backend.sessions(&scope()).await[0].title, "Renamed");
}

#[tokio::test]
async fn failed_rename_keeps_old_title() {
    let (engine, backend) = engine_with(vec![session("s1", 0)]).await;
    engine.open_session("s1").await.expect("open");
    backend.fail_next(Operation::Rename, BackendError::Rejected("nope".into()));

    assert!(engine.rename_session("s1", "Renamed").await.is_err());
    assert_eq!(engine.tabs().await[0].title, "Title s1");
    assert_eq!(
        engine.directory().lookup(&scope(), "s1").await.map(|s| s.title),
        Some("Title s1".to_string())
    );
}
