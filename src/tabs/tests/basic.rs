//! Basic read and activation tests for TabRegistry.

use super::{open, TabId, TabRegistry};
use crate::SyncError;

#[tokio::test]
async fn new_registry_is_empty() {
    let registry = TabRegistry::new();
    assert!(registry.list().await.is_empty());
    assert_eq!(registry.tab_count().await, 0);
    assert!(registry.active_tab().await.is_none());
}

#[tokio::test]
async fn list_preserves_open_order() {
    let registry = TabRegistry::new();
    for n in [3, 1, 2] {
        open(&registry, n).await;
    }
    let ids: Vec<String> = registry
        .list()
        .await
        .into_iter()
        .map(|t| t.tab_id.to_string())
        .collect();
    assert_eq!(ids, vec!["t3", "t1", "t2"]);
}

#[tokio::test]
async fn first_tab_becomes_active() {
    let registry = TabRegistry::new();
    open(&registry, 1).await;
    open(&registry, 2).await;
    let active = registry.active_tab().await.expect("active tab");
    assert_eq!(active.tab_id, TabId::new("t1"));
}

#[tokio::test]
async fn set_active_tab_by_session() {
    let registry = TabRegistry::new();
    open(&registry, 1).await;
    open(&registry, 2).await;

    let tab_id = registry.set_active_tab("s2").await.expect("tab for s2");
    assert_eq!(tab_id, TabId::new("t2"));
    assert_eq!(
        registry.active_tab().await.and_then(|t| t.session_id),
        Some("s2".to_string())
    );
}

#[tokio::test]
async fn set_active_tab_unknown_session_fails() {
    let registry = TabRegistry::new();
    let err = registry.set_active_tab("ghost").await.expect_err("no tab");
    assert!(matches!(err, SyncError::NoTabForSession(ref s) if s == "ghost"));
}

#[tokio::test]
async fn activate_tab_requires_existing_tab() {
    let registry = TabRegistry::new();
    open(&registry, 1).await;
    assert!(registry.activate_tab(&TabId::new("t1")).await.is_ok());
    let err = registry
        .activate_tab(&TabId::new("nope"))
        .await
        .expect_err("missing tab");
    assert!(matches!(err, SyncError::TabNotFound(_)));
}

#[tokio::test]
async fn find_tab_by_session() {
    let registry = TabRegistry::new();
    open(&registry, 1).await;
    assert_eq!(
        registry.find_tab_by_session("s1").await,
        Some(TabId::new("t1"))
    );
    assert_eq!(registry.find_tab_by_session("s9").await, None);
}

#[tokio::test]
async fn history_loaded_flag() {
    let registry = TabRegistry::new();
    open(&registry, 1).await;
    let t1 = TabId::new("t1");

    assert!(!registry.is_history_loaded(&t1).await);
    assert!(registry.mark_history_loaded(&t1).await);
    assert!(registry.is_history_loaded(&t1).await);

    assert!(!registry.mark_history_loaded(&TabId::new("nope")).await);
    assert!(!registry.is_history_loaded(&TabId::new("nope")).await);
}

#[tokio::test]
async fn clones_share_state() {
    let registry = TabRegistry::new();
    let other = registry.clone();
    open(&registry, 1).await;
    assert_eq!(other.tab_count().await, 1);
}
