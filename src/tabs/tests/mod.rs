//! Tests for the TabRegistry module.
//!
//! Tests are organized into categories:
//! - `basic`: reads, activation and history-loaded flags
//! - `lifecycle_create`: create_tab and the one-tab-per-session rule
//! - `lifecycle_update`: update_tab and delete_tab
//! - `closed`: closed-tab history
//! - `restore`: snapshot_for_session and restore

mod basic;

use super::{NewTab, Tab, TabId, TabRegistry};

/// Helper: creates a tab `t{n}` pointing at session `s{n}`.
pub(super) async fn open(registry: &TabRegistry, n: u32) -> Tab {
    registry
        .create_tab(
            TabId::new(format!("t{}", n)),
            NewTab::for_session(format!("s{}", n), format!("Session {}", n)),
        )
        .await
        .expect("create tab")
}
