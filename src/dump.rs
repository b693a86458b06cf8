//! Point-in-time view of the whole engine.

use crate::directory::EntryInfo;
use crate::navigation::GuardState;
use crate::streaming::StreamActivity;
use crate::tabs::{ClosedTab, Tab, TabId};
use crate::{Message, Scope};
use serde::Serialize;
use std::collections::BTreeMap;

/// Serializable snapshot of every store, as printed by `sessync replay`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineDump {
    /// Currently selected scope.
    pub scope: Option<Scope>,
    /// Open tabs in open order.
    pub tabs: Vec<Tab>,
    /// The active tab.
    pub active_tab: Option<TabId>,
    /// Closed-tab history, most recent first.
    pub closed_tabs: Vec<ClosedTab>,
    /// Message logs by session id.
    pub messages: BTreeMap<String, Vec<Message>>,
    /// Live streams by session id.
    pub streaming: BTreeMap<String, StreamActivity>,
    /// Directory cache entries.
    pub directory: Vec<EntryInfo>,
    /// Navigation guard state.
    pub navigation: GuardState,
}
