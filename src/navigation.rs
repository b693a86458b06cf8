//! Navigation guard.
//!
//! Every user-initiated transition (tab switch, route change) goes through
//! [`NavigationGuard::guarded_navigate`]. The guard rejects duplicate and
//! too-rapid navigations, refuses to leave a live stream unless told to
//! abort it, and remembers which navigation is in flight.
//!
//! ```text
//! Idle ──accept──▶ Pending { target } ──grace delay──▶ Idle
//! ```

use crate::streaming::StreamingTracker;
use crate::transport::StreamControl;
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Default minimum spacing between accepted navigations.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

/// Default delay before a finished navigation stops counting as pending.
pub const DEFAULT_PENDING_GRACE: Duration = Duration::from_millis(100);

/// Guard timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationSettings {
    /// Minimum spacing between accepted navigations.
    pub debounce_window: Duration,
    /// How long a finished navigation stays pending.
    pub pending_grace: Duration,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            pending_grace: DEFAULT_PENDING_GRACE,
        }
    }
}

/// Per-call navigation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Abort live streams instead of refusing to navigate.
    pub force_abort: bool,
}

impl NavigateOptions {
    /// Options that abort live streams.
    pub fn forced() -> Self {
        Self { force_abort: true }
    }
}

/// Guard state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardState {
    /// No navigation in flight.
    Idle,
    /// A navigation to `target` was accepted and has not settled yet.
    Pending {
        /// Navigation target.
        target: String,
        /// When it was accepted.
        #[serde(skip)]
        started_at: Instant,
        /// Identifies this navigation among consecutive ones.
        ticket: u64,
    },
}

/// Why a navigation was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationRejection {
    /// A navigation to the same target is already pending.
    #[error("navigation to {0} is already pending")]
    DuplicateTarget(String),

    /// The previous navigation was too recent.
    #[error("navigation debounced, retry in {}ms", remaining.as_millis())]
    Debounced {
        /// Time left in the debounce window.
        remaining: Duration,
    },

    /// A stream is live and the caller did not ask to abort it.
    #[error("session {0} is streaming")]
    StreamActive(String),
}

#[derive(Debug)]
struct GuardInner {
    state: GuardState,
    last_navigation: Option<Instant>,
    next_ticket: u64,
}

/// Serializes navigation actions.
#[derive(Debug, Clone)]
pub struct NavigationGuard {
    inner: Arc<Mutex<GuardInner>>,
    streaming: StreamingTracker,
    streams: StreamControl,
    settings: NavigationSettings,
}

impl NavigationGuard {
    /// Creates an idle guard.
    pub fn new(
        streaming: StreamingTracker,
        streams: StreamControl,
        settings: NavigationSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(GuardInner {
                state: GuardState::Idle,
                last_navigation: None,
                next_ticket: 0,
            })),
            streaming,
            streams,
            settings,
        }
    }

    /// Returns the guard timing.
    pub fn settings(&self) -> NavigationSettings {
        self.settings
    }

    /// Returns the current state.
    pub fn state(&self) -> GuardState {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .state
            .clone()
    }

    /// When the last navigation was accepted.
    pub fn last_navigation(&self) -> Option<Instant> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last_navigation
    }

    /// `true` when no stream is live and the debounce window has passed.
    pub fn can_navigate(&self) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        !self.streaming.has_any_active() && self.debounce_remaining(&inner).is_none()
    }

    /// Evaluates the navigation rules for `target` without side effects.
    pub fn check(&self, target: &str, force_abort: bool) -> Result<(), NavigationRejection> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        self.evaluate(&inner, target, force_abort)
    }

    /// Runs `action` if the navigation to `target` is allowed.
    ///
    /// Returns `Ok(false)` when the navigation is refused (duplicate target,
    /// debounce window, live stream without `force_abort`), `Ok(true)` when
    /// the action ran and succeeded, and the action's error otherwise. With
    /// `force_abort`, every live stream is aborted before the action runs.
    /// The navigation stays pending until the grace delay after the action
    /// finishes, whether it succeeded, failed or was cancelled.
    pub async fn guarded_navigate<F, Fut, E>(
        &self,
        target: &str,
        action: F,
        options: NavigateOptions,
    ) -> Result<bool, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let ticket = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(rejection) = self.evaluate(&inner, target, options.force_abort) {
                tracing::info!(nav_target = target, %rejection, "navigation refused");
                return Ok(false);
            }

            if options.force_abort && self.streaming.has_any_active() {
                let aborted = self.streams.abort_all();
                tracing::info!(nav_target = target, ?aborted, "aborted streams for navigation");
            }

            let now = Instant::now();
            inner.next_ticket += 1;
            let ticket = inner.next_ticket;
            inner.last_navigation = Some(now);
            inner.state = GuardState::Pending {
                target: target.to_string(),
                started_at: now,
                ticket,
            };
            ticket
        };
        tracing::debug!(nav_target = target, ticket, "navigation accepted");

        let _settle = SettleOnDrop {
            inner: Arc::clone(&self.inner),
            grace: self.settings.pending_grace,
            ticket,
        };
        action().await.map(|()| true)
    }

    /// Clears every streaming flag, cancels every stream token and resets
    /// the guard to idle. Returns the sessions that were flagged.
    pub fn force_cleanup(&self) -> Vec<String> {
        let cleared = self.streams.force_cleanup();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.state = GuardState::Idle;
        cleared
    }

    fn evaluate(
        &self,
        inner: &GuardInner,
        target: &str,
        force_abort: bool,
    ) -> Result<(), NavigationRejection> {
        if let GuardState::Pending { target: pending, .. } = &inner.state {
            if pending == target {
                return Err(NavigationRejection::DuplicateTarget(target.to_string()));
            }
        }
        if let Some(remaining) = self.debounce_remaining(inner) {
            return Err(NavigationRejection::Debounced { remaining });
        }
        if !force_abort {
            if let Some(session_id) = self.streaming.active_session_id() {
                return Err(NavigationRejection::StreamActive(session_id));
            }
        }
        Ok(())
    }

    fn debounce_remaining(&self, inner: &GuardInner) -> Option<Duration> {
        let last = inner.last_navigation?;
        let elapsed = last.elapsed();
        (elapsed < self.settings.debounce_window).then(|| self.settings.debounce_window - elapsed)
    }

}

/// Returns the guard to idle after the grace delay once the navigation
/// future is done with, unless a newer navigation has taken over.
///
/// Runs on drop so a navigation that is cancelled or panics mid-action
/// still settles.
struct SettleOnDrop {
    inner: Arc<Mutex<GuardInner>>,
    grace: Duration,
    ticket: u64,
}

impl SettleOnDrop {
    fn settle(inner: &Mutex<GuardInner>, ticket: u64) {
        let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(inner.state, GuardState::Pending { ticket: t, .. } if t == ticket) {
            inner.state = GuardState::Idle;
        }
    }
}

impl Drop for SettleOnDrop {
    fn drop(&mut self) {
        let inner = Arc::clone(&self.inner);
        let grace = self.grace;
        let ticket = self.ticket;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(grace).await;
                    Self::settle(&inner, ticket);
                });
            }
            Err(_) => Self::settle(&inner, ticket),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageLog;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn guard() -> (NavigationGuard, StreamControl, StreamingTracker) {
        let tracker = StreamingTracker::new();
        let control = StreamControl::new(tracker.clone(), MessageLog::new(tracker.clone()));
        let guard = NavigationGuard::new(
            tracker.clone(),
            control.clone(),
            NavigationSettings::default(),
        );
        (guard, control, tracker)
    }

    async fn ok() -> Result<(), Infallible> {
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn first_navigation_runs_action() {
        let (guard, _, _) = guard();
        let ran = AtomicBool::new(false);

        let accepted = guard
            .guarded_navigate(
                "s1",
                || async {
                    ran.store(true, Ordering::SeqCst);
                    Ok::<(), Infallible>(())
                },
                NavigateOptions::default(),
            )
            .await;

        assert_eq!(accepted, Ok(true));
        assert!(ran.load(Ordering::SeqCst));
        assert!(guard.last_navigation().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_second_navigation_is_debounced() {
        let (guard, _, _) = guard();
        assert_eq!(guard.guarded_navigate("s1", ok, NavigateOptions::default()).await, Ok(true));
        assert_eq!(guard.guarded_navigate("s2", ok, NavigateOptions::default()).await, Ok(false));
        assert!(matches!(
            guard.check("s2", false),
            Err(NavigationRejection::Debounced { .. })
        ));
        assert!(!guard.can_navigate());

        tokio::time::sleep(DEFAULT_DEBOUNCE_WINDOW).await;
        assert!(guard.can_navigate());
        assert_eq!(guard.guarded_navigate("s2", ok, NavigateOptions::default()).await, Ok(true));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_target_is_rejected_while_pending() {
        let (guard, _, _) = guard();
        let slow = {
            let guard = guard.clone();
            tokio::spawn(async move {
                guard
                    .guarded_navigate(
                        "s1",
                        || async {
                            tokio::time::sleep(Duration::from_millis(500)).await;
                            Ok::<(), Infallible>(())
                        },
                        NavigateOptions::default(),
                    )
                    .await
            })
        };
        tokio::task::yield_now().await;

        assert!(matches!(guard.state(), GuardState::Pending { ref target, .. } if target == "s1"));
        assert_eq!(
            guard.check("s1", false),
            Err(NavigationRejection::DuplicateTarget("s1".into()))
        );
        assert_eq!(guard.guarded_navigate("s1", ok, NavigateOptions::default()).await, Ok(false));

        assert_eq!(slow.await.expect("join"), Ok(true));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_clears_after_grace_delay() {
        let (guard, _, _) = guard();
        guard
            .guarded_navigate("s1", ok, NavigateOptions::default())
            .await
            .expect("navigate");
        assert!(matches!(guard.state(), GuardState::Pending { .. }));

        tokio::time::sleep(DEFAULT_PENDING_GRACE + Duration::from_millis(1)).await;
        assert_eq!(guard.state(), GuardState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn live_stream_blocks_navigation() {
        let (guard, control, tracker) = guard();
        control.start("s1");
        let ran = AtomicBool::new(false);

        let accepted = guard
            .guarded_navigate(
                "s2",
                || async {
                    ran.store(true, Ordering::SeqCst);
                    Ok::<(), Infallible>(())
                },
                NavigateOptions::default(),
            )
            .await;

        assert_eq!(accepted, Ok(false));
        assert!(!ran.load(Ordering::SeqCst));
        assert!(tracker.is_active("s1"));
        assert_eq!(
            guard.check("s2", false),
            Err(NavigationRejection::StreamActive("s1".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn forced_navigation_aborts_before_action() {
        let (guard, control, tracker) = guard();
        let token = control.start("s1");
        let seen_active = AtomicBool::new(true);

        let accepted = guard
            .guarded_navigate(
                "s2",
                || async {
                    seen_active.store(tracker.has_any_active(), Ordering::SeqCst);
                    Ok::<(), Infallible>(())
                },
                NavigateOptions::forced(),
            )
            .await;

        assert_eq!(accepted, Ok(true));
        assert!(!seen_active.load(Ordering::SeqCst));
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn action_error_is_returned_and_guard_settles() {
        let (guard, _, _) = guard();
        let result = guard
            .guarded_navigate("s1", || async { Err("boom") }, NavigateOptions::default())
            .await;
        assert_eq!(result, Err("boom"));
        assert!(guard.last_navigation().is_some());

        tokio::time::sleep(DEFAULT_PENDING_GRACE * 2).await;
        assert_eq!(guard.state(), GuardState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_navigation_still_settles() {
        let (guard, _, _) = guard();
        let timed_out = tokio::time::timeout(
            Duration::from_millis(50),
            guard.guarded_navigate(
                "s1",
                || async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok::<(), Infallible>(())
                },
                NavigateOptions::default(),
            ),
        )
        .await;
        assert!(timed_out.is_err());
        assert!(matches!(guard.state(), GuardState::Pending { ref target, .. } if target == "s1"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(guard.state(), GuardState::Idle);
        assert_eq!(guard.guarded_navigate("s1", ok, NavigateOptions::default()).await, Ok(true));
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_navigation_task_still_settles() {
        let (guard, _, _) = guard();
        let task = {
            let guard = guard.clone();
            tokio::spawn(async move {
                guard
                    .guarded_navigate(
                        "s1",
                        std::future::pending::<Result<(), Infallible>>,
                        NavigateOptions::default(),
                    )
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(matches!(guard.state(), GuardState::Pending { .. }));

        task.abort();
        assert!(task.await.is_err());
        tokio::time::sleep(DEFAULT_DEBOUNCE_WINDOW + DEFAULT_PENDING_GRACE).await;
        assert_eq!(guard.state(), GuardState::Idle);
        assert!(guard.check("s1", false).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn force_cleanup_resets_everything() {
        let (guard, control, tracker) = guard();
        let token = control.start("s1");
        tracker.set_active("s2");
        guard
            .guarded_navigate("s3", ok, NavigateOptions::forced())
            .await
            .expect("navigate");
        tracker.set_active("s4");

        let cleared = guard.force_cleanup();
        assert_eq!(cleared, vec!["s4"]);
        assert!(token.is_cancelled());
        assert!(!tracker.has_any_active());
        assert_eq!(guard.state(), GuardState::Idle);
    }
}
