//! Sync sessions and the single-live-session manager.

use crate::clock::{ResizeSource, TimeSource};
use crate::config::SyncConfig;
use crate::lrc::Lyrics;
use crate::panel::{LyricPanel, RenderTarget};
use crate::sync::{SyncEngine, SyncHandle};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const LOG_TARGET: &str = "lyrisync::session";

/// Lifecycle of the session for the currently opened album
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing opened yet
    Idle,
    /// Lyrics are being fetched
    Loading,
    /// Lyrics rendered and synced to the clock
    Active,
    /// Lyrics loaded but contained no timed lines; nothing to sync
    NoLyrics,
    /// Fetch failed; an inline message is shown and no engine runs
    Error,
    /// Session stopped; a new one must be started for the next album
    TornDown,
}

/// A live binding between one set of lyrics, the playback clock and a panel.
///
/// Highlighting and centering follow the active line; a viewport resize
/// re-measures the layout and snaps the active line back to the center.
pub struct LyricsSession {
    panel: Rc<LyricPanel>,
    engine: SyncHandle,
}

impl LyricsSession {
    /// Render `lyrics` into `target` and start following `clock`
    pub fn start(
        lyrics: &Lyrics,
        clock: &Rc<dyn TimeSource>,
        viewport: &Rc<dyn ResizeSource>,
        target: &Rc<dyn RenderTarget>,
        config: &SyncConfig,
    ) -> Self {
        let panel = LyricPanel::mount(target, lyrics, config);

        let change_panel = Rc::clone(&panel);
        let resize_panel = Rc::clone(&panel);
        let engine = SyncEngine::start(
            lyrics.clone(),
            clock,
            viewport,
            move |change| {
                change_panel.activate(change.previous, change.current);
                if let Some(index) = change.current {
                    change_panel.center_on(index);
                }
            },
            move |active| {
                resize_panel.relayout();
                if let Some(index) = active {
                    resize_panel.snap_to(index);
                }
            },
        );

        Self { panel, engine }
    }

    #[must_use]
    pub fn panel(&self) -> &Rc<LyricPanel> {
        &self.panel
    }

    #[must_use]
    pub fn active_index(&self) -> Option<usize> {
        self.engine.active_index()
    }

    /// Unsubscribe from the clock, the viewport and the container. Idempotent.
    pub fn stop(&self) {
        self.engine.stop();
        self.panel.disconnect();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.engine.is_stopped()
    }
}

/// Identifies one `begin` call. Results carrying a token that is no longer
/// current must be discarded.
#[derive(Debug, Clone)]
pub struct SessionToken {
    generation: u64,
    cancel: CancellationToken,
}

impl SessionToken {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancelled as soon as the session is superseded or torn down
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Holds at most one live [`LyricsSession`].
///
/// Every `begin`, `replace` and `teardown` stops the previous session first
/// and invalidates outstanding tokens, so a slow fetch for an album that is
/// no longer open can never install its session.
pub struct SessionManager {
    generation: Cell<u64>,
    state: Cell<SessionState>,
    current: RefCell<Option<LyricsSession>>,
    cancel: RefCell<CancellationToken>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self {
            generation: Cell::new(0),
            state: Cell::new(SessionState::Idle),
            current: RefCell::new(None),
            cancel: RefCell::new(CancellationToken::new()),
        }
    }
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Active line of the live session, if any
    #[must_use]
    pub fn active_index(&self) -> Option<usize> {
        self.current
            .borrow()
            .as_ref()
            .and_then(LyricsSession::active_index)
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Tear down the current session and issue a token for a new one
    pub fn begin(&self) -> SessionToken {
        self.stop_current();

        let generation = self.generation.get().wrapping_add(1);
        self.generation.set(generation);
        let cancel = CancellationToken::new();
        *self.cancel.borrow_mut() = cancel.clone();
        self.state.set(SessionState::Loading);

        info!(target: LOG_TARGET, "Session {} loading", generation);
        SessionToken { generation, cancel }
    }

    #[must_use]
    pub fn is_current(&self, token: &SessionToken) -> bool {
        token.generation == self.generation.get() && !token.cancel.is_cancelled()
    }

    /// Install `session` if `token` is still current.
    ///
    /// A superseded session is stopped immediately and `false` is returned.
    pub fn install(&self, token: &SessionToken, session: LyricsSession) -> bool {
        if !self.is_current(token) {
            info!(
                target: LOG_TARGET,
                "Discarding session {} (current is {})",
                token.generation,
                self.generation.get()
            );
            session.stop();
            return false;
        }

        let previous = self.current.borrow_mut().replace(session);
        if let Some(previous) = previous {
            previous.stop();
        }
        self.state.set(SessionState::Active);
        info!(target: LOG_TARGET, "Session {} active", token.generation);
        true
    }

    /// Tear down the current session and install `session` in its place
    pub fn replace(&self, session: LyricsSession) -> SessionToken {
        let token = self.begin();
        self.install(&token, session);
        token
    }

    /// Record that loading failed for `token`. Ignored if superseded.
    pub fn mark_failed(&self, token: &SessionToken) {
        if self.is_current(token) {
            self.state.set(SessionState::Error);
        }
    }

    /// Record that `token` loaded no timed lines. Ignored if superseded.
    pub fn mark_empty(&self, token: &SessionToken) {
        if self.is_current(token) {
            self.state.set(SessionState::NoLyrics);
        }
    }

    /// Stop the current session and invalidate any in-flight load.
    ///
    /// Safe to call repeatedly and before anything was started.
    pub fn teardown(&self) {
        self.stop_current();
        if self.state.get() == SessionState::Idle {
            return;
        }
        self.generation.set(self.generation.get().wrapping_add(1));
        self.state.set(SessionState::TornDown);
        debug!(target: LOG_TARGET, "Sessions torn down");
    }

    fn stop_current(&self) {
        self.cancel.borrow().cancel();
        let previous = self.current.borrow_mut().take();
        if let Some(previous) = previous {
            previous.stop();
            info!(target: LOG_TARGET, "Session {} stopped", self.generation.get());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ClockEvent, ManualClock, ResizeSignal};
    use crate::panel::ScrollBehavior;
    use crate::testing::RecordingTarget;

    struct Env {
        clock: Rc<ManualClock>,
        viewport: Rc<ResizeSignal>,
        source: Rc<dyn TimeSource>,
        resize: Rc<dyn ResizeSource>,
    }

    impl Env {
        fn new() -> Self {
            let clock = ManualClock::new();
            let viewport = ResizeSignal::new();
            Self {
                source: clock.clone(),
                resize: viewport.clone(),
                clock,
                viewport,
            }
        }

        fn start(&self, target: &Rc<RecordingTarget>) -> LyricsSession {
            let target: Rc<dyn RenderTarget> = target.clone();
            LyricsSession::start(
                &lyrics(),
                &self.source,
                &self.resize,
                &target,
                &SyncConfig::default(),
            )
        }
    }

    fn lyrics() -> Lyrics {
        Lyrics::parse("[00:01]one\n[00:02]two\n[00:03]three\n[00:04]four\n[00:05]five")
    }

    #[test]
    fn test_session_highlights_and_centers() {
        let env = Env::new();
        let target = RecordingTarget::new(300.0, 30.0);
        let session = env.start(&target);
        assert!(target.active_lines().is_empty());

        env.clock.tick(4.2);
        assert_eq!(target.active_lines(), vec![3]);
        assert_eq!(session.active_index(), Some(3));
        // Line 3 top is 135 + 90 = 225, centered target is 225 - 135 = 90
        assert_eq!(target.last_scroll(), Some((90.0, ScrollBehavior::Smooth)));

        let scrolls = target.scroll_count();
        env.clock.tick(4.5);
        env.clock.tick(4.9);
        assert_eq!(target.scroll_count(), scrolls);
    }

    #[test]
    fn test_window_resize_relayouts_and_snaps() {
        let env = Env::new();
        let target = RecordingTarget::new(300.0, 30.0);
        let session = env.start(&target);
        env.clock.tick(5.0);
        assert_eq!(target.active_lines(), vec![4]);

        target.set_client_height(200.0);
        target.set_line_height(20.0);
        env.viewport.fire();

        assert_eq!(session.panel().line_height(), 20.0);
        assert_eq!(target.spacer_height(), 90.0);
        // Line 4 top is 90 + 80 = 170, centered target is 170 - 90 = 80
        assert_eq!(target.last_scroll(), Some((80.0, ScrollBehavior::Instant)));
        assert_eq!(session.active_index(), Some(4));
        assert_eq!(target.active_lines(), vec![4]);
    }

    #[test]
    fn test_session_stop_releases_all_listeners() {
        let env = Env::new();
        let target = RecordingTarget::new(300.0, 30.0);
        let session = env.start(&target);
        assert_eq!(env.clock.total_listeners(), 4);
        assert_eq!(env.viewport.listener_count(), 1);
        assert_eq!(target.resize_listener_count(), 1);

        session.stop();
        session.stop();
        assert!(session.is_stopped());
        assert_eq!(env.clock.total_listeners(), 0);
        assert_eq!(env.viewport.listener_count(), 0);
        assert_eq!(target.resize_listener_count(), 0);
    }

    #[test]
    fn test_replace_without_stop_leaves_one_session_listening() {
        let env = Env::new();
        let manager = SessionManager::new();
        let first = RecordingTarget::new(300.0, 30.0);
        let second = RecordingTarget::new(300.0, 30.0);

        manager.replace(env.start(&first));
        manager.replace(env.start(&second));

        for event in ClockEvent::ALL {
            assert_eq!(env.clock.listener_count(event), 1);
        }
        assert_eq!(env.viewport.listener_count(), 1);
        assert_eq!(first.resize_listener_count(), 0);

        env.clock.tick(2.0);
        assert!(first.active_lines().is_empty());
        assert_eq!(second.active_lines(), vec![1]);
        assert_eq!(manager.state(), SessionState::Active);
        assert_eq!(manager.active_index(), Some(1));
    }

    #[test]
    fn test_stale_token_cannot_install() {
        let env = Env::new();
        let manager = SessionManager::new();
        let target = RecordingTarget::new(300.0, 30.0);

        let stale = manager.begin();
        let current = manager.begin();
        assert!(stale.cancellation().is_cancelled());
        assert!(!manager.is_current(&stale));
        assert!(manager.is_current(&current));

        assert!(!manager.install(&stale, env.start(&target)));
        assert_eq!(env.clock.total_listeners(), 0);
        assert!(!manager.has_session());
        assert_eq!(manager.state(), SessionState::Loading);

        assert!(manager.install(&current, env.start(&target)));
        assert_eq!(env.clock.total_listeners(), 4);
        assert_eq!(manager.state(), SessionState::Active);
    }

    #[test]
    fn test_teardown_invalidates_in_flight_token() {
        let env = Env::new();
        let manager = SessionManager::new();
        let target = RecordingTarget::new(300.0, 30.0);

        let token = manager.begin();
        manager.teardown();
        assert_eq!(manager.state(), SessionState::TornDown);
        assert!(token.cancellation().is_cancelled());
        assert!(!manager.install(&token, env.start(&target)));
        assert_eq!(env.clock.total_listeners(), 0);
    }

    #[test]
    fn test_teardown_is_idempotent_and_safe_before_start() {
        let env = Env::new();
        let manager = SessionManager::new();
        manager.teardown();
        manager.teardown();
        assert_eq!(manager.state(), SessionState::Idle);

        let target = RecordingTarget::new(300.0, 30.0);
        manager.replace(env.start(&target));
        manager.teardown();
        manager.teardown();
        assert_eq!(manager.state(), SessionState::TornDown);
        assert_eq!(env.clock.total_listeners(), 0);
        assert!(!manager.has_session());
    }

    #[test]
    fn test_marks_ignore_superseded_tokens() {
        let manager = SessionManager::new();
        let stale = manager.begin();
        let current = manager.begin();

        manager.mark_failed(&stale);
        assert_eq!(manager.state(), SessionState::Loading);
        manager.mark_empty(&current);
        assert_eq!(manager.state(), SessionState::NoLyrics);
        manager.mark_failed(&current);
        assert_eq!(manager.state(), SessionState::Error);
        assert_eq!(current.generation(), stale.generation() + 1);
    }
}
