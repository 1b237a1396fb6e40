//! Load lyrics for an opened album and start syncing them.

use std::rc::Rc;
use tracing::{info, warn};

use crate::clock::{ResizeSource, TimeSource};
use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::lrc::Lyrics;
use crate::panel::{PanelMessage, RenderTarget};
use crate::provider::LyricsLoader;
use crate::session::{LyricsSession, SessionManager};

const LOG_TARGET: &str = "lyrisync::fetcher";

/// How an [`LyricsFetcher::open`] call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Lyrics rendered and a session is following the clock
    Synced { lines: usize },
    /// The resource parsed to no timed lines
    NoLyrics,
    /// Another album was opened, or the panel closed, before loading finished
    Superseded,
}

/// Fetches lyrics with a [`LyricsLoader`] and installs a sync session for
/// them, one album at a time.
pub struct LyricsFetcher<L> {
    loader: L,
    sessions: Rc<SessionManager>,
    clock: Rc<dyn TimeSource>,
    viewport: Rc<dyn ResizeSource>,
    config: SyncConfig,
}

impl<L: LyricsLoader> LyricsFetcher<L> {
    /// Create a new lyrics fetcher
    ///
    /// # Arguments
    /// * `loader` - Loader used to fetch LRC text
    /// * `clock` - The process-wide playback clock
    /// * `viewport` - Window resize signal
    /// * `config` - Centering and layout settings
    pub fn new(
        loader: L,
        clock: Rc<dyn TimeSource>,
        viewport: Rc<dyn ResizeSource>,
        config: SyncConfig,
    ) -> Self {
        Self {
            loader,
            sessions: SessionManager::new(),
            clock,
            viewport,
            config,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &Rc<SessionManager> {
        &self.sessions
    }

    /// Tear down the current session, load the lyrics at `location` into
    /// `target` and start syncing them.
    ///
    /// A load that is overtaken by another `open` or by [`close`](Self::close)
    /// resolves to [`LoadOutcome::Superseded`] without touching `target`.
    ///
    /// # Errors
    ///
    /// Returns the loader's error after showing [`PanelMessage::LoadFailed`]
    /// in `target`. No session is started in that case.
    pub async fn open(
        &self,
        location: &str,
        target: &Rc<dyn RenderTarget>,
    ) -> Result<LoadOutcome, CoreError> {
        let token = self.sessions.begin();
        target.show_message(PanelMessage::Loading);
        info!(
            target: LOG_TARGET,
            "Loading lyrics from {} via {}",
            location,
            self.loader.name()
        );

        let loaded = tokio::select! {
            () = token.cancellation().cancelled() => None,
            result = self.loader.load(location) => Some(result),
        };

        let Some(result) = loaded.filter(|_| self.sessions.is_current(&token)) else {
            info!(target: LOG_TARGET, "Discarding superseded lyrics load for {}", location);
            return Ok(LoadOutcome::Superseded);
        };

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to load lyrics from {}: {}", location, e);
                target.show_message(PanelMessage::LoadFailed);
                self.sessions.mark_failed(&token);
                return Err(e);
            }
        };

        let lyrics = Lyrics::parse(&text);
        if lyrics.is_empty() {
            info!(target: LOG_TARGET, "No timed lines in {}", location);
            target.show_message(PanelMessage::NoLyrics);
            self.sessions.mark_empty(&token);
            return Ok(LoadOutcome::NoLyrics);
        }

        let lines = lyrics.len();
        let session = LyricsSession::start(
            &lyrics,
            &self.clock,
            &self.viewport,
            target,
            &self.config,
        );
        if !self.sessions.install(&token, session) {
            info!(target: LOG_TARGET, "Lyrics for {} superseded while mounting", location);
            return Ok(LoadOutcome::Superseded);
        }
        info!(target: LOG_TARGET, "Synced {} lyric lines from {}", lines, location);

        Ok(LoadOutcome::Synced { lines })
    }

    /// Stop the current session and discard any in-flight load
    pub fn close(&self) {
        self.sessions.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Listener, ListenerId, ManualClock, ResizeSignal};
    use crate::panel::{LineDescriptor, LineHandle, ScrollBehavior};
    use crate::session::SessionState;
    use crate::testing::RecordingTarget;
    use async_trait::async_trait;
    use std::pin::pin;

    /// Serves fixed responses; "slow" never resolves
    struct ScriptedLoader;

    #[async_trait(?Send)]
    impl LyricsLoader for ScriptedLoader {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn load(&self, location: &str) -> Result<String, CoreError> {
            match location {
                "lyrics/hello.lrc" => Ok("[00:01.00]Hello\n[00:02.50]World".to_string()),
                "lyrics/plain.txt" => Ok("[ti:Plain]\nno timestamps here".to_string()),
                "slow" => std::future::pending().await,
                other => Err(CoreError::LyricsHttpStatus {
                    url: other.to_string(),
                    status: 404,
                }),
            }
        }
    }

    struct Env {
        clock: Rc<ManualClock>,
        fetcher: LyricsFetcher<ScriptedLoader>,
    }

    fn env() -> Env {
        let clock = ManualClock::new();
        let viewport: Rc<dyn ResizeSource> = ResizeSignal::new();
        let fetcher = LyricsFetcher::new(
            ScriptedLoader,
            clock.clone(),
            viewport,
            SyncConfig::default(),
        );
        Env { clock, fetcher }
    }

    fn target() -> (Rc<RecordingTarget>, Rc<dyn RenderTarget>) {
        let target = RecordingTarget::new(300.0, 30.0);
        let dyn_target: Rc<dyn RenderTarget> = target.clone();
        (target, dyn_target)
    }

    #[tokio::test]
    async fn test_open_renders_and_syncs() {
        let env = env();
        let (target, dyn_target) = target();

        let outcome = env.fetcher.open("lyrics/hello.lrc", &dyn_target).await.unwrap();

        assert_eq!(outcome, LoadOutcome::Synced { lines: 2 });
        assert_eq!(target.messages(), vec![PanelMessage::Loading]);
        assert_eq!(target.rendered_texts(), vec!["Hello", "World"]);
        assert_eq!(env.fetcher.sessions().state(), SessionState::Active);

        env.clock.tick(1.5);
        assert_eq!(target.active_lines(), vec![0]);
        assert_eq!(env.fetcher.sessions().active_index(), Some(0));
    }

    #[tokio::test]
    async fn test_fetch_failure_shows_message_and_starts_nothing() {
        let env = env();
        let (target, dyn_target) = target();

        let err = env.fetcher.open("lyrics/missing.lrc", &dyn_target).await.unwrap_err();

        assert!(matches!(err, CoreError::LyricsHttpStatus { status: 404, .. }));
        assert_eq!(
            target.messages(),
            vec![PanelMessage::Loading, PanelMessage::LoadFailed]
        );
        assert_eq!(env.fetcher.sessions().state(), SessionState::Error);
        assert_eq!(env.clock.total_listeners(), 0);

        env.fetcher.close();
        assert_eq!(env.clock.total_listeners(), 0);
    }

    #[tokio::test]
    async fn test_untimed_resource_shows_no_lyrics() {
        let env = env();
        let (target, dyn_target) = target();

        let outcome = env.fetcher.open("lyrics/plain.txt", &dyn_target).await.unwrap();

        assert_eq!(outcome, LoadOutcome::NoLyrics);
        assert_eq!(target.messages(), vec![PanelMessage::Loading, PanelMessage::NoLyrics]);
        assert_eq!(env.fetcher.sessions().state(), SessionState::NoLyrics);
        assert_eq!(env.clock.total_listeners(), 0);
    }

    #[tokio::test]
    async fn test_slow_load_superseded_by_next_album() {
        let env = env();
        let (slow_target, slow_dyn) = target();
        let (fast_target, fast_dyn) = target();

        let mut slow = pin!(env.fetcher.open("slow", &slow_dyn));
        assert!(futures::poll!(slow.as_mut()).is_pending());

        let fast = env.fetcher.open("lyrics/hello.lrc", &fast_dyn).await.unwrap();
        assert_eq!(fast, LoadOutcome::Synced { lines: 2 });

        let slow = slow.await.unwrap();
        assert_eq!(slow, LoadOutcome::Superseded);

        assert!(slow_target.rendered_texts().is_empty());
        assert_eq!(slow_target.messages(), vec![PanelMessage::Loading]);
        assert_eq!(fast_target.rendered_texts(), vec!["Hello", "World"]);
        assert_eq!(env.clock.total_listeners(), 4);
        assert_eq!(env.fetcher.sessions().state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_close_during_load_discards_result() {
        let env = env();
        let (target, dyn_target) = target();

        let mut slow = pin!(env.fetcher.open("slow", &dyn_target));
        assert!(futures::poll!(slow.as_mut()).is_pending());

        env.fetcher.close();
        assert_eq!(slow.await.unwrap(), LoadOutcome::Superseded);
        assert_eq!(env.fetcher.sessions().state(), SessionState::TornDown);
        assert_eq!(env.clock.total_listeners(), 0);
        assert!(target.rendered_texts().is_empty());
    }

    #[tokio::test]
    async fn test_reopen_tears_down_previous_session() {
        let env = env();
        let (first, first_dyn) = target();
        let (second, second_dyn) = target();

        env.fetcher.open("lyrics/hello.lrc", &first_dyn).await.unwrap();
        env.clock.tick(1.0);
        env.fetcher.open("lyrics/hello.lrc", &second_dyn).await.unwrap();

        assert_eq!(env.clock.total_listeners(), 4);
        assert_eq!(first.resize_listener_count(), 0);

        env.clock.tick(3.0);
        assert_eq!(first.active_lines(), vec![0]);
        assert_eq!(second.active_lines(), vec![1]);

        env.fetcher.close();
        assert_eq!(env.clock.total_listeners(), 0);
        assert_eq!(second.resize_listener_count(), 0);
    }

    /// Tears the sessions down the first time lines are rendered
    struct ClosingTarget {
        inner: Rc<RecordingTarget>,
        sessions: Rc<SessionManager>,
    }

    impl ResizeSource for ClosingTarget {
        fn subscribe_resize(&self, listener: Listener) -> ListenerId {
            self.inner.subscribe_resize(listener)
        }

        fn unsubscribe_resize(&self, id: ListenerId) -> bool {
            self.inner.unsubscribe_resize(id)
        }
    }

    impl RenderTarget for ClosingTarget {
        fn show_message(&self, message: PanelMessage) {
            self.inner.show_message(message);
        }

        fn render_lines(&self, lines: &[LineDescriptor<'_>]) -> Vec<LineHandle> {
            self.sessions.teardown();
            self.inner.render_lines(lines)
        }

        fn set_spacer_height(&self, height: f64) {
            self.inner.set_spacer_height(height);
        }

        fn set_active(&self, line: LineHandle, active: bool) {
            self.inner.set_active(line, active);
        }

        fn line_offset(&self, line: LineHandle) -> f64 {
            self.inner.line_offset(line)
        }

        fn line_height(&self, line: LineHandle) -> f64 {
            self.inner.line_height(line)
        }

        fn client_height(&self) -> f64 {
            self.inner.client_height()
        }

        fn scroll_height(&self) -> f64 {
            self.inner.scroll_height()
        }

        fn scroll_top(&self) -> f64 {
            self.inner.scroll_top()
        }

        fn scroll_to(&self, top: f64, behavior: ScrollBehavior) {
            self.inner.scroll_to(top, behavior);
        }
    }

    #[tokio::test]
    async fn test_close_while_mounting_reports_superseded() {
        let env = env();
        let inner = RecordingTarget::new(300.0, 30.0);
        let target: Rc<dyn RenderTarget> = Rc::new(ClosingTarget {
            inner: Rc::clone(&inner),
            sessions: Rc::clone(env.fetcher.sessions()),
        });

        let outcome = env.fetcher.open("lyrics/hello.lrc", &target).await.unwrap();

        assert_eq!(outcome, LoadOutcome::Superseded);
        assert_eq!(env.fetcher.sessions().state(), SessionState::TornDown);
        assert!(!env.fetcher.sessions().has_session());
        assert_eq!(env.clock.total_listeners(), 0);
        assert_eq!(inner.resize_listener_count(), 0);
    }
}
