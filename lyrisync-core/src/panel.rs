//! Lyric panel layout: spacers, highlighting and keeping the active line centered.

use crate::clock::{ListenerId, ResizeSource, TimeSource};
use crate::config::SyncConfig;
use crate::lrc::{LyricEntry, Lyrics};
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;

const LOG_TARGET: &str = "lyrisync::panel";

/// Text rendered for an entry with no lyric text, so it keeps one line height
const BLANK_LINE_TEXT: &str = " ";

/// Opaque per-line handle issued by a [`RenderTarget`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineHandle(pub u64);

/// How a scroll position change is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    /// Animate to the target
    Smooth,
    /// Jump to the target immediately
    Instant,
}

/// Inline status shown in place of the lyric lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelMessage {
    Loading,
    NoLyrics,
    LoadFailed,
}

impl PanelMessage {
    #[must_use]
    pub const fn text(&self) -> &'static str {
        match self {
            Self::Loading => "Loading lyrics…",
            Self::NoLyrics => "(No lyrics found.)",
            Self::LoadFailed => "Couldn't load synced lyrics.",
        }
    }
}

impl std::fmt::Display for PanelMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// What a render target needs to draw one lyric line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineDescriptor<'a> {
    pub text: &'a str,
    /// Start time in seconds, e.g. for a `data-time` attribute
    pub time: f64,
}

impl<'a> LineDescriptor<'a> {
    #[must_use]
    pub fn from_entry(entry: &'a LyricEntry) -> Self {
        let text = if entry.text.is_empty() {
            BLANK_LINE_TEXT
        } else {
            entry.text.as_str()
        };
        Self {
            text,
            time: entry.time,
        }
    }
}

/// The scrollable lyrics container and its line elements.
///
/// As a [`ResizeSource`] it reports size changes of the container itself,
/// which can happen without the window resizing. All lengths are pixels.
pub trait RenderTarget: ResizeSource {
    /// Replace the container contents with a status message
    fn show_message(&self, message: PanelMessage);

    /// Replace the container contents with a leading spacer, one element per
    /// line, and a trailing spacer. Returns one handle per line, in order.
    fn render_lines(&self, lines: &[LineDescriptor<'_>]) -> Vec<LineHandle>;

    /// Set the height of both spacers
    fn set_spacer_height(&self, height: f64);

    /// Add or remove the active styling of a line
    fn set_active(&self, line: LineHandle, active: bool);

    /// Offset of a line's top edge from the top of the scrollable content
    fn line_offset(&self, line: LineHandle) -> f64;

    fn line_height(&self, line: LineHandle) -> f64;

    /// Visible height of the container
    fn client_height(&self) -> f64;

    /// Total height of the scrollable content
    fn scroll_height(&self) -> f64;

    fn scroll_top(&self) -> f64;

    fn scroll_to(&self, top: f64, behavior: ScrollBehavior);
}

/// Height of each spacer so the first and last lines can sit at the center
#[must_use]
pub fn spacer_height(client_height: f64, line_height: f64) -> f64 {
    let height = (client_height / 2.0 - line_height / 2.0).floor();
    if height.is_finite() {
        height.max(0.0)
    } else {
        0.0
    }
}

/// Scroll offset that vertically centers a line, clamped to the scrollable range
#[must_use]
pub fn center_offset(
    line_offset: f64,
    line_height: f64,
    client_height: f64,
    scroll_height: f64,
) -> f64 {
    let target = line_offset - (client_height - line_height) / 2.0;
    if target.is_nan() {
        return 0.0;
    }
    let max = (scroll_height - client_height).max(0.0);
    target.clamp(0.0, max)
}

/// Animate only long moves; short ones snap to avoid sub-pixel jitter
#[must_use]
pub fn scroll_behavior(current: f64, target: f64, threshold: f64) -> ScrollBehavior {
    if (current - target).abs() > threshold {
        ScrollBehavior::Smooth
    } else {
        ScrollBehavior::Instant
    }
}

/// Rendered lyric lines in a [`RenderTarget`], with spacer sizing kept in
/// step with the container size.
pub struct LyricPanel {
    target: Rc<dyn RenderTarget>,
    lyrics: Lyrics,
    lines: Vec<LineHandle>,
    line_height: Cell<f64>,
    smooth_scroll_threshold: f64,
    fallback_line_height: f64,
    resize_listener: Cell<Option<ListenerId>>,
}

impl LyricPanel {
    /// Render `lyrics` into `target`, size the spacers and start observing
    /// the container size.
    pub fn mount(target: &Rc<dyn RenderTarget>, lyrics: &Lyrics, config: &SyncConfig) -> Rc<Self> {
        let descriptors: Vec<_> = lyrics.iter().map(LineDescriptor::from_entry).collect();
        let lines = target.render_lines(&descriptors);
        if lines.len() != descriptors.len() {
            debug!(
                target: LOG_TARGET,
                "Render target returned {} handles for {} lines",
                lines.len(),
                descriptors.len()
            );
        }

        let panel = Rc::new(Self {
            target: Rc::clone(target),
            lyrics: lyrics.clone(),
            lines,
            line_height: Cell::new(config.fallback_line_height_px),
            smooth_scroll_threshold: config.smooth_scroll_threshold_px,
            fallback_line_height: config.fallback_line_height_px,
            resize_listener: Cell::new(None),
        });
        panel.relayout();

        let weak = Rc::downgrade(&panel);
        let id = target.subscribe_resize(Rc::new(move || {
            if let Some(panel) = weak.upgrade() {
                panel.relayout();
            }
        }));
        panel.resize_listener.set(Some(id));

        panel
    }

    /// Re-measure the line height and resize the spacers
    pub fn relayout(&self) {
        let line_height = self.measure_line_height();
        self.line_height.set(line_height);

        let height = spacer_height(self.target.client_height(), line_height);
        self.target.set_spacer_height(height);
        debug!(
            target: LOG_TARGET,
            "Spacers sized to {}px (line height {}px)", height, line_height
        );
    }

    fn measure_line_height(&self) -> f64 {
        self.lines
            .first()
            .map(|line| self.target.line_height(*line))
            .filter(|h| h.is_finite() && *h > 0.0)
            .unwrap_or(self.fallback_line_height)
    }

    /// Line height used for the current spacer sizing
    #[must_use]
    pub fn line_height(&self) -> f64 {
        self.line_height.get()
    }

    #[must_use]
    pub fn lines(&self) -> &[LineHandle] {
        &self.lines
    }

    #[must_use]
    pub fn index_of(&self, line: LineHandle) -> Option<usize> {
        self.lines.iter().position(|l| *l == line)
    }

    /// Move the active styling from `previous` to `current`
    pub fn activate(&self, previous: Option<usize>, current: Option<usize>) {
        if let Some(line) = previous.and_then(|i| self.lines.get(i)) {
            self.target.set_active(*line, false);
        }
        if let Some(line) = current.and_then(|i| self.lines.get(i)) {
            self.target.set_active(*line, true);
        }
    }

    /// Scroll line `index` to the vertical center, animating long moves
    pub fn center_on(&self, index: usize) {
        let Some(target) = self.center_target(index) else {
            return;
        };
        let behavior = scroll_behavior(
            self.target.scroll_top(),
            target,
            self.smooth_scroll_threshold,
        );
        self.target.scroll_to(target, behavior);
    }

    /// Scroll line `index` to the vertical center immediately
    pub fn snap_to(&self, index: usize) {
        if let Some(target) = self.center_target(index) {
            self.target.scroll_to(target, ScrollBehavior::Instant);
        }
    }

    fn center_target(&self, index: usize) -> Option<f64> {
        let line = *self.lines.get(index)?;
        Some(center_offset(
            self.target.line_offset(line),
            self.target.line_height(line),
            self.target.client_height(),
            self.target.scroll_height(),
        ))
    }

    /// Seek `clock` to the start of the selected line.
    ///
    /// Returns `false` if the handle is unknown to this panel.
    pub fn seek_to_line(&self, line: LineHandle, clock: &dyn TimeSource) -> bool {
        let Some(entry) = self.index_of(line).and_then(|i| self.lyrics.get(i)) else {
            return false;
        };
        if !entry.time.is_finite() {
            return false;
        }
        debug!(target: LOG_TARGET, "Seeking to line at {}s", entry.time);
        clock.seek(entry.time);
        true
    }

    /// Stop observing the container size. Idempotent.
    pub fn disconnect(&self) {
        if let Some(id) = self.resize_listener.take() {
            self.target.unsubscribe_resize(id);
        }
    }
}

impl Drop for LyricPanel {
    fn drop(&mut self) {
        self.disconnect();
    }
}
