use crate::clock::{ClockEvent, ListenerId, ResizeSource, TimeSource};
use crate::lrc::{LyricEntry, Lyrics};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, info};

const LOG_TARGET: &str = "lyrisync::sync";

/// Find the line active at `time`: the rightmost entry whose time is not
/// after `time`.
///
/// Returns `None` when `entries` is empty, when `time` precedes the first
/// entry, or when `time` is `NaN`. `entries` must be sorted by time.
#[must_use]
pub fn active_index(entries: &[LyricEntry], time: f64) -> Option<usize> {
    entries
        .partition_point(|entry| entry.time <= time)
        .checked_sub(1)
}

/// A change of the active line, delivered to the engine's change callback
#[derive(Debug, Clone, Copy)]
pub struct ActiveChange<'a> {
    /// Previously active line, to be deactivated
    pub previous: Option<usize>,
    /// Newly active line, to be activated and centered
    pub current: Option<usize>,
    /// Entry for `current`
    pub entry: Option<&'a LyricEntry>,
}

type ChangeCallback = Box<dyn FnMut(ActiveChange<'_>)>;
type ResizeCallback = Box<dyn FnMut(Option<usize>)>;

/// Engine state shared between the registered listeners and the handle
struct EngineState {
    lyrics: Lyrics,
    clock: Weak<dyn TimeSource>,
    last_active: Cell<Option<usize>>,
    /// Set when a clock event arrived while the change callback was running
    pending: Cell<bool>,
    stopped: Cell<bool>,
    on_active_change: RefCell<ChangeCallback>,
    on_resize: RefCell<ResizeCallback>,
}

impl EngineState {
    /// Recompute the active line from the clock
    fn refresh(&self) {
        if self.stopped.get() {
            return;
        }
        let Some(clock) = self.clock.upgrade() else {
            return;
        };
        let index = self.lyrics.active_index(clock.current_time());
        self.apply(index);
    }

    fn apply(&self, index: Option<usize>) {
        if index == self.last_active.get() {
            return;
        }

        // A callback that seeks the clock re-enters here synchronously. The
        // outer call picks the new position up once the callback returns.
        let Ok(mut on_active_change) = self.on_active_change.try_borrow_mut() else {
            debug!(target: LOG_TARGET, "Deferring nested active line update to {:?}", index);
            self.pending.set(true);
            return;
        };

        let mut next = index;
        loop {
            let previous = self.last_active.get();
            if next != previous {
                self.last_active.set(next);
                debug!(target: LOG_TARGET, "Active line {:?} -> {:?}", previous, next);
                (&mut **on_active_change)(ActiveChange {
                    previous,
                    current: next,
                    entry: next.and_then(|i| self.lyrics.get(i)),
                });
            }

            if !self.pending.replace(false) || self.stopped.get() {
                break;
            }
            let Some(clock) = self.clock.upgrade() else {
                break;
            };
            next = self.lyrics.active_index(clock.current_time());
        }
    }

    fn resized(&self) {
        if self.stopped.get() {
            return;
        }
        if let Ok(mut on_resize) = self.on_resize.try_borrow_mut() {
            (&mut **on_resize)(self.last_active.get());
        }
    }
}

/// Keeps track of which lyric line is active as a playback clock advances.
///
/// The engine listens to every [`ClockEvent`] and to a viewport resize
/// signal. The change callback fires only when the active line actually
/// changes, never once per tick; the resize callback fires on every resize
/// with the current active line and leaves it untouched.
pub struct SyncEngine;

impl SyncEngine {
    /// Subscribe to `clock` and `viewport` and start tracking the active line.
    ///
    /// The active line is computed once immediately, so a session started
    /// mid-track highlights the right line without waiting for a tick.
    pub fn start<F, G>(
        lyrics: Lyrics,
        clock: &Rc<dyn TimeSource>,
        viewport: &Rc<dyn ResizeSource>,
        on_active_change: F,
        on_resize: G,
    ) -> SyncHandle
    where
        F: FnMut(ActiveChange<'_>) + 'static,
        G: FnMut(Option<usize>) + 'static,
    {
        let line_count = lyrics.len();
        let state = Rc::new(EngineState {
            lyrics,
            clock: Rc::downgrade(clock),
            last_active: Cell::new(None),
            pending: Cell::new(false),
            stopped: Cell::new(false),
            on_active_change: RefCell::new(Box::new(on_active_change)),
            on_resize: RefCell::new(Box::new(on_resize)),
        });

        let clock_listeners = ClockEvent::ALL
            .iter()
            .map(|event| {
                let state = Rc::clone(&state);
                clock.subscribe(*event, Rc::new(move || state.refresh()))
            })
            .collect();

        let resize_listener = {
            let state = Rc::clone(&state);
            viewport.subscribe_resize(Rc::new(move || state.resized()))
        };

        info!(
            target: LOG_TARGET,
            "Sync engine started for {} lines ({} clock listeners)",
            line_count,
            ClockEvent::ALL.len()
        );

        state.refresh();

        SyncHandle {
            registration: Some(Registration {
                state,
                clock: Rc::downgrade(clock),
                viewport: Rc::downgrade(viewport),
                clock_listeners,
                resize_listener,
            }),
            disposed: Cell::new(false),
        }
    }
}

struct Registration {
    state: Rc<EngineState>,
    clock: Weak<dyn TimeSource>,
    viewport: Weak<dyn ResizeSource>,
    clock_listeners: Vec<ListenerId>,
    resize_listener: ListenerId,
}

/// Teardown handle for a running [`SyncEngine`].
///
/// [`stop`](Self::stop) is idempotent, and dropping the handle stops the
/// engine. The default handle was never started; stopping it does nothing.
pub struct SyncHandle {
    registration: Option<Registration>,
    disposed: Cell<bool>,
}

impl Default for SyncHandle {
    fn default() -> Self {
        Self {
            registration: None,
            disposed: Cell::new(true),
        }
    }
}

impl SyncHandle {
    /// Unsubscribe every listener the engine registered
    pub fn stop(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let Some(registration) = &self.registration else {
            return;
        };

        registration.state.stopped.set(true);

        if let Some(clock) = registration.clock.upgrade() {
            for id in &registration.clock_listeners {
                clock.unsubscribe(*id);
            }
        }
        if let Some(viewport) = registration.viewport.upgrade() {
            viewport.unsubscribe_resize(registration.resize_listener);
        }

        info!(target: LOG_TARGET, "Sync engine stopped");
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.disposed.get()
    }

    /// Currently active line, as last reported to the change callback
    #[must_use]
    pub fn active_index(&self) -> Option<usize> {
        self.registration
            .as_ref()
            .and_then(|r| r.state.last_active.get())
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
