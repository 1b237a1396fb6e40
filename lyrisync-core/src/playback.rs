//! Seek bar and position readout for the player transport.

use crate::clock::{ClockEvent, ListenerId, TimeSource};
use crate::time::format_clock;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::debug;

const LOG_TARGET: &str = "lyrisync::playback";

/// Number of discrete steps on the seek slider
pub const SEEK_RESOLUTION: u32 = 1000;

/// Maps playback position to seek slider values and back.
///
/// While the user drags the slider, position updates must not move it.
#[derive(Debug, Default)]
pub struct Scrubber {
    scrubbing: Cell<bool>,
}

impl Scrubber {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_scrubbing(&self) -> bool {
        self.scrubbing.get()
    }

    /// The user started dragging the slider
    pub fn begin_scrub(&self) {
        self.scrubbing.set(true);
    }

    /// Slider value for `current` seconds into a track of `duration`.
    ///
    /// Returns `None` while scrubbing. An unknown or zero duration divides
    /// by one, as a media element's position is then already a ratio.
    #[must_use]
    pub fn slider_value(&self, current: f64, duration: f64) -> Option<u32> {
        if self.scrubbing.get() {
            return None;
        }
        if !current.is_finite() {
            return Some(0);
        }
        let ratio = current / known_duration(duration).unwrap_or(1.0);
        let value = (ratio * f64::from(SEEK_RESOLUTION))
            .round()
            .clamp(0.0, f64::from(SEEK_RESOLUTION));
        // Clamped into 0..=SEEK_RESOLUTION above
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(value as u32)
    }

    /// Seek `clock` to the position of slider `value` and end the scrub.
    ///
    /// Seeks to zero while the duration is unknown. Returns the target time.
    pub fn commit(&self, clock: &dyn TimeSource, value: u32) -> f64 {
        let ratio = f64::from(value.min(SEEK_RESOLUTION)) / f64::from(SEEK_RESOLUTION);
        let target = ratio * known_duration(clock.duration()).unwrap_or(0.0);
        clock.seek(target);
        self.scrubbing.set(false);
        target
    }
}

fn known_duration(duration: f64) -> Option<f64> {
    (duration.is_finite() && duration > 0.0).then_some(duration)
}

/// Host widgets showing the transport state
pub trait TransportDisplay {
    fn set_seek_value(&self, value: u32);
    fn set_position_label(&self, label: &str);
    fn set_duration_label(&self, label: &str);
}

/// Keeps a [`TransportDisplay`] in step with a clock
pub struct Transport {
    clock: Weak<dyn TimeSource>,
    scrubber: Rc<Scrubber>,
    subscriptions: RefCell<Vec<ListenerId>>,
}

impl Transport {
    pub fn bind(clock: &Rc<dyn TimeSource>, display: &Rc<dyn TransportDisplay>) -> Self {
        let scrubber = Rc::new(Scrubber::new());
        let weak_clock = Rc::downgrade(clock);

        let on_time = {
            let clock = weak_clock.clone();
            let display = Rc::clone(display);
            let scrubber = Rc::clone(&scrubber);
            move || {
                let Some(clock) = clock.upgrade() else {
                    return;
                };
                let current = clock.current_time();
                if let Some(value) = scrubber.slider_value(current, clock.duration()) {
                    display.set_seek_value(value);
                }
                display.set_position_label(&format_clock(current));
            }
        };

        let on_metadata = {
            let clock = weak_clock.clone();
            let display = Rc::clone(display);
            move || {
                if let Some(clock) = clock.upgrade() {
                    display.set_duration_label(&format_clock(clock.duration()));
                }
            }
        };

        let subscriptions = vec![
            clock.subscribe(ClockEvent::TimeUpdate, Rc::new(on_time)),
            clock.subscribe(ClockEvent::LoadedMetadata, Rc::new(on_metadata)),
        ];
        debug!(target: LOG_TARGET, "Transport bound");

        Self {
            clock: weak_clock,
            scrubber,
            subscriptions: RefCell::new(subscriptions),
        }
    }

    #[must_use]
    pub fn scrubber(&self) -> &Scrubber {
        &self.scrubber
    }

    /// The slider is being dragged
    pub fn begin_scrub(&self) {
        self.scrubber.begin_scrub();
    }

    /// The slider was released at `value`. Returns the seek target, or
    /// `None` if the clock is gone.
    pub fn commit(&self, value: u32) -> Option<f64> {
        let clock = self.clock.upgrade()?;
        Some(self.scrubber.commit(clock.as_ref(), value))
    }

    /// Stop following the clock. Idempotent.
    pub fn unbind(&self) {
        let ids = std::mem::take(&mut *self.subscriptions.borrow_mut());
        if ids.is_empty() {
            return;
        }
        if let Some(clock) = self.clock.upgrade() {
            for id in ids {
                clock.unsubscribe(id);
            }
        }
        debug!(target: LOG_TARGET, "Transport unbound");
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.unbind();
    }
}
