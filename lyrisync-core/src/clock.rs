//! Playback time source abstraction and listener plumbing.
//!
//! Everything here is single-threaded: listeners are `Rc` closures invoked
//! synchronously on the thread that emits the event, the way a browser media
//! element dispatches its events.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A registered event callback
pub type Listener = Rc<dyn Fn()>;

/// Identifies a registered listener so it can be removed later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Event classes emitted by a playback time source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockEvent {
    /// Periodic position advance, many times per second while playing
    TimeUpdate,
    /// A seek request finished
    Seeked,
    /// Duration and initial position became known
    LoadedMetadata,
    /// Playback started or resumed
    Play,
}

impl ClockEvent {
    /// Every event class a sync engine listens to
    pub const ALL: [Self; 4] = [
        Self::TimeUpdate,
        Self::Seeked,
        Self::LoadedMetadata,
        Self::Play,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TimeUpdate => "timeupdate",
            Self::Seeked => "seeked",
            Self::LoadedMetadata => "loadedmetadata",
            Self::Play => "play",
        }
    }
}

impl std::fmt::Display for ClockEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The playback clock owned by the audio subsystem.
///
/// The sync core only reads the position and subscribes to events. `seek`
/// is the single mutation it may request.
pub trait TimeSource {
    /// Current playback position in seconds
    fn current_time(&self) -> f64;

    /// Track duration in seconds, `NaN` until metadata has loaded
    fn duration(&self) -> f64;

    /// Request a seek to `time` seconds
    fn seek(&self, time: f64);

    fn subscribe(&self, event: ClockEvent, listener: Listener) -> ListenerId;

    /// Remove a listener. Returns `false` if it was not registered.
    fn unsubscribe(&self, id: ListenerId) -> bool;
}

/// Anything that signals a size change: the window/viewport, or a lyrics
/// container observed with a resize observer.
pub trait ResizeSource {
    fn subscribe_resize(&self, listener: Listener) -> ListenerId;

    /// Remove a listener. Returns `false` if it was not registered.
    fn unsubscribe_resize(&self, id: ListenerId) -> bool;
}

/// Keyed listener registry backing the in-process time and resize sources
pub struct ListenerRegistry<K> {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(ListenerId, K, Listener)>>,
}

impl<K> Default for ListenerRegistry<K> {
    fn default() -> Self {
        Self {
            next_id: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
        }
    }
}

impl<K: Copy + PartialEq> ListenerRegistry<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, key: K, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.listeners.borrow_mut().push((id, key, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _, _)| *existing != id);
        listeners.len() != before
    }

    /// Invoke every listener registered for `key`.
    ///
    /// Listeners are collected before any is called, so a listener may add
    /// or remove registrations while the event is being dispatched.
    pub fn emit(&self, key: K) {
        let matching: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == key)
            .map(|(_, _, listener)| Rc::clone(listener))
            .collect();

        for listener in matching {
            listener();
        }
    }

    #[must_use]
    pub fn count(&self, key: K) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == key)
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A time source driven by hand.
///
/// Useful for native hosts that poll an audio backend, and for deterministic
/// tests. Every mutator emits the event a media element would emit for it.
pub struct ManualClock {
    time: Cell<f64>,
    duration: Cell<f64>,
    listeners: ListenerRegistry<ClockEvent>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            time: Cell::new(0.0),
            duration: Cell::new(f64::NAN),
            listeners: ListenerRegistry::new(),
        }
    }
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Advance playback to `time` and emit [`ClockEvent::TimeUpdate`]
    pub fn tick(&self, time: f64) {
        self.time.set(time);
        self.listeners.emit(ClockEvent::TimeUpdate);
    }

    /// Advance playback by `delta` seconds and emit [`ClockEvent::TimeUpdate`]
    pub fn advance(&self, delta: f64) {
        self.tick(self.time.get() + delta);
    }

    /// Set the duration and emit [`ClockEvent::LoadedMetadata`]
    pub fn load_metadata(&self, duration: f64) {
        self.duration.set(duration);
        self.listeners.emit(ClockEvent::LoadedMetadata);
    }

    /// Emit [`ClockEvent::Play`]
    pub fn play(&self) {
        self.listeners.emit(ClockEvent::Play);
    }

    /// Move the position without emitting anything
    pub fn set_time(&self, time: f64) {
        self.time.set(time);
    }

    /// Number of listeners currently registered for `event`
    #[must_use]
    pub fn listener_count(&self, event: ClockEvent) -> usize {
        self.listeners.count(event)
    }

    /// Number of listeners currently registered across all events
    #[must_use]
    pub fn total_listeners(&self) -> usize {
        self.listeners.len()
    }
}

impl TimeSource for ManualClock {
    fn current_time(&self) -> f64 {
        self.time.get()
    }

    fn duration(&self) -> f64 {
        self.duration.get()
    }

    fn seek(&self, time: f64) {
        self.time.set(time);
        self.listeners.emit(ClockEvent::Seeked);
    }

    fn subscribe(&self, event: ClockEvent, listener: Listener) -> ListenerId {
        self.listeners.add(event, listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

/// A resize signal fired by hand, e.g. from a host's window event loop
#[derive(Default)]
pub struct ResizeSignal {
    listeners: ListenerRegistry<()>,
}

impl ResizeSignal {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Notify every subscriber that the size changed
    pub fn fire(&self) {
        self.listeners.emit(());
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl ResizeSource for ResizeSignal {
    fn subscribe_resize(&self, listener: Listener) -> ListenerId {
        self.listeners.add((), listener)
    }

    fn unsubscribe_resize(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}
