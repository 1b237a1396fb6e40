pub mod clock;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod lrc;
pub mod panel;
pub mod playback;
pub mod provider;
pub mod session;
pub mod sync;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod time;

pub use clock::{
    ClockEvent, Listener, ListenerId, ListenerRegistry, ManualClock, ResizeSignal, ResizeSource,
    TimeSource,
};
pub use config::{Config, FetchConfig, SyncConfig};
pub use error::CoreError;
pub use fetcher::{LoadOutcome, LyricsFetcher};
pub use lrc::{LyricEntry, Lyrics};
pub use panel::{
    LineDescriptor, LineHandle, LyricPanel, PanelMessage, RenderTarget, ScrollBehavior,
};
pub use playback::{Scrubber, Transport, TransportDisplay, SEEK_RESOLUTION};
pub use provider::LyricsLoader;
pub use session::{LyricsSession, SessionManager, SessionState, SessionToken};
pub use sync::{ActiveChange, SyncEngine, SyncHandle};
pub use time::format_clock;
