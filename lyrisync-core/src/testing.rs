//! In-memory render target for tests.

use crate::clock::{Listener, ListenerId, ListenerRegistry, ResizeSource};
use crate::panel::{LineDescriptor, LineHandle, PanelMessage, RenderTarget, ScrollBehavior};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

/// A render target with a fixed-height line layout that records every call.
///
/// Lines are laid out back to back between the two spacers, so line `i`
/// starts at `spacer + i * line_height`. Scrolls apply immediately.
pub struct RecordingTarget {
    client_height: Cell<f64>,
    line_height: Cell<f64>,
    spacer_height: Cell<f64>,
    scroll_top: Cell<f64>,
    texts: RefCell<Vec<String>>,
    active: RefCell<BTreeSet<usize>>,
    messages: RefCell<Vec<PanelMessage>>,
    scrolls: RefCell<Vec<(f64, ScrollBehavior)>>,
    resize: ListenerRegistry<()>,
}

impl RecordingTarget {
    #[must_use]
    pub fn new(client_height: f64, line_height: f64) -> Rc<Self> {
        Rc::new(Self {
            client_height: Cell::new(client_height),
            line_height: Cell::new(line_height),
            spacer_height: Cell::new(0.0),
            scroll_top: Cell::new(0.0),
            texts: RefCell::new(Vec::new()),
            active: RefCell::new(BTreeSet::new()),
            messages: RefCell::new(Vec::new()),
            scrolls: RefCell::new(Vec::new()),
            resize: ListenerRegistry::new(),
        })
    }

    pub fn set_client_height(&self, height: f64) {
        self.client_height.set(height);
    }

    pub fn set_line_height(&self, height: f64) {
        self.line_height.set(height);
    }

    pub fn set_scroll_top(&self, top: f64) {
        self.scroll_top.set(top);
    }

    /// Notify resize observers of the container
    pub fn fire_resize(&self) {
        self.resize.emit(());
    }

    #[must_use]
    pub fn resize_listener_count(&self) -> usize {
        self.resize.len()
    }

    #[must_use]
    pub fn spacer_height(&self) -> f64 {
        self.spacer_height.get()
    }

    #[must_use]
    pub fn rendered_texts(&self) -> Vec<String> {
        self.texts.borrow().clone()
    }

    /// Indices of lines currently styled active
    #[must_use]
    pub fn active_lines(&self) -> Vec<usize> {
        self.active.borrow().iter().copied().collect()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<PanelMessage> {
        self.messages.borrow().clone()
    }

    #[must_use]
    pub fn last_scroll(&self) -> Option<(f64, ScrollBehavior)> {
        self.scrolls.borrow().last().copied()
    }

    #[must_use]
    pub fn scroll_count(&self) -> usize {
        self.scrolls.borrow().len()
    }

    fn index(line: LineHandle) -> usize {
        usize::try_from(line.0).unwrap_or(usize::MAX)
    }

    fn line_count(&self) -> f64 {
        let count = u32::try_from(self.texts.borrow().len()).unwrap_or(u32::MAX);
        f64::from(count)
    }
}

impl ResizeSource for RecordingTarget {
    fn subscribe_resize(&self, listener: Listener) -> ListenerId {
        self.resize.add((), listener)
    }

    fn unsubscribe_resize(&self, id: ListenerId) -> bool {
        self.resize.remove(id)
    }
}

impl RenderTarget for RecordingTarget {
    fn show_message(&self, message: PanelMessage) {
        self.texts.borrow_mut().clear();
        self.active.borrow_mut().clear();
        self.messages.borrow_mut().push(message);
    }

    fn render_lines(&self, lines: &[LineDescriptor<'_>]) -> Vec<LineHandle> {
        *self.texts.borrow_mut() = lines.iter().map(|l| l.text.to_string()).collect();
        self.active.borrow_mut().clear();
        (0..lines.len())
            .map(|i| LineHandle(u64::try_from(i).unwrap_or(u64::MAX)))
            .collect()
    }

    fn set_spacer_height(&self, height: f64) {
        self.spacer_height.set(height);
    }

    fn set_active(&self, line: LineHandle, active: bool) {
        let index = Self::index(line);
        if active {
            self.active.borrow_mut().insert(index);
        } else {
            self.active.borrow_mut().remove(&index);
        }
    }

    fn line_offset(&self, line: LineHandle) -> f64 {
        let index = u32::try_from(line.0).unwrap_or(u32::MAX);
        self.spacer_height.get() + f64::from(index) * self.line_height.get()
    }

    fn line_height(&self, _line: LineHandle) -> f64 {
        self.line_height.get()
    }

    fn client_height(&self) -> f64 {
        self.client_height.get()
    }

    fn scroll_height(&self) -> f64 {
        let content = 2.0 * self.spacer_height.get() + self.line_count() * self.line_height.get();
        content.max(self.client_height.get())
    }

    fn scroll_top(&self) -> f64 {
        self.scroll_top.get()
    }

    fn scroll_to(&self, top: f64, behavior: ScrollBehavior) {
        self.scroll_top.set(top);
        self.scrolls.borrow_mut().push((top, behavior));
    }
}
