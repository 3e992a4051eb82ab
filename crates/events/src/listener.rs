//! The consumer side of the event stream.

use crate::event::Event;

/// Receives every event of one run, in send order.
///
/// Called from the bus's forwarding task, so implementations must not block
/// for long.
pub trait Listener: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &Event);

    /// Called once after the last event of the run.
    fn close(&self) {}
}

/// Listener that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl Listener for NullListener {
    fn on_event(&self, _event: &Event) {}
}

/// Listener that keeps every event for later assertions.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: std::sync::Mutex<Vec<Event>>,
    closed: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "testing"))]
impl RecordingListener {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of download events at `stage`.
    #[must_use]
    pub fn download_count(&self, stage: crate::DownloadStage) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Download { stage: s, .. } if *s == stage))
            .count()
    }

    /// How many times `close` was called.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.closed.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "testing"))]
impl Listener for RecordingListener {
    fn on_event(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }

    fn close(&self) {
        self.closed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}
