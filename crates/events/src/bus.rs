//! Single-listener `EventBus` for jarlock events.
//!
//! Producers hold cloneable [`EventSender`]s; one forwarding task hands every
//! event to the registered [`Listener`] in send order.

use crate::event::{DownloadStage, Event};
use crate::listener::Listener;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug)]
enum Envelope {
    Event(Event),
    Close,
}

/// Event bus delivering to exactly one listener.
pub struct EventBus {
    /// Sender for submitting events (wrapped in Option for shutdown support).
    sender: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    /// Forwarding task, awaited on shutdown.
    worker: Mutex<Option<JoinHandle<()>>>,
    verbose: bool,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a bus forwarding to `listener`, with detailed logs suppressed.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(listener: Arc<dyn Listener>) -> Self {
        Self::with_verbosity(listener, false)
    }

    /// Create a bus forwarding to `listener`.
    ///
    /// When `verbose` is false, [`EventSender::log_detail`] events are dropped
    /// at the sender.
    #[must_use]
    pub fn with_verbosity(listener: Arc<dyn Listener>, verbose: bool) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Envelope>();

        let worker = tokio::spawn(async move {
            while let Some(envelope) = receiver.recv().await {
                match envelope {
                    Envelope::Event(event) => listener.on_event(&event),
                    Envelope::Close => break,
                }
            }
            listener.close();
        });

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            verbose,
        }
    }

    /// Get a sender for submitting events to the bus.
    ///
    /// Returns `None` if the bus has been shut down.
    #[must_use]
    pub fn sender(&self) -> Option<EventSender> {
        self.sender.lock().ok().and_then(|guard| {
            guard.as_ref().map(|s| EventSender {
                inner: s.clone(),
                verbose: self.verbose,
            })
        })
    }

    /// Whether detailed log events are forwarded.
    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Shut down the event bus.
    ///
    /// Every event sent before this call reaches the listener, then the
    /// listener's `close` runs exactly once. Senders still held elsewhere get
    /// [`SendError::Closed`] afterwards.
    ///
    /// This method is safe to call multiple times.
    pub async fn shutdown(&self) {
        let sender = self.sender.lock().ok().and_then(|mut guard| guard.take());
        if let Some(sender) = sender {
            let _ = sender.send(Envelope::Close);
        }

        let worker = self.worker.lock().ok().and_then(|mut guard| guard.take());
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "Event listener task failed");
            }
        }
    }
}

/// Sender handle for submitting events to an `EventBus`.
#[derive(Debug, Clone)]
pub struct EventSender {
    inner: mpsc::UnboundedSender<Envelope>,
    verbose: bool,
}

impl EventSender {
    /// A sender connected to nothing; every event is dropped.
    #[must_use]
    pub fn noop() -> Self {
        let (inner, _) = mpsc::unbounded_channel();
        Self {
            inner,
            verbose: false,
        }
    }

    /// Send an event to the bus.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus has been shut down.
    pub fn send(&self, event: Event) -> Result<(), SendError> {
        self.inner
            .send(Envelope::Event(event))
            .map_err(|_| SendError::Closed)
    }

    /// Check if the bus is still open.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Whether detailed log events reach the listener.
    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Report that a download attempt is starting.
    pub fn download_starting(&self, target: impl Into<String>) {
        self.emit(Event::download(DownloadStage::Starting, target));
    }

    /// Report that a download attempt finished.
    pub fn download_complete(&self, target: impl Into<String>) {
        self.emit(Event::download(DownloadStage::Complete, target));
    }

    /// Report a phase change.
    pub fn phase(&self, name: impl Into<String>) {
        self.emit(Event::phase(name));
    }

    /// Report a user-facing message.
    pub fn log(&self, source: impl Into<String>, message: impl Into<String>) {
        self.emit(Event::log(source, message));
    }

    /// Report a message with detail; dropped unless the bus is verbose.
    pub fn log_detail(
        &self,
        source: impl Into<String>,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) {
        if !self.verbose {
            return;
        }
        self.emit(Event::Log {
            source: source.into(),
            message: message.into(),
            detail: Some(detail.into()),
        });
    }

    fn emit(&self, event: Event) {
        if self.send(event).is_err() {
            tracing::trace!("Event dropped, bus is closed");
        }
    }
}

/// Error returned when sending to a closed bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The event bus has been closed.
    #[error("event bus is closed")]
    Closed,
}
