//! Resolution progress events for jarlock.
//!
//! The resolver and downloader never print. They emit [`Event`]s through an
//! [`EventSender`]; the [`EventBus`] forwards them, in order, to the single
//! [`Listener`] registered for the run.
//!
//! # Architecture
//!
//! ```text
//!  resolver tasks ──┐
//!  downloader ──────┼─▶ EventSender ─▶ EventBus ─▶ Listener (Plain | Rich)
//!  graph builder ───┘       (mpsc)      (task)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use jarlock_events::{EventBus, PlainListener, emit_phase};
//! use std::sync::Arc;
//!
//! let bus = EventBus::new(Arc::new(PlainListener::stderr()));
//! let sender = bus.sender().unwrap();
//! emit_phase!(sender, "Resolving");
//! bus.shutdown().await;
//! ```

pub mod bus;
pub mod event;
pub mod listener;
pub mod renderers;

// Re-exports for convenience
pub use bus::{EventBus, EventSender, SendError};
pub use event::{DownloadStage, Event};
#[cfg(any(test, feature = "testing"))]
pub use listener::RecordingListener;
pub use listener::{Listener, NullListener};
pub use renderers::{PlainListener, RichListener};

// ============================================================================
// Emit Macros
// ============================================================================

/// Emit a phase change, mirrored to tracing.
///
/// # Example
/// ```rust,ignore
/// emit_phase!(sender, "Downloading");
/// ```
#[macro_export]
macro_rules! emit_phase {
    ($sender:expr, $name:expr) => {{
        let name: ::std::string::String = ::std::convert::Into::into($name);
        ::tracing::info!(target: "jarlock::phase", phase = %name, "Phase started");
        $sender.phase(name);
    }};
}

/// Emit a user-facing warning, mirrored to tracing.
///
/// # Example
/// ```rust,ignore
/// emit_log!(sender, "resolver", "{} not found in any repository", coords);
/// ```
#[macro_export]
macro_rules! emit_log {
    ($sender:expr, $source:expr, $($arg:tt)+) => {{
        let message = ::std::format!($($arg)+);
        ::tracing::warn!(target: "jarlock::log", source = %$source, "{}", message);
        $sender.log($source, message);
    }};
}
