//! Line-oriented listener.
//!
//! Writes one line per interesting event with no buffering and no terminal
//! control codes, so the output is safe for logs and pipes.

use crate::event::{DownloadStage, Event};
use crate::listener::Listener;
use std::io::{self, Write};
use std::sync::Mutex;

/// Listener that prints download starts, warnings and phase changes.
#[derive(Debug)]
pub struct PlainListener<W: Write + Send> {
    out: Mutex<W>,
}

impl PlainListener<io::Stderr> {
    /// Listener writing to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> PlainListener<W> {
    /// Listener writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_event(out: &mut W, event: &Event) -> io::Result<()> {
        match event {
            Event::Download {
                stage: DownloadStage::Starting,
                target,
            } => writeln!(out, "Downloading {target}"),
            Event::Download {
                stage: DownloadStage::Complete,
                ..
            } => Ok(()),
            Event::Log {
                source,
                message,
                detail,
            } => {
                writeln!(out, "WARNING [{source}] {message}")?;
                if let Some(detail) = detail {
                    writeln!(out, "  {detail}")?;
                }
                Ok(())
            }
            Event::Phase { name } => writeln!(out, "==> {name}"),
        }
    }
}

impl<W: Write + Send> Listener for PlainListener<W> {
    fn on_event(&self, event: &Event) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        if Self::write_event(&mut *out, event)
            .and_then(|()| out.flush())
            .is_err()
        {
            tracing::debug!("Failed to write progress line");
        }
    }
}
