//! Live terminal listener.
//!
//! Keeps the latest phase, the downloads in flight and the warnings not yet
//! shown. A background thread redraws that region every 200 ms: warnings are
//! printed above it and stay in the scrollback, the live lines are erased and
//! redrawn on every tick.

use crate::event::{DownloadStage, Event};
use crate::listener::Listener;
use crossterm::cursor::MoveToPreviousLine;
use crossterm::queue;
use crossterm::terminal::{self, Clear, ClearType};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Interval between repaints.
pub const REPAINT_INTERVAL: Duration = Duration::from_millis(200);

const ELLIPSIS: char = '…';
const FALLBACK_WIDTH: usize = 80;

#[derive(Debug, Default)]
struct DisplayState {
    phase: Option<String>,
    /// Targets in flight, with how many concurrent downloads share each.
    in_flight: BTreeMap<String, usize>,
    pending_logs: Vec<String>,
    drawn_lines: u16,
}

impl DisplayState {
    fn apply(&mut self, event: &Event) {
        match event {
            Event::Phase { name } => self.phase = Some(name.clone()),
            Event::Download {
                stage: DownloadStage::Starting,
                target,
            } => {
                *self.in_flight.entry(target.clone()).or_default() += 1;
            }
            Event::Download {
                stage: DownloadStage::Complete,
                target,
            } => {
                if let Some(count) = self.in_flight.get_mut(target) {
                    *count -= 1;
                    if *count == 0 {
                        self.in_flight.remove(target);
                    }
                }
            }
            Event::Log {
                source,
                message,
                detail,
            } => {
                self.pending_logs.push(format!("WARNING [{source}] {message}"));
                if let Some(detail) = detail {
                    self.pending_logs.push(format!("  {detail}"));
                }
            }
        }
    }

    /// Lines of the live region.
    fn live_lines(&self, width: usize) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.in_flight.len() + 1);
        if let Some(phase) = &self.phase {
            lines.push(truncate_to_width(phase, width));
        }
        for (target, &count) in &self.in_flight {
            let line = truncate_to_width(&format!("  Downloading {target}"), width);
            lines.extend(std::iter::repeat_n(line, count));
        }
        lines
    }
}

struct Screen {
    state: DisplayState,
    out: Box<dyn Write + Send>,
    width: Option<usize>,
}

impl Screen {
    fn width(&self) -> usize {
        self.width.unwrap_or_else(|| {
            terminal::size().map_or(FALLBACK_WIDTH, |(columns, _)| usize::from(columns))
        })
    }

    fn erase(&mut self) -> io::Result<()> {
        if self.state.drawn_lines > 0 {
            queue!(
                self.out,
                MoveToPreviousLine(self.state.drawn_lines),
                Clear(ClearType::FromCursorDown)
            )?;
            self.state.drawn_lines = 0;
        }
        Ok(())
    }

    fn flush_logs(&mut self) -> io::Result<()> {
        for line in self.state.pending_logs.drain(..) {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    fn repaint(&mut self) -> io::Result<()> {
        let width = self.width();
        self.erase()?;
        self.flush_logs()?;
        let lines = self.state.live_lines(width);
        for line in &lines {
            writeln!(self.out, "{line}")?;
        }
        self.state.drawn_lines = u16::try_from(lines.len()).unwrap_or(u16::MAX);
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        self.erase()?;
        self.flush_logs()?;
        self.out.flush()
    }
}

/// Listener redrawing a live progress region on a terminal.
pub struct RichListener {
    screen: Arc<Mutex<Screen>>,
    stop: Mutex<Option<mpsc::Sender<()>>>,
    painter: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for RichListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RichListener").finish_non_exhaustive()
    }
}

impl RichListener {
    /// Listener drawing on stderr, sized to the terminal.
    #[must_use]
    pub fn stderr() -> Self {
        Self::start(Box::new(io::stderr()), None)
    }

    /// Listener drawing on `out` with a fixed width.
    #[must_use]
    pub fn with_writer(out: Box<dyn Write + Send>, width: usize) -> Self {
        Self::start(out, Some(width))
    }

    fn start(out: Box<dyn Write + Send>, width: Option<usize>) -> Self {
        let screen = Arc::new(Mutex::new(Screen {
            state: DisplayState::default(),
            out,
            width,
        }));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let painter_screen = Arc::clone(&screen);
        let painter = std::thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(REPAINT_INTERVAL) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Ok(mut screen) = painter_screen.lock() {
                            if let Err(e) = screen.repaint() {
                                tracing::debug!(error = %e, "Repaint failed");
                            }
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            if let Ok(mut screen) = painter_screen.lock() {
                if let Err(e) = screen.finish() {
                    tracing::debug!(error = %e, "Final clear failed");
                }
            }
        });

        Self {
            screen,
            stop: Mutex::new(Some(stop_tx)),
            painter: Mutex::new(Some(painter)),
        }
    }

    fn stop_painter(&self) {
        if let Some(stop) = self.stop.lock().ok().and_then(|mut guard| guard.take()) {
            let _ = stop.send(());
        }
        if let Some(painter) = self.painter.lock().ok().and_then(|mut guard| guard.take()) {
            if painter.join().is_err() {
                tracing::warn!("Progress repaint thread panicked");
            }
        }
    }
}

impl Listener for RichListener {
    fn on_event(&self, event: &Event) {
        if let Ok(mut screen) = self.screen.lock() {
            screen.state.apply(event);
        }
    }

    fn close(&self) {
        self.stop_painter();
    }
}

impl Drop for RichListener {
    fn drop(&mut self) {
        // Restore the terminal even when close() was never reached.
        self.stop_painter();
    }
}

/// Shorten `line` to at most `width` characters, ending in an ellipsis when cut.
#[must_use]
pub fn truncate_to_width(line: &str, width: usize) -> String {
    if line.chars().count() <= width {
        return line.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut truncated: String = line.chars().take(width - 1).collect();
    truncated.push(ELLIPSIS);
    truncated
}
