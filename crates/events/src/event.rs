//! Event schema for jarlock.
//!
//! Events are produced by the resolver and downloader and consumed by exactly
//! one [`Listener`](crate::Listener) per run.

use std::fmt;

/// Progress of a single download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadStage {
    /// The downloader is about to try a repository.
    Starting,
    /// The attempt finished, successfully or not.
    Complete,
}

impl fmt::Display for DownloadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "STARTING"),
            Self::Complete => write!(f, "COMPLETE"),
        }
    }
}

/// A progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A download attempt started or finished.
    Download {
        /// Stage of the attempt.
        stage: DownloadStage,
        /// What is being downloaded, typically `coordinates from repository`.
        target: String,
    },
    /// A message worth showing to the user.
    Log {
        /// Component that produced the message.
        source: String,
        /// One-line message.
        message: String,
        /// Optional extra detail shown below the message.
        detail: Option<String>,
    },
    /// The run moved to a new phase.
    Phase {
        /// Name of the phase.
        name: String,
    },
}

impl Event {
    /// A download event.
    #[must_use]
    pub fn download(stage: DownloadStage, target: impl Into<String>) -> Self {
        Self::Download {
            stage,
            target: target.into(),
        }
    }

    /// A log event without detail.
    #[must_use]
    pub fn log(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Log {
            source: source.into(),
            message: message.into(),
            detail: None,
        }
    }

    /// A phase event.
    #[must_use]
    pub fn phase(name: impl Into<String>) -> Self {
        Self::Phase { name: name.into() }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download { stage, target } => write!(f, "{stage} {target}"),
            Self::Log {
                source,
                message,
                detail,
            } => {
                write!(f, "[{source}] {message}")?;
                if let Some(detail) = detail {
                    write!(f, "\n  {detail}")?;
                }
                Ok(())
            }
            Self::Phase { name } => write!(f, "{name}"),
        }
    }
}
