//! # Design
//!
//! - Provide structured, constant-message errors for the sink pipeline.
//! - Capture the paths involved so rotation failures are reproducible in tests.
//! - Classify each failure as fatal or recoverable for callers and metrics.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Errors produced while writing or rotating log files.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The active file could not be opened or created.
    #[error("failed to open log file")]
    Open {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Every archive name candidate was already taken.
    #[error("archive names exhausted")]
    NamesExhausted {
        /// Undisambiguated candidate name.
        candidate: PathBuf,
        /// Number of names probed.
        attempts: usize,
    },
    /// Checking whether an archive name is free failed.
    #[error("failed to probe archive name")]
    Probe {
        /// Candidate that could not be checked.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Renaming the closed file to its archive name failed.
    #[error("failed to archive log file")]
    Rename {
        /// Active path being archived.
        from: PathBuf,
        /// Archive name that was chosen.
        to: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Deleting an untouched initial file failed.
    #[error("failed to remove empty log file")]
    Remove {
        /// Path that could not be removed.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The sink lost its file after a fatal rotation failure.
    #[error("log sink is closed")]
    Closed {
        /// Active path the sink was writing to.
        path: PathBuf,
    },
    /// Appending a record failed.
    #[error("failed to append log record")]
    Write {
        /// Active path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Flushing or syncing the active file failed.
    #[error("failed to flush log file")]
    Flush {
        /// Active path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The record formatter failed.
    #[error("failed to format log record")]
    Format {
        /// Underlying formatter error.
        source: io::Error,
    },
    /// A thread panicked while holding the sink lock.
    #[error("log sink lock poisoned")]
    Poisoned,
    /// The delivery queue no longer accepts records.
    #[error("log queue is closed")]
    QueueClosed,
    /// The delivery worker thread could not be started.
    #[error("failed to spawn log worker")]
    Spawn {
        /// Underlying IO error.
        source: io::Error,
    },
    /// The delivery worker thread panicked.
    #[error("log worker panicked")]
    WorkerPanicked,
}

impl SinkError {
    /// Whether the failure leaves the sink unable to accept further records.
    ///
    /// Append, flush and formatter failures affect a single record; everything
    /// else is fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Write { .. } | Self::Flush { .. } | Self::Format { .. }
        )
    }

    /// Short machine-readable label, used as the metrics `kind`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::NamesExhausted { .. } => "names_exhausted",
            Self::Probe { .. } => "probe",
            Self::Rename { .. } => "rename",
            Self::Remove { .. } => "remove",
            Self::Closed { .. } => "closed",
            Self::Write { .. } => "write",
            Self::Flush { .. } => "flush",
            Self::Format { .. } => "format",
            Self::Poisoned => "poisoned",
            Self::QueueClosed => "queue_closed",
            Self::Spawn { .. } => "spawn",
            Self::WorkerPanicked => "worker_panicked",
        }
    }
}
