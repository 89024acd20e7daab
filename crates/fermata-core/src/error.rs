//! Engine error taxonomy
//!
//! All file and hardware failures are caught at the engine boundary and turned
//! into state transitions plus a log entry; none of them abort the process.

use thiserror::Error;

/// Errors surfaced by the playback and live-input engines.
#[derive(Error, Debug)]
pub enum CoreError {
    /// File missing, corrupt, or undecodable. The engine stays in its prior
    /// state and the file is skipped.
    #[error("unreadable audio file: {0}")]
    UnreadableFile(String),

    /// Read or seek past the end of the decoded stream. Most callers clamp
    /// instead; this surfaces only from the strict read API.
    #[error("out of range: requested frames {start}..{end} of {total}")]
    OutOfRange { start: u64, end: u64, total: u64 },

    /// The hardware graph could not be attached, connected, or started.
    /// The owning engine transitions to its disabled/empty state.
    #[error("audio engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The selected input device vanished. Requires user reselection.
    #[error("audio device removed: {0}")]
    DeviceRemoved(String),
}

/// Result alias for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;
