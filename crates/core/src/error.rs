//! Error taxonomy for the automation core

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrushError {
    /// No usable calibration profile; fatal to the session
    #[error("calibration profile '{profile}' unavailable: {reason}")]
    CalibrationMissing { profile: String, reason: String },

    /// Label has no calibrated position, even after synonym resolution
    #[error("no calibrated position for '{0}'")]
    UnknownToolLabel(String),

    /// Window missing, minimized, unfocusable, or too small to hold a canvas
    #[error("invalid window state: {0}")]
    InvalidWindowState(String),

    /// Point outside its valid range. Recovered by clamping; only ever logged.
    #[error("coordinate ({x}, {y}) outside {range}, clamped")]
    CoordinateOutOfBounds { x: i32, y: i32, range: String },

    /// Perimeter sampling saw too few changes
    #[error("only {changed} of {total} perimeter samples changed (need more than {threshold})")]
    VerificationFailed { changed: usize, total: usize, threshold: usize },

    #[error("failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed protocol line or parameter payload
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Tool belongs to an external collaborator (launch, save dialog, ...)
    #[error("tool '{0}' is handled outside the automation core")]
    Unsupported(String),

    /// Input backend refused an event
    #[error("input backend error: {0}")]
    Input(String),
}

/// Result type for automation operations
pub type Result<T> = std::result::Result<T, BrushError>;
