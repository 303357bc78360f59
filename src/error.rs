//! Error handling for Cadenza
//!
//! Every failure is reported as a value; none of them is allowed to leave a
//! track half-edited or a history entry half-committed.

use thiserror::Error;

/// Result type alias for Cadenza operations
pub type Result<T> = std::result::Result<T, CadenzaError>;

/// Main error type for Cadenza operations
#[derive(Error, Debug)]
pub enum CadenzaError {
    // Editing Errors
    #[error("Invalid parameter '{param}': {value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    #[error("Invalid range: {reason}")]
    InvalidRange { reason: String },

    #[error("Track {track_id} is busy with another edit")]
    TrackBusy { track_id: String },

    #[error("Track not found: {track_id}")]
    TrackNotFound { track_id: String },

    #[error("Nothing to do: {operation}")]
    EmptyOperation { operation: String },

    #[error("DSP overflow: effect '{effect}' produced invalid audio (NaN/Inf)")]
    DspOverflow { effect: String },

    #[error("Background job {job_id} ({effect}) panicked: {message}")]
    JobPanicked {
        job_id: u64,
        effect: String,
        message: String,
    },

    // Project Errors
    #[error("Corrupt project: {reason}")]
    CorruptProject { reason: String },

    // Audio I/O Errors
    #[error("Invalid audio: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CadenzaError {
    /// Shorthand used by parameter validation throughout the DSP library
    pub fn invalid_parameter(
        param: &str,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        CadenzaError::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    /// Shorthand for range failures
    pub fn invalid_range(reason: impl Into<String>) -> Self {
        CadenzaError::InvalidRange {
            reason: reason.into(),
        }
    }

    /// Shorthand for load failures
    pub fn corrupt_project(reason: impl Into<String>) -> Self {
        CadenzaError::CorruptProject {
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            CadenzaError::InvalidParameter { .. } => "INVALID_PARAMETER",
            CadenzaError::InvalidRange { .. } => "INVALID_RANGE",
            CadenzaError::TrackBusy { .. } => "TRACK_BUSY",
            CadenzaError::TrackNotFound { .. } => "TRACK_NOT_FOUND",
            CadenzaError::EmptyOperation { .. } => "EMPTY_OPERATION",
            CadenzaError::DspOverflow { .. } => "DSP_OVERFLOW",
            CadenzaError::JobPanicked { .. } => "JOB_PANICKED",
            CadenzaError::CorruptProject { .. } => "CORRUPT_PROJECT",
            CadenzaError::InvalidAudio { .. } => "INVALID_AUDIO",
            CadenzaError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            CadenzaError::Io(_) => "IO_ERROR",
            CadenzaError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the editing session can simply carry on after this error.
    ///
    /// Every editing error is recoverable: the store is untouched. Only raw
    /// I/O and serialization failures need the caller's attention.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CadenzaError::Io(_) | CadenzaError::Serialization(_))
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            CadenzaError::InvalidParameter { .. } => vec![
                "Check the effect settings against their allowed ranges",
                "Reset the effect to its default values and try again",
            ],
            CadenzaError::InvalidRange { .. } => vec![
                "Make a selection inside the track's duration",
                "Split points must lie strictly inside the track",
            ],
            CadenzaError::TrackBusy { .. } => vec![
                "Wait for the current edit on this track to finish",
                "Undo to abandon the pending edit",
            ],
            CadenzaError::EmptyOperation { .. } => vec![
                "Select a track or make a selection first",
                "Unmute or unsolo tracks so that something contributes audio",
            ],
            CadenzaError::DspOverflow { .. } => vec![
                "The effect settings may be too extreme",
                "The edit was not applied; the track is unchanged",
            ],
            CadenzaError::JobPanicked { .. } => vec![
                "The edit was not applied; the track is unchanged",
                "Run the effect again synchronously to see the underlying error",
            ],
            CadenzaError::CorruptProject { .. } => vec![
                "The current session was left untouched",
                "Check that every audio file referenced by the project exists",
            ],
            CadenzaError::UnsupportedFormat { .. } => vec![
                "Export to WAV (16, 24 or 32-bit)",
                "Use an external encoder for MP3 or OGG",
            ],
            _ => vec![],
        }
    }
}
