//! Audio-specific error types.

use thiserror::Error;

/// Errors surfaced by the control-path API of the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The playback sink could not be opened or is not ready.
    #[error("audio device unavailable: {0}")]
    AudioDeviceUnavailable(#[source] SinkError),

    /// The voice index does not exist.
    #[error("unknown voice {voice_id} (expected 0..{voices})")]
    UnknownVoice {
        /// Requested voice index.
        voice_id: usize,
        /// Number of voices in the rack.
        voices: usize,
    },

    /// The parameter name is not recognized.
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// The step index lies outside the step grid.
    #[error("step {step} out of range (expected 0..{steps})")]
    StepOutOfRange {
        /// Requested step index.
        step: usize,
        /// Number of steps in a row.
        steps: usize,
    },

    /// A NaN or infinite value was passed where a number is required.
    #[error("non-finite value for {name}")]
    NonFiniteValue {
        /// Name of the rejected parameter.
        name: String,
    },

    /// The clock has not drained its control queue; the change was not applied.
    #[error("control queue is full")]
    ControlQueueFull,

    /// The transport clock thread could not be started.
    #[error("failed to start transport clock: {0}")]
    ClockSpawn(#[source] std::io::Error),

    /// Reading or writing a pattern document failed.
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Errors raised by a playback sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// No default output device exists.
    #[error("no output device found")]
    NoDevice,

    /// The default output configuration could not be queried.
    #[error("failed to query output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    /// The output stream could not be created.
    #[error("failed to create audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    /// The output stream could not be started.
    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// The sink has been shut down.
    #[error("playback sink is closed")]
    Closed,

    /// The stream callback has not drained pending buffers.
    #[error("playback queue is full")]
    QueueFull,
}

/// Errors raised while rendering one note.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    /// The note duration produced no samples.
    #[error("note has no samples (duration {duration_ms} ms)")]
    EmptyNote {
        /// Requested note duration.
        duration_ms: u32,
    },

    /// A processing stage produced NaN or infinity.
    #[error("non-finite sample produced by {stage}")]
    NonFinite {
        /// Name of the offending stage.
        stage: &'static str,
    },
}

/// Errors raised while saving or loading a pattern document.
#[derive(Debug, Error)]
pub enum PatternError {
    /// Failed to open, read or write the file.
    #[error("pattern file i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON.
    #[error("pattern file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
