//! Playback sink abstraction.
//!
//! Render tasks hand finished buffers to a [`PlaybackSink`]. The engine only
//! requires that `play` never blocks for the duration of the note; the sink
//! is free to mix, queue or drop.

use crate::audio_engine::errors::SinkError;
use crate::messages::RenderBuffer;

/// Destination for rendered notes.
///
/// Implementations are shared between render threads and must be cheap to
/// call concurrently.
pub trait PlaybackSink: Send + Sync + 'static {
    /// Reports whether the sink can accept buffers. Called once when the
    /// engine is created.
    fn check_ready(&self) -> Result<(), SinkError>;

    /// Starts playing `buffer` at linear `level` and returns immediately.
    fn play(&self, buffer: RenderBuffer, level: f32) -> Result<(), SinkError>;
}
