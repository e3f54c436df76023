//! Four-voice step-sequenced tone synthesizer.
//!
//! Build an [`AudioEngine`] on top of a [`PlaybackSink`] (for example the
//! [`CpalSink`] from a [`PlaybackContext`]), program the voices and the step
//! grid, and start the transport.

pub mod audio_engine;
pub mod messages;

pub use audio_engine::AudioEngine;
pub use audio_engine::audio_stream::{CpalSink, PlaybackContext, setup_logger};
pub use audio_engine::config::{EngineConfig, EnvelopeMode, GainStaging};
pub use audio_engine::errors::{EngineError, PatternError, RenderError, SinkError};
pub use audio_engine::pattern::LoadReport;
pub use audio_engine::playback::PlaybackSink;
pub use audio_engine::session::Session;
pub use audio_engine::voice::{VoiceConfig, VoiceParam};
pub use messages::{EngineEvent, RenderBuffer};
