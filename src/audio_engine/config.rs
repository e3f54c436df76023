//! Engine-wide render configuration.
//!
//! Two behaviors of the rack are mutually incompatible and are therefore
//! selected explicitly here instead of being merged: the envelope curve
//! ([`EnvelopeMode`]) and the point where the voice's overall dB level is
//! applied ([`GainStaging`]).

use serde::{Deserialize, Serialize};

use crate::audio_engine::constants::{EVENT_QUEUE_CAPACITY, NOTE_DURATION_MS, SAMPLE_RATE};

/// Shape of the ADSR envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeMode {
    /// Clamped, normalized, piecewise-linear segments expressed as fractions
    /// of the note duration.
    #[default]
    Linear,

    /// Unclamped segments in seconds, each ramp squared, padded or truncated
    /// to the note length.
    Squared,
}

/// Where the voice's overall dB level is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainStaging {
    /// Per-channel gain is applied before quantization and the dB level is
    /// handed to the sink as a playback level.
    #[default]
    SinkLevel,

    /// The dB level scales the signal before quantization and the sink
    /// plays at unity.
    PreQuantize,
}

/// Render settings shared by every voice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate of rendered notes in Hz.
    pub sample_rate: u32,

    /// Length of each rendered note in milliseconds.
    pub note_duration_ms: u32,

    /// Envelope variant.
    pub envelope: EnvelopeMode,

    /// Gain staging variant.
    pub gain_staging: GainStaging,

    /// Number of diagnostic events held until polled.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            note_duration_ms: NOTE_DURATION_MS,
            envelope: EnvelopeMode::default(),
            gain_staging: GainStaging::default(),
            event_capacity: EVENT_QUEUE_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Note duration in seconds.
    pub fn note_duration_secs(&self) -> f32 {
        self.note_duration_ms as f32 / 1000.0
    }

    /// Number of samples in one rendered note.
    pub fn note_len(&self) -> usize {
        (self.sample_rate as f64 * self.note_duration_ms as f64 / 1000.0).ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.note_duration_ms, 500);
        assert_eq!(config.envelope, EnvelopeMode::Linear);
        assert_eq!(config.gain_staging, GainStaging::SinkLevel);
        assert_eq!(config.note_len(), 22_050);
        assert_eq!(config.event_capacity, 1024);
    }

    #[test]
    fn test_note_len_rounds_up() {
        let config = EngineConfig {
            sample_rate: 44_100,
            note_duration_ms: 1,
            ..EngineConfig::default()
        };
        // 44.1 samples
        assert_eq!(config.note_len(), 45);
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"envelope": "squared", "gain_staging": "pre_quantize"}"#)
                .unwrap();
        assert_eq!(config.envelope, EnvelopeMode::Squared);
        assert_eq!(config.gain_staging, GainStaging::PreQuantize);
        assert_eq!(config.note_duration_ms, 500);
    }
}
