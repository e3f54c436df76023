//! Stereo mixing and 16-bit quantization.
//!
//! The mono note is scaled into the signed 16-bit range, clipped, and then
//! multiplied independently by the left and right channel gains. Where the
//! voice's overall dB level enters is decided by [`GainStaging`]:
//!
//! - [`GainStaging::SinkLevel`]: the samples are quantized at full scale and
//!   the dB level travels with the buffer as a playback level for the sink.
//! - [`GainStaging::PreQuantize`]: the dB level scales the samples before
//!   quantization and the sink plays at unity.
//!
//! Either way the level is applied exactly once.

use crate::audio_engine::config::GainStaging;
use crate::audio_engine::constants::{LEVEL_MAX, LEVEL_MIN, PCM_FULL_SCALE};
use crate::messages::RenderBuffer;

/// A quantized note and the level the sink should play it at.
#[derive(Debug, Clone, PartialEq)]
pub struct MixedNote {
    pub buffer: RenderBuffer,

    /// Linear playback level for the sink.
    pub level: f32,
}

/// Converts a dB value to a linear gain.
pub fn db_to_linear_gain(db: f32) -> f32 {
    if !db.is_finite() {
        return if db == f32::NEG_INFINITY { 0.0 } else { 1.0 };
    }

    10.0_f32.powf(db / 20.0)
}

fn clamp_gain(gain: f32) -> f32 {
    if gain.is_finite() {
        gain.clamp(LEVEL_MIN, LEVEL_MAX)
    } else {
        LEVEL_MIN
    }
}

/// Quantizes a mono buffer into interleaved 16-bit stereo.
///
/// # Parameters
///
/// - `samples`: Processed mono samples, nominally in `[-1.0, 1.0]`
/// - `left_gain`, `right_gain`: Channel gains (0.0 to 1.0)
/// - `volume_db`: The voice's overall level in dB
/// - `staging`: Where `volume_db` is applied
pub fn mix_to_stereo(
    samples: &[f32],
    left_gain: f32,
    right_gain: f32,
    volume_db: f32,
    staging: GainStaging,
) -> MixedNote {
    let level = db_to_linear_gain(volume_db);
    let (pre_gain, sink_level) = match staging {
        GainStaging::SinkLevel => (1.0, level),
        GainStaging::PreQuantize => (level, 1.0),
    };

    let left_gain = clamp_gain(left_gain);
    let right_gain = clamp_gain(right_gain);
    let scale = PCM_FULL_SCALE * pre_gain;

    let mut interleaved = Vec::with_capacity(samples.len() * RenderBuffer::CHANNELS);
    for &sample in samples {
        let sample = if sample.is_finite() { sample } else { 0.0 };
        let clipped = (sample * scale).clamp(i16::MIN as f32, i16::MAX as f32);
        // `as` truncates towards zero and saturates at the i16 bounds.
        interleaved.push((clipped * left_gain) as i16);
        interleaved.push((clipped * right_gain) as i16);
    }

    MixedNote {
        buffer: RenderBuffer::from_interleaved(interleaved),
        level: sink_level,
    }
}
