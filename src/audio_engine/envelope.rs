//! ADSR envelope shaping.
//!
//! The envelope is rendered as a whole-note gain curve whose length always
//! equals the note buffer. Two curve families exist, selected by
//! [`EnvelopeMode`]:
//!
//! - [`EnvelopeMode::Linear`]: attack/decay/release are clamped to
//!   0.001..=0.9 and read as fractions of the note length. When they add up
//!   to 1.0 or more they are scaled down to sum to 0.99. Segments are
//!   straight lines, and any remainder after the release is silence.
//! - [`EnvelopeMode::Squared`]: attack/decay/release are seconds converted
//!   straight to sample counts. Every segment is the square of the linear
//!   one (the sustain plateau sits at `sustain²`). The result is truncated
//!   or zero-padded to the note length.

use crate::audio_engine::config::EnvelopeMode;
use crate::audio_engine::constants::{
    ADSR_NORMALIZED_SUM, ADSR_TIME_MAX, ADSR_TIME_MIN, LEVEL_MAX, LEVEL_MIN,
};

/// Attack/decay/release times and sustain level of one note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adsr {
    pub attack: f32,
    pub decay: f32,
    /// Sustain level (0.0 to 1.0).
    pub sustain: f32,
    pub release: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SegmentLengths {
    attack: usize,
    decay: usize,
    release: usize,
}

fn clamp_time(seconds: f32) -> f32 {
    if seconds.is_finite() {
        seconds.clamp(ADSR_TIME_MIN, ADSR_TIME_MAX)
    } else {
        ADSR_TIME_MIN
    }
}

fn clamp_level(level: f32) -> f32 {
    if level.is_finite() {
        level.clamp(LEVEL_MIN, LEVEL_MAX)
    } else {
        LEVEL_MIN
    }
}

fn seconds_to_samples(seconds: f32, sample_rate: u32) -> usize {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds as f64 * sample_rate as f64) as usize
    } else {
        0
    }
}

fn linear_lengths(adsr: &Adsr, len: usize) -> SegmentLengths {
    let mut attack = clamp_time(adsr.attack);
    let mut decay = clamp_time(adsr.decay);
    let mut release = clamp_time(adsr.release);

    let total = attack + decay + release;
    if total >= 1.0 {
        let factor = ADSR_NORMALIZED_SUM / total;
        attack *= factor;
        decay *= factor;
        release *= factor;
    }

    let to_samples = |fraction: f32| (fraction as f64 * len as f64) as usize;
    SegmentLengths {
        attack: to_samples(attack),
        decay: to_samples(decay),
        release: to_samples(release),
    }
}

fn squared_lengths(adsr: &Adsr, sample_rate: u32) -> SegmentLengths {
    SegmentLengths {
        attack: seconds_to_samples(adsr.attack, sample_rate),
        decay: seconds_to_samples(adsr.decay, sample_rate),
        release: seconds_to_samples(adsr.release, sample_rate),
    }
}

/// Linear ramp from `start` towards `end` over `count` points.
///
/// With `inclusive` the last point equals `end`; otherwise `end` is never
/// reached.
fn ramp(start: f32, end: f32, count: usize, inclusive: bool) -> impl Iterator<Item = f32> {
    let divisor = if inclusive {
        count.saturating_sub(1).max(1)
    } else {
        count.max(1)
    } as f32;

    (0..count).map(move |i| start + (end - start) * (i as f32 / divisor))
}

/// Builds an envelope of exactly `len` samples.
pub fn build_envelope(
    len: usize,
    adsr: &Adsr,
    mode: EnvelopeMode,
    sample_rate: u32,
) -> Vec<f32> {
    let sustain = clamp_level(adsr.sustain);
    let lengths = match mode {
        EnvelopeMode::Linear => linear_lengths(adsr, len),
        EnvelopeMode::Squared => squared_lengths(adsr, sample_rate),
    };

    let segments = lengths
        .attack
        .saturating_add(lengths.decay)
        .saturating_add(lengths.release);
    let sustain_len = len.saturating_sub(segments);

    // Segments past the note end are never materialized.
    let mut envelope = Vec::with_capacity(len);
    envelope.extend(
        ramp(0.0, 1.0, lengths.attack, false)
            .chain(ramp(1.0, sustain, lengths.decay, false))
            .chain(std::iter::repeat_n(sustain, sustain_len))
            .chain(ramp(sustain, 0.0, lengths.release, true))
            .take(len),
    );

    if mode == EnvelopeMode::Squared {
        for value in envelope.iter_mut() {
            *value *= *value;
        }
    }

    envelope.resize(len, 0.0);
    envelope
}

/// Multiplies a mono buffer by an envelope, sample by sample.
pub fn apply_envelope(samples: &mut [f32], envelope: &[f32]) {
    for (sample, gain) in samples.iter_mut().zip(envelope) {
        *sample *= gain;
    }
}
