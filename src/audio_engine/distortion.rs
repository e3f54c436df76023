//! Soft-clip distortion.

use crate::audio_engine::constants::{DISTORTION_DRIVE, LEVEL_MAX};

/// Drives the buffer into a hyperbolic-tangent soft clipper in place.
///
/// `amount` of 0 (or below) leaves the buffer untouched. Otherwise the signal
/// is scaled by `1 + 10 * amount` and passed through `tanh`, which bounds it
/// to `[-1.0, 1.0]`.
pub fn apply_distortion(samples: &mut [f32], amount: f32) {
    if amount.is_nan() || amount <= 0.0 {
        return;
    }

    let gain = 1.0 + DISTORTION_DRIVE * amount.min(LEVEL_MAX);
    for sample in samples.iter_mut() {
        *sample = (*sample * gain).tanh();
    }
}
