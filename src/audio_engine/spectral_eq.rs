//! Band-gain equalizer in the frequency domain.
//!
//! The non-negative frequency axis, from DC up to the highest bin the buffer
//! actually has, is split into `gains.len()` equal intervals and every bin is
//! scaled by the gain of the interval containing it. The band edges follow
//! the buffer's own highest bin rather than a fixed Nyquist frequency, so
//! for odd buffer lengths they sit slightly below `sample_rate / 2 * i / n`.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

/// Returns the band index that owns a non-negative frequency bin.
///
/// `max_bin` is the highest non-negative bin of the transform. The last band
/// includes `max_bin` itself.
pub fn band_of_bin(bin: usize, max_bin: usize, bands: usize) -> usize {
    if bands == 0 || max_bin == 0 {
        return 0;
    }

    ((bin * bands) / max_bin).min(bands - 1)
}

/// Applies per-band linear gains to a mono buffer.
///
/// Returns a buffer of the same length. An empty buffer or an empty gain
/// list is returned unchanged.
pub fn apply_eq(samples: &[f32], gains: &[f32]) -> Vec<f32> {
    let len = samples.len();
    if len == 0 || gains.is_empty() {
        return samples.to_vec();
    }

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(len);
    let inverse = planner.plan_fft_inverse(len);

    let mut spectrum: Vec<Complex<f64>> = samples
        .iter()
        .map(|&s| Complex::new(s as f64, 0.0))
        .collect();
    forward.process(&mut spectrum);

    // Bin k and bin len-k carry the same frequency; scaling both keeps the
    // spectrum conjugate-symmetric and the output real.
    let max_bin = len / 2;
    for (k, value) in spectrum.iter_mut().enumerate() {
        let bin = k.min(len - k);
        let gain = gains[band_of_bin(bin, max_bin, gains.len())];
        *value *= gain as f64;
    }

    inverse.process(&mut spectrum);

    let scale = 1.0 / len as f64;
    spectrum.iter().map(|c| (c.re * scale) as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_engine::tone::generate_tone;

    const SR: u32 = 44_100;

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_band_of_bin() {
        // 6 bands over bins 0..=12
        assert_eq!(band_of_bin(0, 12, 6), 0);
        assert_eq!(band_of_bin(1, 12, 6), 0);
        assert_eq!(band_of_bin(2, 12, 6), 1);
        assert_eq!(band_of_bin(11, 12, 6), 5);
        // The boundary bin belongs to the last band.
        assert_eq!(band_of_bin(12, 12, 6), 5);
    }

    #[test]
    fn test_every_bin_has_a_band() {
        for len in [1usize, 2, 7, 64, 101, 22_050] {
            let max_bin = len / 2;
            for bin in 0..=max_bin {
                assert!(band_of_bin(bin, max_bin, 6) < 6);
            }
        }
    }

    #[test]
    fn test_unity_gains_are_identity() {
        for len_ms in [10, 11, 500] {
            let tone = generate_tone(440.0, 660.0, len_ms, SR);
            let out = apply_eq(&tone, &[1.0; 6]);

            assert_eq!(out.len(), tone.len());
            for (a, b) in out.iter().zip(&tone) {
                assert!((a - b).abs() <= 1e-6 * b.abs().max(1.0));
            }
        }
    }

    #[test]
    fn test_zero_gains_silence() {
        let tone = generate_tone(440.0, 660.0, 50, SR);
        let out = apply_eq(&tone, &[0.0; 6]);
        assert!(out.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_uniform_gain_scales() {
        let tone = generate_tone(440.0, 660.0, 50, SR);
        let out = apply_eq(&tone, &[0.5; 6]);
        for (a, b) in out.iter().zip(&tone) {
            assert!((a - b * 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_band_isolation() {
        // 1000 Hz sits in band 0 (0..3675 Hz); 20000 Hz sits in band 5.
        let low = generate_tone(1000.0, 1000.0, 100, SR);
        let high = generate_tone(20_000.0, 20_000.0, 100, SR);
        let mixed: Vec<f32> = low.iter().zip(&high).map(|(a, b)| 0.5 * (a + b)).collect();

        let out = apply_eq(&mixed, &[1.0, 1.0, 1.0, 1.0, 1.0, 0.0]);
        let expected: Vec<f32> = low.iter().map(|s| 0.5 * s).collect();

        let err: Vec<f32> = out.iter().zip(&expected).map(|(a, b)| a - b).collect();
        assert!(rms(&err) < 0.01 * rms(&expected));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(apply_eq(&[], &[1.0; 6]).is_empty());
        assert_eq!(apply_eq(&[0.25, -0.25], &[]), vec![0.25, -0.25]);
    }

    #[test]
    fn test_single_sample() {
        let out = apply_eq(&[0.75], &[0.5, 1.0]);
        assert!((out[0] - 0.375).abs() < 1e-6);
    }
}
