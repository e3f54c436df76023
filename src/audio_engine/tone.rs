//! Dual-oscillator tone generation.

use std::f64::consts::TAU;

/// Renders the mean of two sine oscillators.
///
/// Both oscillators start at phase 0 on every call, so retriggering a voice
/// always produces the same waveform.
///
/// # Parameters
///
/// - `freq1`, `freq2`: Oscillator frequencies in Hz
/// - `duration_ms`: Note length in milliseconds
/// - `sample_rate`: Output sample rate in Hz
///
/// # Returns
///
/// `ceil(sample_rate * duration_ms / 1000)` mono samples in `[-1.0, 1.0]`.
pub fn generate_tone(freq1: f32, freq2: f32, duration_ms: u32, sample_rate: u32) -> Vec<f32> {
    if sample_rate == 0 {
        return Vec::new();
    }

    let len = (sample_rate as f64 * duration_ms as f64 / 1000.0).ceil() as usize;
    let step1 = TAU * freq1 as f64 / sample_rate as f64;
    let step2 = TAU * freq2 as f64 / sample_rate as f64;

    (0..len)
        .map(|i| {
            let n = i as f64;
            (((step1 * n).sin() + (step2 * n).sin()) * 0.5) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_length() {
        assert_eq!(generate_tone(440.0, 660.0, 500, 44_100).len(), 22_050);
        assert_eq!(generate_tone(440.0, 660.0, 10, 44_100).len(), 441);
        assert!(generate_tone(440.0, 660.0, 0, 44_100).is_empty());
    }

    #[test]
    fn test_tone_starts_at_zero_phase() {
        let tone = generate_tone(440.0, 660.0, 10, 44_100);
        assert_eq!(tone[0], 0.0);
    }

    #[test]
    fn test_tone_is_mean_of_oscillators() {
        let sr = 8_000;
        let tone = generate_tone(100.0, 300.0, 20, sr);
        for (i, &s) in tone.iter().enumerate() {
            let t = i as f64 / sr as f64;
            let expected = ((TAU * 100.0 * t).sin() + (TAU * 300.0 * t).sin()) / 2.0;
            assert!((s as f64 - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_tone_bounded() {
        let tone = generate_tone(880.0, 880.0, 100, 44_100);
        assert!(tone.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!(tone.iter().any(|&s| s > 0.99));
    }

    #[test]
    fn test_retrigger_is_deterministic() {
        let a = generate_tone(523.0, 261.0, 50, 44_100);
        let b = generate_tone(523.0, 261.0, 50, 44_100);
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_frequencies_are_silent() {
        let tone = generate_tone(0.0, 0.0, 10, 44_100);
        assert!(tone.iter().all(|&s| s == 0.0));
    }
}
