//! Per-voice parameter model.
//!
//! [`VoiceConfig`] is a plain value type. The control path owns one copy per
//! voice and the transport clock owns another; the clock clones the voice at
//! trigger time, so a render in progress never observes a later mutation.
//!
//! Every setter clamps to the parameter's legal range instead of rejecting
//! the value.

use std::fmt;
use std::str::FromStr;

use crate::audio_engine::constants::{
    ADSR_TIME_MAX, ADSR_TIME_MIN, EQ_DEFAULT_GAIN, FREQ_MAX, FREQ_MIN, LEVEL_MAX, LEVEL_MIN,
    NUM_BANDS, STEP_COUNT, VOLUME_DB_FLOOR, VOLUME_DB_PER_UNIT,
};
use crate::audio_engine::envelope::Adsr;
use crate::audio_engine::errors::EngineError;

/// Addressable parameter of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceParam {
    Attack,
    Decay,
    Sustain,
    Release,
    Freq1,
    Freq2,
    Volume,
    Gain,
    LoopLength,
    Distortion,
    LeftGain,
    RightGain,
    /// Zero-based EQ band.
    EqBand(usize),
    Mute,
}

impl VoiceParam {
    /// Scalar parameters stored under `params` in a pattern document.
    pub const SCALARS: [VoiceParam; 10] = [
        VoiceParam::Attack,
        VoiceParam::Decay,
        VoiceParam::Sustain,
        VoiceParam::Release,
        VoiceParam::Freq1,
        VoiceParam::Freq2,
        VoiceParam::Volume,
        VoiceParam::Gain,
        VoiceParam::LoopLength,
        VoiceParam::Mute,
    ];

    /// Short control-surface label.
    pub fn label(self) -> String {
        match self {
            Self::Attack => "A".into(),
            Self::Decay => "D".into(),
            Self::Sustain => "S".into(),
            Self::Release => "R".into(),
            Self::Freq1 => "P1".into(),
            Self::Freq2 => "P2".into(),
            Self::Volume => "V".into(),
            Self::Gain => "G".into(),
            Self::LoopLength => "Loop".into(),
            Self::Distortion => "Dist".into(),
            Self::LeftGain => "Left".into(),
            Self::RightGain => "Right".into(),
            Self::EqBand(band) => format!("EQ{}", band + 1),
            Self::Mute => "Mute".into(),
        }
    }
}

impl fmt::Display for VoiceParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for VoiceParam {
    type Err = EngineError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let lower = name.trim().to_ascii_lowercase();
        let param = match lower.as_str() {
            "a" | "attack" => Self::Attack,
            "d" | "decay" => Self::Decay,
            "s" | "sustain" => Self::Sustain,
            "r" | "release" => Self::Release,
            "p1" | "freq1" => Self::Freq1,
            "p2" | "freq2" => Self::Freq2,
            "v" | "volume" => Self::Volume,
            "g" | "gain" => Self::Gain,
            "loop" | "loop_length" => Self::LoopLength,
            "dist" | "distortion" => Self::Distortion,
            "left" | "left_vol" => Self::LeftGain,
            "right" | "right_vol" => Self::RightGain,
            "mute" => Self::Mute,
            other => {
                let band = other
                    .strip_prefix("eq")
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|n| (1..=NUM_BANDS).contains(n))
                    .ok_or_else(|| EngineError::UnknownParameter(name.to_string()))?;
                Self::EqBand(band - 1)
            }
        };
        Ok(param)
    }
}

/// Complete parameter set of one voice.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    /// Voice index in the rack.
    pub id: usize,

    /// Oscillator 1 frequency in Hz.
    pub freq1: f32,

    /// Oscillator 2 frequency in Hz.
    pub freq2: f32,

    /// Overall volume (0.0 to 1.0).
    pub volume: f32,

    /// Overall gain (0.0 to 1.0).
    pub gain: f32,

    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,

    /// Linear gain per EQ band, lowest band first.
    pub eq: [f32; NUM_BANDS],

    /// Distortion amount (0.0 to 1.0).
    pub distortion: f32,

    pub left_gain: f32,
    pub right_gain: f32,

    /// Length of this voice's repeating cycle in steps.
    pub loop_length: usize,

    pub muted: bool,
}

impl VoiceConfig {
    /// Creates a voice with the rack's default settings.
    pub fn new(id: usize) -> Self {
        Self {
            id,
            freq1: 440.0,
            freq2: 440.0,
            volume: 0.5,
            gain: 0.5,
            attack: 0.1,
            decay: 0.1,
            sustain: 0.1,
            release: 0.5,
            eq: [EQ_DEFAULT_GAIN; NUM_BANDS],
            distortion: 0.0,
            left_gain: 0.5,
            right_gain: 0.5,
            loop_length: STEP_COUNT,
            muted: false,
        }
    }

    /// Sets a parameter, clamping it into its legal range.
    ///
    /// Returns the value actually stored.
    pub fn set(&mut self, param: VoiceParam, value: f32) -> Result<f32, EngineError> {
        if !value.is_finite() {
            return Err(EngineError::NonFiniteValue {
                name: param.label(),
            });
        }

        let unit = value.clamp(LEVEL_MIN, LEVEL_MAX);
        let stored = match param {
            VoiceParam::Attack => {
                self.attack = value.clamp(ADSR_TIME_MIN, ADSR_TIME_MAX);
                self.attack
            }
            VoiceParam::Decay => {
                self.decay = value.clamp(ADSR_TIME_MIN, ADSR_TIME_MAX);
                self.decay
            }
            VoiceParam::Release => {
                self.release = value.clamp(ADSR_TIME_MIN, ADSR_TIME_MAX);
                self.release
            }
            VoiceParam::Sustain => {
                self.sustain = unit;
                unit
            }
            VoiceParam::Freq1 => {
                self.freq1 = value.clamp(FREQ_MIN, FREQ_MAX);
                self.freq1
            }
            VoiceParam::Freq2 => {
                self.freq2 = value.clamp(FREQ_MIN, FREQ_MAX);
                self.freq2
            }
            VoiceParam::Volume => {
                self.volume = unit;
                unit
            }
            VoiceParam::Gain => {
                self.gain = unit;
                unit
            }
            VoiceParam::LoopLength => {
                self.loop_length = (value.round().max(1.0) as usize).min(STEP_COUNT);
                self.loop_length as f32
            }
            VoiceParam::Distortion => {
                self.distortion = unit;
                unit
            }
            VoiceParam::LeftGain => {
                self.left_gain = unit;
                unit
            }
            VoiceParam::RightGain => {
                self.right_gain = unit;
                unit
            }
            VoiceParam::EqBand(band) => {
                let slot = self
                    .eq
                    .get_mut(band)
                    .ok_or_else(|| EngineError::UnknownParameter(param.label()))?;
                *slot = unit;
                unit
            }
            VoiceParam::Mute => {
                self.muted = value != 0.0;
                if self.muted { 1.0 } else { 0.0 }
            }
        };

        Ok(stored)
    }

    /// Reads a parameter back as a number.
    pub fn get(&self, param: VoiceParam) -> Option<f32> {
        let value = match param {
            VoiceParam::Attack => self.attack,
            VoiceParam::Decay => self.decay,
            VoiceParam::Sustain => self.sustain,
            VoiceParam::Release => self.release,
            VoiceParam::Freq1 => self.freq1,
            VoiceParam::Freq2 => self.freq2,
            VoiceParam::Volume => self.volume,
            VoiceParam::Gain => self.gain,
            VoiceParam::LoopLength => self.loop_length as f32,
            VoiceParam::Distortion => self.distortion,
            VoiceParam::LeftGain => self.left_gain,
            VoiceParam::RightGain => self.right_gain,
            VoiceParam::EqBand(band) => *self.eq.get(band)?,
            VoiceParam::Mute => {
                if self.muted {
                    1.0
                } else {
                    0.0
                }
            }
        };
        Some(value)
    }

    /// Overall level in dB: -40 dB at `volume + gain == 0`, 0 dB at 2.
    pub fn volume_db(&self) -> f32 {
        VOLUME_DB_FLOOR + (self.volume + self.gain) * VOLUME_DB_PER_UNIT
    }

    /// Envelope settings of this voice.
    pub fn adsr(&self) -> Adsr {
        Adsr {
            attack: self.attack,
            decay: self.decay,
            sustain: self.sustain,
            release: self.release,
        }
    }
}
