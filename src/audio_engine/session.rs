//! Editable rack state: every voice's parameters, the step grid and the
//! tempo.
//!
//! The control path keeps one [`Session`] as its mirror and hands a clone to
//! the transport clock on start. All validation lives here, so both copies
//! apply identical clamping.

use crate::audio_engine::constants::{BPM_DEFAULT, BPM_MAX, BPM_MIN, NUM_VOICES, STEP_COUNT};
use crate::audio_engine::errors::EngineError;
use crate::audio_engine::step_grid::StepGrid;
use crate::audio_engine::voice::{VoiceConfig, VoiceParam};

/// Clamps a tempo to the legal BPM range.
pub fn clamp_tempo(bpm: f32) -> f32 {
    bpm.clamp(BPM_MIN, BPM_MAX)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    voices: Vec<VoiceConfig>,
    grid: StepGrid,
    bpm: f32,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates a rack of [`NUM_VOICES`] default voices, an empty grid and
    /// the default tempo.
    pub fn new() -> Self {
        Self {
            voices: (0..NUM_VOICES).map(VoiceConfig::new).collect(),
            grid: StepGrid::new(),
            bpm: BPM_DEFAULT,
        }
    }

    pub fn voices(&self) -> &[VoiceConfig] {
        &self.voices
    }

    pub fn grid(&self) -> &StepGrid {
        &self.grid
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// Looks up a voice by index.
    pub fn voice(&self, voice_id: usize) -> Result<&VoiceConfig, EngineError> {
        self.voices.get(voice_id).ok_or(EngineError::UnknownVoice {
            voice_id,
            voices: NUM_VOICES,
        })
    }

    fn voice_mut(&mut self, voice_id: usize) -> Result<&mut VoiceConfig, EngineError> {
        self.voices.get_mut(voice_id).ok_or(EngineError::UnknownVoice {
            voice_id,
            voices: NUM_VOICES,
        })
    }

    /// Sets one voice parameter and returns the clamped value stored.
    pub fn set_parameter(
        &mut self,
        voice_id: usize,
        param: VoiceParam,
        value: f32,
    ) -> Result<f32, EngineError> {
        self.voice_mut(voice_id)?.set(param, value)
    }

    /// Replaces the voice in slot `voice.id` wholesale.
    pub fn replace_voice(&mut self, voice: VoiceConfig) -> Result<(), EngineError> {
        let voice_id = voice.id;
        *self.voice_mut(voice_id)? = voice;
        Ok(())
    }

    /// Activates or deactivates one step.
    pub fn set_step(
        &mut self,
        voice_id: usize,
        step: usize,
        active: bool,
    ) -> Result<(), EngineError> {
        self.voice(voice_id)?;
        if !self.grid.set(voice_id, step, active) {
            return Err(EngineError::StepOutOfRange {
                step,
                steps: STEP_COUNT,
            });
        }
        Ok(())
    }

    /// Sets the tempo, clamped to 60..=240 BPM. Returns the stored value.
    pub fn set_tempo(&mut self, bpm: f32) -> Result<f32, EngineError> {
        if !bpm.is_finite() {
            return Err(EngineError::NonFiniteValue {
                name: "tempo".into(),
            });
        }
        self.bpm = clamp_tempo(bpm);
        Ok(self.bpm)
    }
}
