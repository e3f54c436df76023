//! Per-voice step pattern.

use crate::audio_engine::constants::{NUM_VOICES, STEP_COUNT};

/// One row of [`STEP_COUNT`] sixteenth-note slots per voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepGrid {
    rows: [[bool; STEP_COUNT]; NUM_VOICES],
}

impl Default for StepGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl StepGrid {
    /// Creates a grid with every step inactive.
    pub fn new() -> Self {
        Self {
            rows: [[false; STEP_COUNT]; NUM_VOICES],
        }
    }

    /// Returns whether the step is active.
    ///
    /// Out-of-range voices or steps read as inactive.
    pub fn is_active(&self, voice_id: usize, step: usize) -> bool {
        self.rows
            .get(voice_id)
            .and_then(|row| row.get(step))
            .copied()
            .unwrap_or(false)
    }

    /// Sets a step. Returns `false` if the cell does not exist.
    pub fn set(&mut self, voice_id: usize, step: usize, active: bool) -> bool {
        match self.rows.get_mut(voice_id).and_then(|row| row.get_mut(step)) {
            Some(cell) => {
                *cell = active;
                true
            }
            None => false,
        }
    }

    /// The full row of a voice.
    pub fn row(&self, voice_id: usize) -> Option<&[bool; STEP_COUNT]> {
        self.rows.get(voice_id)
    }
}
