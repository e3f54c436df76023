//! Real-time note player.
//!
//! This module provides the [`RtPlayer`] struct which runs inside the audio
//! stream callback. It sums up to [`MAX_PLAYING`] rendered notes at once,
//! each at its own playback level, and maps the stereo result onto the
//! device's channel layout.

use cpal::Sample;

use crate::audio_engine::channels::mix_stereo_into;
use crate::audio_engine::constants::{LEVEL_MAX, LEVEL_MIN, MAX_PLAYING};
use crate::audio_engine::note_slot::NoteSlot;
use crate::messages::{PlaybackCommand, RenderBuffer};

pub struct RtPlayer {
    /// Number of output channels.
    channels: usize,
    slots: [NoteSlot; MAX_PLAYING],
}

impl RtPlayer {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            slots: std::array::from_fn(|_| NoteSlot::new()),
        }
    }

    pub fn handle(&mut self, command: PlaybackCommand) {
        match command {
            PlaybackCommand::Play { buffer, level } => {
                self.play(buffer, level);
            }
            PlaybackCommand::StopAll() => self.stop_all(),
        }
    }

    /// Starts a note in the first free slot.
    ///
    /// Returns `false` and drops the note when every slot is busy or the
    /// note is empty.
    pub fn play(&mut self, buffer: RenderBuffer, level: f32) -> bool {
        if buffer.frames() == 0 {
            return false;
        }

        let level = if level.is_finite() {
            level.clamp(LEVEL_MIN, LEVEL_MAX)
        } else {
            LEVEL_MIN
        };

        match self.slots.iter_mut().find(|slot| !slot.active) {
            Some(slot) => {
                slot.start(buffer, level);
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self) {
        for slot in &mut self.slots {
            slot.stop();
        }
    }

    /// Number of notes currently sounding.
    #[cfg(test)]
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.active).count()
    }

    /// Fills one interleaved output block.
    pub fn render(&mut self, output: &mut [f32]) {
        output.fill(Sample::EQUILIBRIUM);

        if self.channels == 0 {
            return;
        }

        for frame in output.chunks_exact_mut(self.channels) {
            for slot in &mut self.slots {
                if let Some((left, right)) = slot.next_frame() {
                    mix_stereo_into(frame, left, right);
                }
            }
        }

        for sample in output.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}
