//! Message definitions for communication between the control path, the
//! transport clock, render tasks and the audio stream.
//!
//! This module defines the types that serve as the wire format for messages
//! passed through the queues between those threads.

use std::sync::Arc;

use crate::audio_engine::session::Session;
use crate::audio_engine::voice::VoiceConfig;

/// Interleaved 16-bit stereo PCM produced for one trigger.
///
/// The samples are shared and immutable once the mixer has produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderBuffer {
    samples: Arc<[i16]>,
}

impl RenderBuffer {
    /// Number of interleaved channels.
    pub const CHANNELS: usize = 2;

    /// Wraps interleaved left/right samples.
    ///
    /// A trailing unpaired sample is dropped.
    pub fn from_interleaved(mut samples: Vec<i16>) -> Self {
        samples.truncate(samples.len() - samples.len() % Self::CHANNELS);
        Self {
            samples: Arc::from(samples.into_boxed_slice()),
        }
    }

    /// Interleaved samples, left first.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Number of stereo frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / Self::CHANNELS
    }

    /// Left and right sample of one frame.
    pub fn frame(&self, index: usize) -> Option<(i16, i16)> {
        let base = index.checked_mul(Self::CHANNELS)?;
        Some((*self.samples.get(base)?, *self.samples.get(base + 1)?))
    }

    /// Left channel samples.
    pub fn left(&self) -> impl Iterator<Item = i16> + '_ {
        self.samples.iter().step_by(Self::CHANNELS).copied()
    }

    /// Right channel samples.
    pub fn right(&self) -> impl Iterator<Item = i16> + '_ {
        self.samples.iter().skip(1).step_by(Self::CHANNELS).copied()
    }
}

/// Message that is emitted from the control path to the transport clock.
#[derive(Debug, Clone)]
pub enum ControlMessage {
    /// Replace one voice's parameters.
    SetVoice(Box<VoiceConfig>),

    /// Toggle one step of a voice's row.
    SetStep {
        voice_id: usize,
        step: usize,
        active: bool,
    },

    /// Set the tempo in BPM, already clamped to the legal range.
    SetTempo(f32),

    /// Replace every voice, the step grid and the tempo.
    ReplaceSession(Box<Session>),
}

/// Message that is emitted from render tasks to the audio stream callback.
#[derive(Debug, Clone)]
pub enum PlaybackCommand {
    /// Start playing a rendered note at the given linear level.
    Play { buffer: RenderBuffer, level: f32 },

    /// Silence everything currently sounding.
    StopAll(),
}

/// Diagnostics emitted from the clock worker and render tasks.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A voice was triggered and handed to a render task.
    Triggered { voice_id: usize, global_step: u64 },

    /// A trigger was dropped because the voice's previous render was still
    /// in flight.
    RenderOverrun {
        voice_id: usize,
        global_step: Option<u64>,
    },

    /// Rendering or handing off a note failed.
    RenderFailed { voice_id: usize, error: String },

    /// A render finished after the transport stopped and was not played.
    RenderDiscarded { voice_id: usize },

    /// The clock worker of transport run `run` exited.
    Stopped { run: u64, global_step: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_buffer_frames() {
        let buffer = RenderBuffer::from_interleaved(vec![1, -1, 2, -2, 3, -3]);

        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.frame(1), Some((2, -2)));
        assert_eq!(buffer.frame(3), None);
        assert_eq!(buffer.left().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(buffer.right().collect::<Vec<_>>(), vec![-1, -2, -3]);
    }

    #[test]
    fn test_render_buffer_drops_unpaired_sample() {
        let buffer = RenderBuffer::from_interleaved(vec![5, 6, 7]);
        assert_eq!(buffer.samples(), &[5, 6]);
    }

    #[test]
    fn test_render_buffer_clone_shares_samples() {
        let buffer = RenderBuffer::from_interleaved(vec![0; 8]);
        let copy = buffer.clone();
        assert!(std::ptr::eq(buffer.samples(), copy.samples()));
    }
}
