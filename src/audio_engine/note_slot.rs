//! One sounding note inside the real-time player.

use cpal::Sample;

use crate::messages::RenderBuffer;

pub struct NoteSlot {
    pub active: bool,
    buffer: Option<RenderBuffer>,
    frame_pos: usize,
    level: f32,
}

impl Default for NoteSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteSlot {
    pub fn new() -> Self {
        Self {
            active: false,
            buffer: None,
            frame_pos: 0,
            level: 0.0,
        }
    }

    pub fn start(&mut self, buffer: RenderBuffer, level: f32) {
        self.active = true;
        self.buffer = Some(buffer);
        self.frame_pos = 0;
        self.level = level;
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.buffer = None;
        self.frame_pos = 0;
        self.level = 0.0;
    }

    /// Returns the next frame as level-scaled floats and advances.
    ///
    /// The slot stops itself after its last frame.
    pub fn next_frame(&mut self) -> Option<(f32, f32)> {
        if !self.active {
            return None;
        }

        let frame = self
            .buffer
            .as_ref()
            .and_then(|buffer| buffer.frame(self.frame_pos));
        let Some((left, right)) = frame else {
            self.stop();
            return None;
        };

        self.frame_pos += 1;
        Some((
            left.to_sample::<f32>() * self.level,
            right.to_sample::<f32>() * self.level,
        ))
    }
}
