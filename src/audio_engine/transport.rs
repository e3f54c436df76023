//! Transport clock.
//!
//! The clock ticks on a sixteenth-note grid (`60 / bpm / 4` seconds). Every
//! tick advances a global step counter, whether or not anything plays. Each
//! unmuted voice looks up `global_step % loop_length` in its row of the step
//! grid and triggers when the cell is set, so voices with different loop
//! lengths drift against each other and a voice unmuted mid-pattern comes
//! back in phase.
//!
//! [`TransportState::tick`] holds that logic as a pure function; the
//! [`ClockWorker`] thread drives it in real time.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rtrb::Consumer;

use crate::audio_engine::constants::{BPM_DEFAULT, STEP_COUNT, TICKS_PER_BEAT};
use crate::audio_engine::render::{RenderDispatcher, TriggerOrigin};
use crate::audio_engine::session::{Session, clamp_tempo};
use crate::audio_engine::step_grid::StepGrid;
use crate::audio_engine::voice::VoiceConfig;
use crate::messages::{ControlMessage, EngineEvent};

/// Duration of one tick at `bpm`.
pub fn tick_interval(bpm: f32) -> Duration {
    let bpm = if bpm.is_finite() { bpm } else { BPM_DEFAULT };
    Duration::from_secs_f64(60.0 / clamp_tempo(bpm) as f64 / TICKS_PER_BEAT)
}

/// Position of `global_step` within a loop of `loop_length` steps.
pub fn step_index(global_step: u64, loop_length: usize) -> usize {
    (global_step % loop_length.max(1) as u64) as usize
}

/// A voice that fired on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub voice_id: usize,
    pub global_step: u64,
    pub step_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportState {
    pub running: bool,
    pub bpm: f32,
    /// Ticks elapsed since the transport last started.
    pub global_step: u64,
}

impl TransportState {
    pub fn new(bpm: f32) -> Self {
        Self {
            running: false,
            bpm: clamp_tempo(bpm),
            global_step: 0,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        tick_interval(self.bpm)
    }

    /// Evaluates the current step for every voice, then advances the
    /// global step.
    pub fn tick(&mut self, voices: &[VoiceConfig], grid: &StepGrid) -> Vec<Trigger> {
        let global_step = self.global_step;
        let triggers = voices
            .iter()
            .filter(|voice| !voice.muted)
            .filter_map(|voice| {
                let index = step_index(global_step, voice.loop_length);
                (index < STEP_COUNT && grid.is_active(voice.id, index)).then_some(Trigger {
                    voice_id: voice.id,
                    global_step,
                    step_index: index,
                })
            })
            .collect();

        self.global_step += 1;
        triggers
    }
}

/// Start/stop state shared between the control path, the clock worker and
/// render tasks.
///
/// Every start opens a new generation. A worker or render task that belongs
/// to an older generation is stale and winds down on its own.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    generation: AtomicU64,
    running: AtomicBool,
}

impl RunState {
    /// Marks the transport running and returns the new generation.
    pub fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.running.store(true, Ordering::SeqCst);
        generation
    }

    /// Marks the transport stopped. Workers observe this within one tick.
    pub fn end(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether `generation` is still the live run.
    pub fn is_current(&self, generation: u64) -> bool {
        self.is_running() && self.generation.load(Ordering::SeqCst) == generation
    }
}

/// The timing thread. Owns its own copy of the session, updated through the
/// control queue.
pub(crate) struct ClockWorker {
    session: Session,
    transport: TransportState,
    control: Consumer<ControlMessage>,
    dispatcher: RenderDispatcher,
    generation: u64,
}

impl ClockWorker {
    pub fn new(
        session: Session,
        control: Consumer<ControlMessage>,
        dispatcher: RenderDispatcher,
        generation: u64,
    ) -> Self {
        let transport = TransportState::new(session.bpm());
        Self {
            session,
            transport,
            control,
            dispatcher,
            generation,
        }
    }

    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("transport-clock".into())
            .spawn(move || self.run())
    }

    fn is_current(&self) -> bool {
        self.dispatcher.run_state().is_current(self.generation)
    }

    fn run(mut self) {
        self.transport.running = self.is_current();
        log::info!("Transport started at {} BPM", self.transport.bpm);

        let mut next_tick = Instant::now();
        while self.transport.running {
            self.drain_control();
            self.fire_tick();
            if !self.transport.running {
                break;
            }

            next_tick += self.transport.tick_interval();
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else {
                log::warn!(
                    "Transport clock fell behind by {:?} at step {}",
                    now - next_tick,
                    self.transport.global_step
                );
                next_tick = now;
            }

            self.transport.running = self.is_current();
        }

        log::info!("Transport stopped at step {}", self.transport.global_step);
        self.dispatcher.notify(EngineEvent::Stopped {
            run: self.generation,
            global_step: self.transport.global_step,
        });
    }

    fn fire_tick(&mut self) {
        if !self.is_current() {
            self.transport.running = false;
            return;
        }

        let triggers = self.transport.tick(self.session.voices(), self.session.grid());
        for trigger in triggers {
            let Ok(voice) = self.session.voice(trigger.voice_id) else {
                continue;
            };

            log::debug!(
                "Step {} (index {}): triggering voice {}",
                trigger.global_step,
                trigger.step_index,
                trigger.voice_id
            );
            self.dispatcher.notify(EngineEvent::Triggered {
                voice_id: trigger.voice_id,
                global_step: trigger.global_step,
            });
            self.dispatcher.dispatch(
                voice.clone(),
                TriggerOrigin::Clock {
                    generation: self.generation,
                    global_step: trigger.global_step,
                },
            );
        }
    }

    fn drain_control(&mut self) {
        while let Ok(message) = self.control.pop() {
            match message {
                ControlMessage::SetVoice(voice) => {
                    if let Err(err) = self.session.replace_voice(*voice) {
                        log::warn!("Clock ignored voice update: {err}");
                    }
                }
                ControlMessage::SetStep {
                    voice_id,
                    step,
                    active,
                } => {
                    if let Err(err) = self.session.set_step(voice_id, step, active) {
                        log::warn!("Clock ignored step update: {err}");
                    }
                }
                ControlMessage::SetTempo(bpm) => {
                    self.transport.bpm = clamp_tempo(bpm);
                }
                ControlMessage::ReplaceSession(session) => {
                    self.transport.bpm = session.bpm();
                    self.session = *session;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_engine::constants::NUM_VOICES;

    fn voices() -> Vec<VoiceConfig> {
        (0..NUM_VOICES).map(VoiceConfig::new).collect()
    }

    fn steps_fired(triggers: &[Trigger], voice_id: usize) -> Vec<u64> {
        triggers
            .iter()
            .filter(|t| t.voice_id == voice_id)
            .map(|t| t.global_step)
            .collect()
    }

    #[test]
    fn test_tick_interval() {
        assert_eq!(tick_interval(120.0), Duration::from_millis(125));
        assert_eq!(tick_interval(60.0), Duration::from_millis(250));
        assert_eq!(tick_interval(240.0), Duration::from_micros(62_500));

        for bpm in [60.0, 90.0, 133.0, 200.0, 240.0] {
            let expected = 60.0 / bpm as f64 / 4.0;
            assert!((tick_interval(bpm).as_secs_f64() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_tick_interval_clamps() {
        assert_eq!(tick_interval(10.0), Duration::from_millis(250));
        assert_eq!(tick_interval(1000.0), Duration::from_micros(62_500));
        assert_eq!(tick_interval(f32::NAN), Duration::from_millis(125));
    }

    #[test]
    fn test_step_index_in_range() {
        for loop_length in 1..=STEP_COUNT {
            for global_step in 0..200u64 {
                assert!(step_index(global_step, loop_length) < loop_length);
            }
        }
        assert_eq!(step_index(5, 4), 1);
        assert_eq!(step_index(7, 0), 0);
    }

    #[test]
    fn test_alternating_pattern() {
        let mut voices = voices();
        voices[0].loop_length = 4;
        let mut grid = StepGrid::new();
        grid.set(0, 0, true);
        grid.set(0, 2, true);

        let mut transport = TransportState::new(120.0);
        let mut fired = Vec::new();
        for _ in 0..8 {
            fired.extend(transport.tick(&voices, &grid));
        }

        assert_eq!(steps_fired(&fired, 0), vec![0, 2, 4, 6]);
        assert_eq!(transport.global_step, 8);
    }

    #[test]
    fn test_muted_voice_keeps_phase() {
        let mut voices = voices();
        voices[1].loop_length = 4;
        voices[1].muted = true;
        let mut grid = StepGrid::new();
        grid.set(1, 1, true);

        let mut transport = TransportState::new(120.0);
        let mut fired = Vec::new();
        for _ in 0..5 {
            fired.extend(transport.tick(&voices, &grid));
        }
        assert!(fired.is_empty());
        assert_eq!(transport.global_step, 5);

        voices[1].muted = false;
        for _ in 0..8 {
            fired.extend(transport.tick(&voices, &grid));
        }

        assert_eq!(steps_fired(&fired, 1), vec![5, 9]);
        assert!(fired.iter().all(|t| t.step_index == 1));
    }

    #[test]
    fn test_independent_loop_lengths() {
        let mut voices = voices();
        voices[0].loop_length = 3;
        voices[2].loop_length = 5;
        let mut grid = StepGrid::new();
        grid.set(0, 0, true);
        grid.set(2, 0, true);

        let mut transport = TransportState::new(120.0);
        let mut fired = Vec::new();
        for _ in 0..15 {
            fired.extend(transport.tick(&voices, &grid));
        }

        assert_eq!(steps_fired(&fired, 0), vec![0, 3, 6, 9, 12]);
        assert_eq!(steps_fired(&fired, 2), vec![0, 5, 10]);
        assert!(steps_fired(&fired, 1).is_empty());
    }

    #[test]
    fn test_index_past_grid_is_silent() {
        let mut voices = voices();
        voices[0].loop_length = STEP_COUNT + 8;
        let mut grid = StepGrid::new();
        for step in 0..STEP_COUNT {
            grid.set(0, step, true);
        }

        let mut transport = TransportState::new(120.0);
        let mut fired = Vec::new();
        for _ in 0..(STEP_COUNT + 8) {
            fired.extend(transport.tick(&voices, &grid));
        }

        assert_eq!(fired.len(), STEP_COUNT);
        assert!(fired.iter().all(|t| t.step_index < STEP_COUNT));
    }

    #[test]
    fn test_run_state_generations() {
        let state = RunState::default();
        assert!(!state.is_running());

        let first = state.begin();
        assert!(state.is_current(first));

        state.end();
        assert!(!state.is_running());
        assert!(!state.is_current(first));

        let second = state.begin();
        assert!(state.is_current(second));
        assert!(!state.is_current(first));
    }
}
