//! Audio Engine Module
//!
//! This module provides the synthesizer rack: four step-sequenced voices, each
//! rendering a two-oscillator tone through an EQ, a distortion stage and an
//! ADSR envelope. It is organized into sub-modules, each with a specific
//! responsibility:
//!
//! - [`audio_stream`]: CPAL output stream and the sink handle feeding it
//! - [`config`]: Engine-wide configuration
//! - [`constants`]: Configuration constants and limits
//! - [`errors`]: Error types
//! - [`voice`]: Per-voice parameters
//! - [`step_grid`]: Per-voice step patterns
//! - [`session`]: Voices, grid and tempo as one editable value
//! - [`pattern`]: Saving and loading sessions as JSON
//! - [`tone`], [`spectral_eq`], [`distortion`], [`envelope`], [`mixer`]:
//!   The signal chain of one note
//! - [`render`]: Running the signal chain on render threads
//! - [`transport`]: The step clock
//! - [`playback`]: The sink trait rendered notes are handed to
//!
//! The main [`AudioEngine`] struct is the control surface tying these
//! components together.

use rtrb::{Producer, RingBuffer};
use serde_json::Value;
use std::path::Path;
use std::sync::{
    Arc, Mutex,
    mpsc::{self, Receiver},
};
use std::thread::JoinHandle;

use crate::audio_engine::audio_stream::setup_logger;
use crate::audio_engine::config::EngineConfig;
use crate::audio_engine::constants::{CONTROL_QUEUE_CAPACITY, NUM_VOICES, STEP_COUNT};
use crate::audio_engine::errors::{EngineError, PatternError};
use crate::audio_engine::pattern::LoadReport;
use crate::audio_engine::playback::PlaybackSink;
use crate::audio_engine::render::{RenderDispatcher, TriggerOrigin};
use crate::audio_engine::session::{Session, clamp_tempo};
use crate::audio_engine::transport::{ClockWorker, RunState};
use crate::audio_engine::voice::{VoiceConfig, VoiceParam};
use crate::messages::{ControlMessage, EngineEvent};

pub mod audio_stream;
pub mod config;
pub mod constants;
pub mod distortion;
pub mod envelope;
pub mod errors;
pub mod mixer;
pub mod pattern;
pub mod playback;
pub mod render;
pub mod session;
pub mod spectral_eq;
pub mod step_grid;
pub mod tone;
pub mod transport;
pub mod voice;

mod channels;
mod note_slot;
mod player;

/// Control surface of the rack.
///
/// All edits go to a local mirror of the session. While the transport runs,
/// each edit is also queued to the clock thread; if that queue is full the
/// edit fails with [`EngineError::ControlQueueFull`] and the mirror is left
/// unchanged, so both copies always agree.
pub struct AudioEngine {
    config: EngineConfig,
    session: Session,
    dispatcher: RenderDispatcher,
    control_tx: Option<Producer<ControlMessage>>,
    clock: Option<JoinHandle<()>>,
    run: u64,
    events_rx: Mutex<Receiver<EngineEvent>>,
}

impl AudioEngine {
    /// Creates an engine with the default configuration.
    pub fn new(sink: Arc<dyn PlaybackSink>) -> Result<Self, EngineError> {
        Self::with_config(sink, EngineConfig::default())
    }

    /// Creates an engine, probing `sink` once.
    ///
    /// Fails with [`EngineError::AudioDeviceUnavailable`] if the sink is not
    /// ready.
    pub fn with_config(
        sink: Arc<dyn PlaybackSink>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        setup_logger();

        sink.check_ready().map_err(|err| {
            log::error!("Playback sink not ready: {err}");
            EngineError::AudioDeviceUnavailable(err)
        })?;

        let (events_tx, events_rx) = mpsc::sync_channel(config.event_capacity.max(1));
        let dispatcher =
            RenderDispatcher::new(config, sink, Arc::new(RunState::default()), events_tx);

        log::info!(
            "Synth rack ready ({} voices, {} Hz, {} ms notes)",
            NUM_VOICES,
            config.sample_rate,
            config.note_duration_ms
        );

        Ok(Self {
            config,
            session: Session::new(),
            dispatcher,
            control_tx: None,
            clock: None,
            run: 0,
            events_rx: Mutex::new(events_rx),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The control path's view of voices, grid and tempo.
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn voice(&self, voice_id: usize) -> Result<&VoiceConfig, EngineError> {
        self.session.voice(voice_id)
    }

    pub fn tempo(&self) -> f32 {
        self.session.bpm()
    }

    pub fn is_running(&self) -> bool {
        self.dispatcher.run_state().is_running()
    }

    /// Identifier of the most recent transport run, `0` before the first
    /// start. [`EngineEvent::Stopped`] carries the run it belongs to.
    pub fn run_id(&self) -> u64 {
        self.run
    }

    /// Sets a voice parameter by name, e.g. `"P1"`, `"attack"` or `"EQ3"`.
    ///
    /// Returns the clamped value actually stored.
    pub fn set_parameter(
        &mut self,
        voice_id: usize,
        name: &str,
        value: f32,
    ) -> Result<f32, EngineError> {
        let param = name.parse::<VoiceParam>()?;
        self.set_voice_param(voice_id, param, value)
    }

    /// Sets a voice parameter. Returns the clamped value actually stored.
    pub fn set_voice_param(
        &mut self,
        voice_id: usize,
        param: VoiceParam,
        value: f32,
    ) -> Result<f32, EngineError> {
        let mut voice = self.session.voice(voice_id)?.clone();
        let stored = voice.set(param, value)?;

        self.send_control(ControlMessage::SetVoice(Box::new(voice.clone())))?;
        self.session.replace_voice(voice)?;
        Ok(stored)
    }

    /// Activates or deactivates one step of a voice's pattern.
    pub fn set_step(
        &mut self,
        voice_id: usize,
        step: usize,
        active: bool,
    ) -> Result<(), EngineError> {
        self.session.voice(voice_id)?;
        if step >= STEP_COUNT {
            return Err(EngineError::StepOutOfRange {
                step,
                steps: STEP_COUNT,
            });
        }

        self.send_control(ControlMessage::SetStep {
            voice_id,
            step,
            active,
        })?;
        self.session.set_step(voice_id, step, active)
    }

    /// Sets the tempo, clamped to 60..=240 BPM. A running clock picks it up
    /// from its next tick.
    pub fn set_tempo(&mut self, bpm: f32) -> Result<f32, EngineError> {
        if !bpm.is_finite() {
            return Err(EngineError::NonFiniteValue {
                name: "tempo".into(),
            });
        }

        let bpm = clamp_tempo(bpm);
        self.send_control(ControlMessage::SetTempo(bpm))?;
        self.session.set_tempo(bpm)
    }

    /// Starts the transport from global step 0. Does nothing if it is
    /// already running.
    pub fn start(&mut self) -> Result<(), EngineError> {
        let clock_alive = self.clock.as_ref().is_some_and(|clock| !clock.is_finished());
        if self.is_running() && clock_alive {
            return Ok(());
        }

        let (producer, consumer) = RingBuffer::new(CONTROL_QUEUE_CAPACITY);
        let generation = self.dispatcher.run_state().begin();
        let worker = ClockWorker::new(
            self.session.clone(),
            consumer,
            self.dispatcher.clone(),
            generation,
        );

        match worker.spawn() {
            Ok(clock) => {
                self.control_tx = Some(producer);
                self.clock = Some(clock);
                self.run = generation;
                Ok(())
            }
            Err(err) => {
                self.dispatcher.run_state().end();
                log::error!("Failed to start transport clock: {err}");
                Err(EngineError::ClockSpawn(err))
            }
        }
    }

    /// Stops the transport without waiting for it.
    ///
    /// The clock exits within one tick. Renders already in flight finish,
    /// but their notes are discarded instead of played.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }

        log::info!("Stopping transport");
        self.dispatcher.run_state().end();
        self.control_tx = None;
        self.clock = None;
    }

    /// Renders and plays one note of `voice_id` right away, independent of
    /// the transport.
    ///
    /// Returns `false` if the voice is still rendering its previous note.
    pub fn trigger(&self, voice_id: usize) -> Result<bool, EngineError> {
        let voice = self.session.voice(voice_id)?.clone();
        Ok(self.dispatcher.dispatch(voice, TriggerOrigin::Manual))
    }

    /// Writes the complete session to `path` as JSON.
    pub fn save_pattern(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        pattern::save(&self.session, path.as_ref())?;
        Ok(())
    }

    /// Loads a pattern file, keeping current values for any field that is
    /// missing or malformed.
    pub fn load_pattern(&mut self, path: impl AsRef<Path>) -> Result<LoadReport, EngineError> {
        let path = path.as_ref();
        let document = pattern::read(path)?;
        let report = self.apply_pattern(&document)?;
        log::info!(
            "Loaded pattern from {} ({} fields skipped)",
            path.display(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Loads a pattern from a JSON string.
    pub fn load_pattern_str(&mut self, json: &str) -> Result<LoadReport, EngineError> {
        let document: Value = serde_json::from_str(json).map_err(PatternError::from)?;
        self.apply_pattern(&document)
    }

    fn apply_pattern(&mut self, document: &Value) -> Result<LoadReport, EngineError> {
        let mut session = self.session.clone();
        let report = pattern::apply(&mut session, document);

        self.send_control(ControlMessage::ReplaceSession(Box::new(session.clone())))?;
        self.session = session;
        Ok(report)
    }

    /// Next pending diagnostic event, if any.
    ///
    /// At most [`EngineConfig::event_capacity`] events are held; later ones
    /// are dropped until this is called.
    pub fn poll_event(&self) -> Option<EngineEvent> {
        self.events_rx.lock().ok()?.try_recv().ok()
    }

    /// Total number of diagnostic events dropped because nobody polled.
    pub fn dropped_event_count(&self) -> u64 {
        self.dispatcher.dropped_event_count()
    }

    /// Total number of triggers dropped because a voice was still rendering.
    pub fn overrun_count(&self) -> u64 {
        self.dispatcher.overrun_count()
    }

    fn send_control(&mut self, message: ControlMessage) -> Result<(), EngineError> {
        if !self.is_running() {
            return Ok(());
        }

        let Some(producer) = self.control_tx.as_mut() else {
            return Ok(());
        };

        producer.push(message).map_err(|_| {
            log::warn!("Control queue full, change not applied");
            EngineError::ControlQueueFull
        })
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
