//! Note rendering and render-task dispatch.
//!
//! [`render_note`] runs the full signal chain for one trigger:
//! tone → EQ → distortion → envelope → stereo quantizer.
//!
//! [`RenderDispatcher`] runs each render on its own short-lived thread so the
//! transport clock never waits on signal processing. Each voice has a
//! single-flight flag: a trigger that arrives while the voice's previous
//! render is still running is dropped and reported as an overrun, which keeps
//! a voice's notes in trigger order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::thread;

use crate::audio_engine::config::EngineConfig;
use crate::audio_engine::constants::NUM_VOICES;
use crate::audio_engine::distortion::apply_distortion;
use crate::audio_engine::envelope::{apply_envelope, build_envelope};
use crate::audio_engine::errors::RenderError;
use crate::audio_engine::mixer::{MixedNote, mix_to_stereo};
use crate::audio_engine::playback::PlaybackSink;
use crate::audio_engine::spectral_eq::apply_eq;
use crate::audio_engine::tone::generate_tone;
use crate::audio_engine::transport::RunState;
use crate::audio_engine::voice::VoiceConfig;
use crate::messages::EngineEvent;

fn ensure_finite(samples: &[f32], stage: &'static str) -> Result<(), RenderError> {
    if samples.iter().all(|s| s.is_finite()) {
        Ok(())
    } else {
        Err(RenderError::NonFinite { stage })
    }
}

/// Renders one note of `voice` into a quantized stereo buffer.
pub fn render_note(voice: &VoiceConfig, config: &EngineConfig) -> Result<MixedNote, RenderError> {
    let tone = generate_tone(
        voice.freq1,
        voice.freq2,
        config.note_duration_ms,
        config.sample_rate,
    );
    if tone.is_empty() {
        return Err(RenderError::EmptyNote {
            duration_ms: config.note_duration_ms,
        });
    }
    ensure_finite(&tone, "tone")?;

    let mut samples = apply_eq(&tone, &voice.eq);
    ensure_finite(&samples, "equalizer")?;

    apply_distortion(&mut samples, voice.distortion);

    let envelope = build_envelope(
        samples.len(),
        &voice.adsr(),
        config.envelope,
        config.sample_rate,
    );
    apply_envelope(&mut samples, &envelope);
    ensure_finite(&samples, "envelope")?;

    Ok(mix_to_stereo(
        &samples,
        voice.left_gain,
        voice.right_gain,
        voice.volume_db(),
        config.gain_staging,
    ))
}

/// Where a trigger came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TriggerOrigin {
    /// Issued by the clock worker of run `generation` at `global_step`.
    Clock { generation: u64, global_step: u64 },
    /// Issued directly from the control path.
    Manual,
}

impl TriggerOrigin {
    fn global_step(self) -> Option<u64> {
        match self {
            Self::Clock { global_step, .. } => Some(global_step),
            Self::Manual => None,
        }
    }
}

/// Clears a voice's in-flight flag when dropped, including on panic.
struct InFlightGuard {
    flags: Arc<[AtomicBool]>,
    voice_id: usize,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(flag) = self.flags.get(self.voice_id) {
            flag.store(false, Ordering::Release);
        }
    }
}

/// Spawns render tasks and routes their results to the sink.
#[derive(Clone)]
pub(crate) struct RenderDispatcher {
    config: EngineConfig,
    sink: Arc<dyn PlaybackSink>,
    run_state: Arc<RunState>,
    in_flight: Arc<[AtomicBool]>,
    overruns: Arc<AtomicU64>,
    dropped_events: Arc<AtomicU64>,
    events: SyncSender<EngineEvent>,
}

impl RenderDispatcher {
    pub fn new(
        config: EngineConfig,
        sink: Arc<dyn PlaybackSink>,
        run_state: Arc<RunState>,
        events: SyncSender<EngineEvent>,
    ) -> Self {
        Self {
            config,
            sink,
            run_state,
            in_flight: (0..NUM_VOICES).map(|_| AtomicBool::new(false)).collect(),
            overruns: Arc::new(AtomicU64::new(0)),
            dropped_events: Arc::new(AtomicU64::new(0)),
            events,
        }
    }

    pub fn run_state(&self) -> &Arc<RunState> {
        &self.run_state
    }

    /// Total number of triggers dropped because a render was still running.
    pub fn overrun_count(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Total number of diagnostic events lost to a full queue.
    pub fn dropped_event_count(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Emits a diagnostic event without blocking.
    ///
    /// A full queue drops the event; a closed receiver is ignored.
    pub fn notify(&self, event: EngineEvent) {
        if let Err(TrySendError::Full(_)) = self.events.try_send(event) {
            // Warn once; later losses are only counted.
            if self.dropped_events.fetch_add(1, Ordering::Relaxed) == 0 {
                log::warn!("Event queue full, dropping diagnostics until polled");
            }
        }
    }

    /// Starts rendering `voice` on a new thread.
    ///
    /// Returns `false` if the trigger was dropped. Clock triggers from a run
    /// that has already ended are dropped without claiming the voice.
    pub fn dispatch(&self, voice: VoiceConfig, origin: TriggerOrigin) -> bool {
        let voice_id = voice.id;
        let Some(flag) = self.in_flight.get(voice_id) else {
            return false;
        };

        if let TriggerOrigin::Clock { generation, .. } = origin
            && !self.run_state.is_current(generation)
        {
            log::debug!("Voice {voice_id}: trigger from a stopped run ignored");
            return false;
        }

        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let total = self.overruns.fetch_add(1, Ordering::Relaxed) + 1;
            log::warn!(
                "Voice {voice_id}: previous render still running, trigger dropped ({total} overruns)"
            );
            self.notify(EngineEvent::RenderOverrun {
                voice_id,
                global_step: origin.global_step(),
            });
            return false;
        }

        let guard = InFlightGuard {
            flags: Arc::clone(&self.in_flight),
            voice_id,
        };
        let task = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("render-voice-{voice_id}"))
            .spawn(move || {
                let _guard = guard;
                task.render_and_play(&voice, origin);
            });

        // On failure the closure, and with it the guard, has been dropped.
        if let Err(err) = spawned {
            log::error!("Voice {voice_id}: failed to spawn render thread: {err}");
            self.notify(EngineEvent::RenderFailed {
                voice_id,
                error: err.to_string(),
            });
            return false;
        }

        true
    }

    fn render_and_play(&self, voice: &VoiceConfig, origin: TriggerOrigin) {
        let voice_id = voice.id;
        let note = match render_note(voice, &self.config) {
            Ok(note) => note,
            Err(err) => {
                log::error!("Voice {voice_id}: render failed: {err}");
                self.notify(EngineEvent::RenderFailed {
                    voice_id,
                    error: err.to_string(),
                });
                return;
            }
        };

        if let TriggerOrigin::Clock { generation, .. } = origin
            && !self.run_state.is_current(generation)
        {
            log::debug!("Voice {voice_id}: transport stopped, discarding rendered note");
            self.notify(EngineEvent::RenderDiscarded { voice_id });
            return;
        }

        if let Err(err) = self.sink.play(note.buffer, note.level) {
            log::error!("Voice {voice_id}: playback sink rejected note: {err}");
            self.notify(EngineEvent::RenderFailed {
                voice_id,
                error: err.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver};
    use std::time::{Duration, Instant};

    use super::*;
    use crate::audio_engine::config::GainStaging;
    use crate::audio_engine::playback::testing::RecordingSink;

    fn short_config() -> EngineConfig {
        EngineConfig {
            note_duration_ms: 20,
            ..EngineConfig::default()
        }
    }

    fn make_dispatcher(
        sink: Arc<RecordingSink>,
        config: EngineConfig,
    ) -> (RenderDispatcher, Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::sync_channel(config.event_capacity);
        let run_state = Arc::new(RunState::default());
        (RenderDispatcher::new(config, sink, run_state, tx), rx)
    }

    fn wait_for_event(rx: &Receiver<EngineEvent>) -> Option<EngineEvent> {
        rx.recv_timeout(Duration::from_secs(5)).ok()
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn test_render_note_length() {
        let note = render_note(&VoiceConfig::new(0), &EngineConfig::default()).unwrap();
        assert_eq!(note.buffer.frames(), 22_050);
    }

    #[test]
    fn test_render_note_default_level() {
        let note = render_note(&VoiceConfig::new(0), &EngineConfig::default()).unwrap();
        // volume 0.5 + gain 0.5 -> -20 dB
        assert!((note.level - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_render_note_empty() {
        let config = EngineConfig {
            note_duration_ms: 0,
            ..EngineConfig::default()
        };
        assert_eq!(
            render_note(&VoiceConfig::new(0), &config),
            Err(RenderError::EmptyNote { duration_ms: 0 })
        );
    }

    #[test]
    fn test_render_note_silent_edges() {
        let note = render_note(&VoiceConfig::new(1), &EngineConfig::default()).unwrap();
        assert_eq!(note.buffer.frame(0), Some((0, 0)));
        let last = note.buffer.frames() - 1;
        assert_eq!(note.buffer.frame(last), Some((0, 0)));
    }

    #[test]
    fn test_render_note_bounded_at_full_drive() {
        let mut voice = VoiceConfig::new(0);
        voice.distortion = 1.0;
        voice.eq = [1.0; 6];
        voice.sustain = 1.0;
        voice.left_gain = 1.0;
        voice.right_gain = 1.0;

        for staging in [GainStaging::SinkLevel, GainStaging::PreQuantize] {
            let config = EngineConfig {
                gain_staging: staging,
                ..EngineConfig::default()
            };
            let note = render_note(&voice, &config).unwrap();

            let peak = note
                .buffer
                .samples()
                .iter()
                .map(|s| (*s as i32).abs())
                .max()
                .unwrap();
            assert!(peak <= i16::MAX as i32);
            assert!((0.0..=1.0).contains(&note.level));
        }
    }

    #[test]
    fn test_render_note_pan() {
        let mut voice = VoiceConfig::new(0);
        voice.left_gain = 1.0;
        voice.right_gain = 0.0;

        let note = render_note(&voice, &EngineConfig::default()).unwrap();

        assert!(note.buffer.left().any(|s| s != 0));
        assert!(note.buffer.right().all(|s| s == 0));
    }

    #[test]
    fn test_dispatch_plays_note() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, _rx) = make_dispatcher(sink.clone(), short_config());

        assert!(dispatcher.dispatch(VoiceConfig::new(2), TriggerOrigin::Manual));
        assert!(wait_until(|| sink.played_count() == 1));

        let played = sink.played.lock().unwrap();
        assert_eq!(played[0].0.frames(), 882);
    }

    #[test]
    fn test_dispatch_overrun_drops_trigger() {
        let sink = Arc::new(RecordingSink::default());
        *sink.play_delay.lock().unwrap() = Duration::from_millis(300);
        let (dispatcher, rx) = make_dispatcher(sink.clone(), short_config());

        assert!(dispatcher.dispatch(VoiceConfig::new(0), TriggerOrigin::Manual));
        let origin = TriggerOrigin::Clock {
            generation: dispatcher.run_state().begin(),
            global_step: 7,
        };
        assert!(!dispatcher.dispatch(VoiceConfig::new(0), origin));

        assert_eq!(
            wait_for_event(&rx),
            Some(EngineEvent::RenderOverrun {
                voice_id: 0,
                global_step: Some(7),
            })
        );
        assert_eq!(dispatcher.overrun_count(), 1);

        // Other voices are unaffected.
        assert!(dispatcher.dispatch(VoiceConfig::new(1), TriggerOrigin::Manual));

        assert!(wait_until(|| sink.played_count() == 2));
        // The flag is released once the render has been handed off.
        assert!(wait_until(|| !dispatcher.in_flight[0].load(Ordering::Acquire)));
        assert!(dispatcher.dispatch(VoiceConfig::new(0), TriggerOrigin::Manual));
    }

    #[test]
    fn test_dispatch_discards_after_stop() {
        let sink = Arc::new(RecordingSink::default());
        let config = EngineConfig {
            note_duration_ms: 2_000,
            ..EngineConfig::default()
        };
        let (dispatcher, rx) = make_dispatcher(sink.clone(), config);

        let origin = TriggerOrigin::Clock {
            generation: dispatcher.run_state().begin(),
            global_step: 0,
        };
        assert!(dispatcher.dispatch(VoiceConfig::new(3), origin));
        dispatcher.run_state().end();

        assert_eq!(
            wait_for_event(&rx),
            Some(EngineEvent::RenderDiscarded { voice_id: 3 })
        );
        assert_eq!(sink.played_count(), 0);
    }

    #[test]
    fn test_dispatch_ignores_stale_clock_trigger() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, _rx) = make_dispatcher(sink.clone(), short_config());

        let stale = dispatcher.run_state().begin();
        dispatcher.run_state().end();
        let current = dispatcher.run_state().begin();

        let origin = TriggerOrigin::Clock {
            generation: stale,
            global_step: 3,
        };
        assert!(!dispatcher.dispatch(VoiceConfig::new(2), origin));
        assert!(!dispatcher.in_flight[2].load(Ordering::Acquire));
        assert_eq!(dispatcher.overrun_count(), 0);

        // The voice is free for the new run.
        let origin = TriggerOrigin::Clock {
            generation: current,
            global_step: 0,
        };
        assert!(dispatcher.dispatch(VoiceConfig::new(2), origin));
        assert!(wait_until(|| sink.played_count() == 1));
    }

    #[test]
    fn test_notify_drops_when_queue_full() {
        let sink = Arc::new(RecordingSink::default());
        let config = EngineConfig {
            event_capacity: 4,
            ..short_config()
        };
        let (dispatcher, rx) = make_dispatcher(sink, config);

        for global_step in 0..10 {
            dispatcher.notify(EngineEvent::Triggered {
                voice_id: 0,
                global_step,
            });
        }

        assert_eq!(rx.try_iter().count(), 4);
        assert_eq!(dispatcher.dropped_event_count(), 6);

        // Polling frees room again.
        dispatcher.notify(EngineEvent::Stopped {
            run: 1,
            global_step: 10,
        });
        assert_eq!(
            rx.try_recv().ok(),
            Some(EngineEvent::Stopped {
                run: 1,
                global_step: 10,
            })
        );
    }

    #[test]
    fn test_dispatch_reports_failures() {
        let sink = Arc::new(RecordingSink::default());
        sink.fail_play.store(true, Ordering::SeqCst);
        let (dispatcher, rx) = make_dispatcher(sink.clone(), short_config());

        assert!(dispatcher.dispatch(VoiceConfig::new(1), TriggerOrigin::Manual));

        match wait_for_event(&rx) {
            Some(EngineEvent::RenderFailed { voice_id, .. }) => assert_eq!(voice_id, 1),
            other => panic!("unexpected event {other:?}"),
        }

        let config = EngineConfig {
            note_duration_ms: 0,
            ..EngineConfig::default()
        };
        let (dispatcher, rx) = make_dispatcher(Arc::new(RecordingSink::default()), config);
        assert!(dispatcher.dispatch(VoiceConfig::new(0), TriggerOrigin::Manual));
        assert!(matches!(
            wait_for_event(&rx),
            Some(EngineEvent::RenderFailed { voice_id: 0, .. })
        ));
    }

    #[test]
    fn test_dispatch_unknown_voice() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, _rx) = make_dispatcher(sink, short_config());

        assert!(!dispatcher.dispatch(VoiceConfig::new(NUM_VOICES), TriggerOrigin::Manual));
    }
}
