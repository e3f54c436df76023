//! Audio Stream Module
//!
//! This module handles CPAL audio stream management including:
//! - Opening the default output device at the rack's sample rate
//! - The real-time callback that drains playback commands into the player
//! - The [`CpalSink`] handle render tasks use to submit notes

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Stream, StreamConfig};
use env_logger::{Builder, Env};
use rtrb::{Producer, RingBuffer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio_engine::constants::{PLAYBACK_QUEUE_CAPACITY, SAMPLE_RATE};
use crate::audio_engine::errors::SinkError;
use crate::audio_engine::playback::PlaybackSink;
use crate::audio_engine::player::RtPlayer;
use crate::messages::{PlaybackCommand, RenderBuffer};

/// Setup and configure the logger for audio operations
pub fn setup_logger() {
    // Users can override via `RUST_LOG`, e.g. `RUST_LOG=debug` to see every trigger.
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .try_init()
        .unwrap_or(()); // Ignore initialization errors
}

/// Owns the output stream. Dropping it or calling [`shutdown`] closes every
/// sink handed out by [`sink`].
///
/// [`shutdown`]: PlaybackContext::shutdown
/// [`sink`]: PlaybackContext::sink
pub struct PlaybackContext {
    stream: Option<Stream>,
    producer: Arc<Mutex<Producer<PlaybackCommand>>>,
    open: Arc<AtomicBool>,
    output_channels: usize,
}

impl PlaybackContext {
    /// Opens the default output device at [`SAMPLE_RATE`].
    pub fn init() -> Result<Self, SinkError> {
        Self::with_sample_rate(SAMPLE_RATE)
    }

    /// Opens the default output device and starts the stream.
    ///
    /// This function:
    /// 1. Finds the default output device
    /// 2. Configures a stream at `sample_rate` on the device's default
    ///    channel count
    /// 3. Creates the ring buffer feeding the player
    /// 4. Builds and starts the stream
    ///
    /// No resampling happens, so `sample_rate` must match the engine's
    /// [`EngineConfig::sample_rate`](crate::audio_engine::config::EngineConfig::sample_rate).
    pub fn with_sample_rate(sample_rate: u32) -> Result<Self, SinkError> {
        setup_logger();

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(SinkError::NoDevice)?;

        let default_config = device.default_output_config()?;
        let channels = default_config.channels();

        log::info!(
            "Opening audio output... ({} ch@{} Hz)",
            channels,
            sample_rate
        );

        let (producer, mut consumer) = RingBuffer::new(PLAYBACK_QUEUE_CAPACITY);
        let mut player = RtPlayer::new(channels as usize);

        let stream_config = StreamConfig {
            channels,
            sample_rate,
            buffer_size: BufferSize::Default,
        };

        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                while let Ok(command) = consumer.pop() {
                    player.handle(command);
                }

                player.render(data);
            },
            |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )?;

        stream.play()?;

        Ok(Self {
            stream: Some(stream),
            producer: Arc::new(Mutex::new(producer)),
            open: Arc::new(AtomicBool::new(true)),
            output_channels: channels as usize,
        })
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    /// A sink that submits notes to this stream.
    pub fn sink(&self) -> Arc<CpalSink> {
        Arc::new(CpalSink {
            producer: Arc::clone(&self.producer),
            open: Arc::clone(&self.open),
        })
    }

    /// Silences every sounding note without closing the stream.
    pub fn stop_all(&self) -> Result<(), SinkError> {
        self.sink().send(PlaybackCommand::StopAll())
    }

    /// Closes the stream. Later submissions fail with [`SinkError::Closed`].
    pub fn shutdown(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        if let Some(stream) = self.stream.take() {
            drop(stream);
            log::info!("Audio output closed");
        }
    }
}

impl Drop for PlaybackContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Thread-safe handle that forwards rendered notes to the stream callback.
pub struct CpalSink {
    producer: Arc<Mutex<Producer<PlaybackCommand>>>,
    open: Arc<AtomicBool>,
}

impl CpalSink {
    fn send(&self, command: PlaybackCommand) -> Result<(), SinkError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }

        let mut producer = self.producer.lock().map_err(|_| SinkError::Closed)?;
        producer.push(command).map_err(|_| SinkError::QueueFull)
    }
}

impl PlaybackSink for CpalSink {
    fn check_ready(&self) -> Result<(), SinkError> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SinkError::Closed)
        }
    }

    fn play(&self, buffer: RenderBuffer, level: f32) -> Result<(), SinkError> {
        self.send(PlaybackCommand::Play { buffer, level })
    }
}
