//! Audio engine configuration constants and limits.

/// Output sample rate of every rendered note, in Hz.
pub const SAMPLE_RATE: u32 = 44_100;

/// Default note length in milliseconds.
pub const NOTE_DURATION_MS: u32 = 500;

/// Number of independent voices in the rack.
pub const NUM_VOICES: usize = 4;

/// Number of spectral EQ bands per voice.
pub const NUM_BANDS: usize = 6;

/// Number of sixteenth-note slots in a voice's step row.
pub const STEP_COUNT: usize = 32;

/// Slowest tempo in beats per minute.
pub const BPM_MIN: f32 = 60.0;

/// Fastest tempo in beats per minute.
pub const BPM_MAX: f32 = 240.0;

/// Tempo the transport starts with.
pub const BPM_DEFAULT: f32 = 120.0;

/// Clock ticks per beat (sixteenth-note grid).
pub const TICKS_PER_BEAT: f64 = 4.0;

/// Lowest oscillator frequency in Hz.
pub const FREQ_MIN: f32 = 0.0;

/// Highest oscillator frequency in Hz.
pub const FREQ_MAX: f32 = 880.0;

/// Shortest attack/decay/release accepted by the linear envelope.
pub const ADSR_TIME_MIN: f32 = 0.001;

/// Longest attack/decay/release accepted by the linear envelope.
pub const ADSR_TIME_MAX: f32 = 0.9;

/// Target sum of attack/decay/release once the linear envelope normalizes.
pub const ADSR_NORMALIZED_SUM: f32 = 0.99;

/// Minimum level for the unit-range controls (volume, gain, pan, EQ, drive).
pub const LEVEL_MIN: f32 = 0.0;

/// Maximum level for the unit-range controls.
pub const LEVEL_MAX: f32 = 1.0;

/// Default gain of each EQ band.
pub const EQ_DEFAULT_GAIN: f32 = 0.5;

/// Floor of the volume law in dB (`volume + gain == 0`).
pub const VOLUME_DB_FLOOR: f32 = -40.0;

/// dB added per unit of `volume + gain`.
pub const VOLUME_DB_PER_UNIT: f32 = 20.0;

/// Full-scale positive value used when quantizing to 16-bit PCM.
pub const PCM_FULL_SCALE: f32 = 32_767.0;

/// Distortion pre-gain added per unit of distortion amount.
pub const DISTORTION_DRIVE: f32 = 10.0;

/// Capacity of the control-path to clock message queue.
pub const CONTROL_QUEUE_CAPACITY: usize = 1024;

/// Default capacity of the diagnostics event queue. Events beyond it are
/// dropped until the control path polls.
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Capacity of the render-task to stream-callback queue.
pub const PLAYBACK_QUEUE_CAPACITY: usize = 256;

/// Maximum number of rendered notes sounding at once in the stream callback.
pub const MAX_PLAYING: usize = 32;
