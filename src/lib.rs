//! # wavecli
//!
//! Minimal real-time audio pass-through monitor with selectable DSP effects
//! and optional capture to disk.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         CONTROL THREAD                           │
//! │  ┌──────────────┐      ┌───────────────────────────────────┐     │
//! │  │  CLI loop    │─────▶│  AudioMonitor (monitor)           │     │
//! │  │  (bin)       │      │  gain / volume / effect / record  │     │
//! │  └──────────────┘      └───────────────┬───────────────────┘     │
//! │                                        │                         │
//! │        atomics (params, effect,        │   AudioEngine (audio)   │
//! │        record flag)  ───────────┐      │   stream lifecycle      │
//! │        WavWriter hand-off ────┐ │      │                         │
//! └───────────────────────────────┼─┼──────┼─────────────────────────┘
//!                                 ▼ ▼      ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      HARDWARE AUDIO THREAD                       │
//! │   input stream ──▶ process_block (audio::callback)               │
//! │     1. snapshot record flag / effect / params                    │
//! │     2. capture: scratch copy → effect → WAV append → peak meter  │
//! │     3. monitor: scratch copy → effect in place                   │
//! │     4. push to MonitorBuffer ──▶ output stream (pass-through)    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Exactly two logical threads exist: the control thread mutates shared
//! configuration through single-writer atomics, the hardware audio thread
//! reads it every buffer. Telemetry (peak level, capture fault) flows the
//! other way through the same discipline. The audio path never allocates
//! and never takes a lock; the only unbounded-latency operation is the
//! buffered WAV append during capture.

pub mod audio;
pub mod effects;
pub mod error;
pub mod meter;
pub mod monitor;
pub mod wav;

pub use error::{ConfigError, DeviceError, Error, FileError, Result, StreamError};
pub use monitor::AudioMonitor;

/// Application-wide constants
pub mod constants {
    /// Fixed sample rate for the monitor stream
    pub const SAMPLE_RATE: u32 = 44_100;

    /// Default channel count (mono)
    pub const DEFAULT_CHANNELS: u16 = 1;

    /// Default gain multiplier
    pub const DEFAULT_GAIN: f32 = 10.0;

    /// Default volume
    pub const DEFAULT_VOLUME: f32 = 0.2;

    /// Fixed frames per hardware buffer
    pub const FRAMES_PER_BUFFER: u32 = 256;

    /// Monitor bridge capacity in samples (input stream -> output stream)
    pub const MONITOR_BUFFER_CAPACITY: usize = 16_384;

    /// Highest `out_<n>.wav` probed when auto-naming a recording
    pub const MAX_RECORD_FILES: u32 = 128;
}
