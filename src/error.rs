//! Error types for the audio monitor

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Device selection and validation errors
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No default input device")]
    NoDefaultInput,

    #[error("No default output device")]
    NoDefaultOutput,

    #[error("Device not found: {0}")]
    NotFound(usize),

    #[error("Device {index} does not support {channels} channel(s) f32 @ {sample_rate} Hz")]
    UnsupportedFormat {
        index: usize,
        channels: u16,
        sample_rate: u32,
    },

    #[error("Device enumeration failed: {0}")]
    EnumerationFailed(String),
}

/// Hardware stream lifecycle errors
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Failed to build stream: {0}")]
    BuildFailed(String),

    #[error("Failed to start stream: {0}")]
    PlayFailed(String),

    #[error("Stream is not running")]
    NotRunning,

    #[error("Stream reported an error: {0}")]
    Runtime(String),

    #[error("Stream thread did not respond")]
    ThreadUnresponsive,
}

/// Recording file errors
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Cannot create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("Header finalization failed: {0}")]
    Finalize(#[source] std::io::Error),

    #[error("No free out_<n>.wav filename (probed 1..={0})")]
    NoFreeFilename(u32),
}

/// Invalid control-thread arguments
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid effect index: {0}")]
    InvalidEffect(usize),

    #[error("Invalid channel count: {0}")]
    InvalidChannels(u16),

    #[error("Invalid numeric value: {0}")]
    InvalidValue(f32),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
