//! Hardware stream lifecycle
//!
//! The engine owns one input and one output stream, each built and held by
//! a dedicated thread: the stream is created inside the thread, the startup
//! result is reported back over a bounded channel, and the thread then parks
//! on a `running` flag until the engine stops it. Stopping joins the holder
//! threads, so by the time configuration mutates the old callbacks are
//! guaranteed gone.
//!
//! Device switches validate the target first; a validation failure leaves
//! the running stream untouched. A post-validation startup failure rolls
//! back to the previous device configuration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::audio::bridge::MonitorBuffer;
use crate::audio::callback::{process_block, CallbackState, SharedState};
use crate::audio::device::{
    default_input_device, default_output_device, device_at, validate_input_device,
    validate_output_device,
};
use crate::constants::{FRAMES_PER_BUFFER, MONITOR_BUFFER_CAPACITY, SAMPLE_RATE};
use crate::error::{DeviceError, Error, Result, StreamError};
use crate::wav::WavWriter;

/// How long to wait for a holder thread to report stream startup
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the hardware streams and their lifecycle
pub struct AudioEngine {
    shared: Arc<SharedState>,
    monitor: Arc<MonitorBuffer>,
    running: Arc<AtomicBool>,
    input_thread: Option<JoinHandle<()>>,
    output_thread: Option<JoinHandle<()>>,
    /// `None` selects the default device
    input_device: Option<usize>,
    output_device: Option<usize>,
    channels: u16,
    sample_rate: u32,
    frames_per_buffer: u32,
    writer_rx: Receiver<WavWriter>,
    writer_return_tx: Sender<WavWriter>,
    error_tx: Sender<StreamError>,
    error_rx: Receiver<StreamError>,
}

impl AudioEngine {
    /// The writer channel ends are handed to every callback instance the
    /// engine creates, so recording survives the control facade's view of
    /// stream rebuilds.
    pub fn new(
        shared: Arc<SharedState>,
        writer_rx: Receiver<WavWriter>,
        writer_return_tx: Sender<WavWriter>,
    ) -> Self {
        let (error_tx, error_rx) = bounded(16);
        Self {
            channels: shared.channels(),
            shared,
            monitor: Arc::new(MonitorBuffer::new(MONITOR_BUFFER_CAPACITY)),
            running: Arc::new(AtomicBool::new(false)),
            input_thread: None,
            output_thread: None,
            input_device: None,
            output_device: None,
            sample_rate: SAMPLE_RATE,
            frames_per_buffer: FRAMES_PER_BUFFER,
            writer_rx,
            writer_return_tx,
            error_tx,
            error_rx,
        }
    }

    /// Starts the pass-through stream on the selected (or default) devices
    pub fn open(&mut self, channels: u16) -> Result<()> {
        self.close();
        self.set_channels(channels);
        if let Err(e) = self.start() {
            self.close();
            return Err(e);
        }
        Ok(())
    }

    /// Stops and releases both streams; idempotent
    pub fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.input_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.output_thread.take() {
            let _ = handle.join();
        }
        self.monitor.clear();
    }

    pub fn is_running(&self) -> bool {
        self.input_thread.is_some() && self.running.load(Ordering::SeqCst)
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Switch the input device; the previous stream stays authoritative on
    /// failure.
    pub fn set_input_device(&mut self, index: usize, channels: u16) -> Result<()> {
        if !validate_input_device(index, self.sample_rate)? {
            return Err(DeviceError::UnsupportedFormat {
                index,
                channels,
                sample_rate: self.sample_rate,
            }
            .into());
        }

        let prev_device = self.input_device;
        let prev_channels = self.channels;
        let was_running = self.is_running();
        self.close();
        self.input_device = Some(index);
        self.set_channels(channels);

        if let Err(e) = self.start() {
            tracing::warn!("input device switch failed, rolling back: {}", e);
            self.rollback(prev_device, self.output_device, prev_channels, was_running);
            return Err(e);
        }
        Ok(())
    }

    /// Switch the output device; same transition contract as the input side
    pub fn set_output_device(&mut self, index: usize, channels: u16) -> Result<()> {
        if !validate_output_device(index, self.sample_rate)? {
            return Err(DeviceError::UnsupportedFormat {
                index,
                channels,
                sample_rate: self.sample_rate,
            }
            .into());
        }

        let prev_device = self.output_device;
        let prev_channels = self.channels;
        let was_running = self.is_running();
        self.close();
        self.output_device = Some(index);
        self.set_channels(channels);

        if let Err(e) = self.start() {
            tracing::warn!("output device switch failed, rolling back: {}", e);
            self.rollback(self.input_device, prev_device, prev_channels, was_running);
            return Err(e);
        }
        Ok(())
    }

    /// Last runtime error reported by a stream's error callback, if any
    pub fn take_stream_error(&self) -> Option<StreamError> {
        self.error_rx.try_recv().ok()
    }

    /// Bridge telemetry for diagnostics
    pub fn monitor_buffer(&self) -> &MonitorBuffer {
        &self.monitor
    }

    fn set_channels(&mut self, channels: u16) {
        self.channels = channels;
        self.shared.set_channels(channels);
    }

    /// Restores the previous device configuration; the stream is restarted
    /// only if one was running before the failed switch.
    fn rollback(
        &mut self,
        input: Option<usize>,
        output: Option<usize>,
        channels: u16,
        restart: bool,
    ) {
        self.close();
        self.input_device = input;
        self.output_device = output;
        self.set_channels(channels);
        if !restart {
            return;
        }
        if let Err(e) = self.start() {
            self.close();
            tracing::error!("rollback to previous device configuration failed: {}", e);
        }
    }

    fn start(&mut self) -> Result<()> {
        // Resolve both devices before spawning anything so a bad selection
        // cannot leave a half-started engine.
        let input_device = match self.input_device {
            Some(index) => device_at(index)?,
            None => default_input_device()?,
        };
        let output_device = match self.output_device {
            Some(index) => device_at(index)?,
            None => default_output_device()?,
        };

        let config = StreamConfig {
            channels: self.channels,
            sample_rate: SampleRate(self.sample_rate),
            buffer_size: BufferSize::Fixed(self.frames_per_buffer),
        };
        let max_samples = self.frames_per_buffer as usize * self.channels as usize;

        self.monitor.clear();
        self.running.store(true, Ordering::SeqCst);

        // Input side: the real-time callback lives here.
        let (ready_tx, ready_rx) = bounded::<std::result::Result<(), StreamError>>(1);
        let mut state = CallbackState::new(
            max_samples,
            self.writer_rx.clone(),
            self.writer_return_tx.clone(),
        );
        let shared = Arc::clone(&self.shared);
        let monitor = Arc::clone(&self.monitor);
        let running = Arc::clone(&self.running);
        let error_tx = self.error_tx.clone();
        let input_config = config.clone();

        let handle = thread::Builder::new()
            .name("audio-input".to_string())
            .spawn(move || {
                let stream = input_device.build_input_stream(
                    &input_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let block = process_block(&mut state, &shared, data);
                        monitor.push_block(block);
                    },
                    move |err| {
                        let _ = error_tx.try_send(StreamError::Runtime(err.to_string()));
                    },
                    None,
                );
                hold_stream(stream, &ready_tx, &running);
            })
            .map_err(|e| StreamError::BuildFailed(e.to_string()))?;
        self.input_thread = Some(handle);
        wait_ready(&ready_rx)?;

        // Output side: drain the bridge, silence on underrun.
        let (ready_tx, ready_rx) = bounded::<std::result::Result<(), StreamError>>(1);
        let monitor = Arc::clone(&self.monitor);
        let running = Arc::clone(&self.running);
        let error_tx = self.error_tx.clone();

        let handle = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let stream = output_device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        monitor.pop_into(data);
                    },
                    move |err| {
                        let _ = error_tx.try_send(StreamError::Runtime(err.to_string()));
                    },
                    None,
                );
                hold_stream(stream, &ready_tx, &running);
            })
            .map_err(|e| StreamError::BuildFailed(e.to_string()))?;
        self.output_thread = Some(handle);
        wait_ready(&ready_rx)?;

        tracing::info!(
            channels = self.channels,
            sample_rate = self.sample_rate,
            frames = self.frames_per_buffer,
            "audio streams started"
        );
        Ok(())
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.close();
    }
}

/// Plays the freshly built stream, reports the result, then parks until the
/// engine clears `running`. The stream drops when this returns.
fn hold_stream(
    stream: std::result::Result<cpal::Stream, cpal::BuildStreamError>,
    ready_tx: &Sender<std::result::Result<(), StreamError>>,
    running: &AtomicBool,
) {
    match stream {
        Ok(stream) => {
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(StreamError::PlayFailed(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));
            while running.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(10));
            }
        }
        Err(e) => {
            let _ = ready_tx.send(Err(StreamError::BuildFailed(e.to_string())));
        }
    }
}

fn wait_ready(ready_rx: &Receiver<std::result::Result<(), StreamError>>) -> Result<()> {
    match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Error::Stream(e)),
        Err(_) => Err(Error::Stream(StreamError::ThreadUnresponsive)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::AudioParams;

    fn engine() -> AudioEngine {
        let shared = Arc::new(SharedState::new(AudioParams::default()));
        let (_writer_tx, writer_rx) = bounded(1);
        let (writer_return_tx, _writer_return_rx) = bounded(1);
        AudioEngine::new(shared, writer_rx, writer_return_tx)
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut e = engine();
        e.close();
        e.close();
        assert!(!e.is_running());
    }

    #[test]
    fn test_no_stream_error_when_idle() {
        let e = engine();
        assert!(e.take_stream_error().is_none());
    }

    #[test]
    fn test_rollback_does_not_start_a_stopped_engine() {
        let mut e = engine();
        e.rollback(None, None, 2, false);
        assert!(!e.is_running());
        assert_eq!(e.channels(), 2);
    }

    #[test]
    fn test_switch_to_missing_device_leaves_engine_alone() {
        let mut e = engine();
        let before = e.is_running();
        let result = e.set_input_device(usize::MAX, 1);
        assert!(result.is_err());
        assert_eq!(e.is_running(), before);
        assert_eq!(e.channels(), 1);
    }
}
