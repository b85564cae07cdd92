//! Control-thread facade over the audio engine
//!
//! [`AudioMonitor`] is the single entry point the display layer talks to:
//! stream lifecycle, parameter updates, effect selection, device switching
//! and the recording lifecycle all go through it. Parameter updates land in
//! the shared atomics; the recording writer travels to and from the audio
//! thread over bounded channels so no lock ever guards the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::audio::callback::SharedState;
use crate::audio::device::{self, DeviceInfo};
use crate::audio::engine::AudioEngine;
use crate::constants::{MAX_RECORD_FILES, SAMPLE_RATE};
use crate::effects::{AudioParams, EffectDescriptor, EFFECTS};
use crate::error::{ConfigError, Error, FileError, Result, StreamError};
use crate::wav::{WavWriter, FORMAT_IEEE_FLOAT};

/// How long to wait for the audio thread to hand the writer back
const WRITER_RETURN_TIMEOUT: Duration = Duration::from_millis(500);

/// Pass-through monitor with effects, metering and WAV capture
pub struct AudioMonitor {
    shared: Arc<SharedState>,
    engine: AudioEngine,
    writer_tx: Sender<WavWriter>,
    /// Clone of the attach end; reclaims a writer the callback never saw
    writer_attach_rx: Receiver<WavWriter>,
    writer_return_rx: Receiver<WavWriter>,
    recording_path: Option<PathBuf>,
}

impl AudioMonitor {
    /// Builds the monitor without touching any hardware
    pub fn new() -> Self {
        let shared = Arc::new(SharedState::new(AudioParams::default()));
        let (writer_tx, writer_attach_rx) = bounded(1);
        let (writer_return_tx, writer_return_rx) = bounded(1);
        let engine = AudioEngine::new(
            Arc::clone(&shared),
            writer_attach_rx.clone(),
            writer_return_tx,
        );
        Self {
            shared,
            engine,
            writer_tx,
            writer_attach_rx,
            writer_return_rx,
            recording_path: None,
        }
    }

    /// Starts the pass-through stream with the given channel count
    pub fn open(&mut self, channels: u16) -> Result<()> {
        check_channels(channels)?;
        if self.is_recording() {
            self.stop_recording()?;
        }
        self.engine.open(channels)
    }

    /// Stops the stream; any active recording is finalized first
    pub fn close(&mut self) -> Result<()> {
        if self.is_recording() {
            self.stop_recording()?;
        }
        self.engine.close();
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.engine.is_running()
    }

    pub fn channels(&self) -> u16 {
        self.engine.channels()
    }

    /// Set the pre-effect gain; the (gain, volume) pair is republished whole
    pub fn set_gain(&self, gain: f32) -> Result<()> {
        if !gain.is_finite() {
            return Err(ConfigError::InvalidValue(gain).into());
        }
        let params = self.shared.load_params();
        self.shared.store_params(gain, params.volume);
        Ok(())
    }

    pub fn gain(&self) -> f32 {
        self.shared.load_params().gain
    }

    /// Set the output volume (stored in the parameter block, not applied to
    /// the signal path).
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        if !volume.is_finite() {
            return Err(ConfigError::InvalidValue(volume).into());
        }
        let params = self.shared.load_params();
        self.shared.store_params(params.gain, volume);
        Ok(())
    }

    pub fn volume(&self) -> f32 {
        self.shared.load_params().volume
    }

    /// Select the active effect by its index in the catalog
    pub fn set_effect(&self, index: usize) -> Result<()> {
        if index >= EFFECTS.len() {
            return Err(ConfigError::InvalidEffect(index).into());
        }
        self.shared.set_effect_index(index);
        Ok(())
    }

    pub fn effect_index(&self) -> usize {
        self.shared.effect_index()
    }

    /// The selectable effect catalog, in menu order
    pub fn effects(&self) -> &'static [EffectDescriptor] {
        &EFFECTS
    }

    /// Starts capturing the processed input to a WAV file.
    ///
    /// With no explicit path the next free `out_<n>.wav` in the current
    /// directory is used. Returns the path actually recorded to.
    pub fn start_recording(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        if !self.engine.is_running() {
            return Err(StreamError::NotRunning.into());
        }
        if self.is_recording() {
            self.stop_recording()?;
        }

        // A writer still parked in a hand-off channel belongs to no active
        // recording; finalize it so the bounded channels are free.
        for stale in self
            .writer_attach_rx
            .try_iter()
            .chain(self.writer_return_rx.try_iter())
        {
            tracing::warn!(path = %stale.path().display(), "finalizing stale recording writer");
            stale.finalize().map_err(Error::File)?;
        }

        let path = match path {
            Some(p) => p.to_path_buf(),
            None => find_free_filename(Path::new("."), MAX_RECORD_FILES)?,
        };
        let writer = WavWriter::create(
            &path,
            FORMAT_IEEE_FLOAT,
            SAMPLE_RATE,
            self.shared.channels(),
            32,
        )?;

        self.shared.take_capture_fault();
        // The record flag goes up before the writer crosses; a callback
        // running in between would otherwise bounce the writer back while
        // the flag is still clear.
        self.shared.set_recording(true);
        if let Err(e) = self.writer_tx.try_send(writer) {
            self.shared.set_recording(false);
            let _ = e.into_inner().finalize();
            return Err(StreamError::ThreadUnresponsive.into());
        }
        self.recording_path = Some(path.clone());
        tracing::info!(path = %path.display(), "recording started");
        Ok(path)
    }

    /// Stops an active recording and finalizes the file; idempotent.
    ///
    /// Returns the finalized path, or `None` if nothing was recording.
    pub fn stop_recording(&mut self) -> Result<Option<PathBuf>> {
        let path = self.recording_path.take();
        if path.is_none() && !self.shared.is_recording() {
            return Ok(None);
        }
        self.shared.set_recording(false);

        // The writer is either still unconsumed in the attach channel or
        // comes back from the callback once it observes the cleared flag.
        let writer = self
            .writer_attach_rx
            .try_recv()
            .ok()
            .or_else(|| self.writer_return_rx.try_recv().ok())
            .or_else(|| {
                if self.engine.is_running() {
                    self.writer_return_rx.recv_timeout(WRITER_RETURN_TIMEOUT).ok()
                } else {
                    None
                }
            });

        let faulted = self.shared.take_capture_fault();
        match writer {
            Some(writer) => {
                let samples = writer.num_samples();
                writer.finalize().map_err(Error::File)?;
                tracing::info!(samples, faulted, "recording finalized");
                Ok(path)
            }
            None => Err(StreamError::ThreadUnresponsive.into()),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.shared.is_recording()
    }

    /// Peak level of the last captured buffer
    pub fn peak(&self) -> f32 {
        self.shared.meter.read()
    }

    /// Reads and clears the sticky capture fault flag
    pub fn take_capture_fault(&self) -> bool {
        self.shared.take_capture_fault()
    }

    /// Last runtime error reported by the streams, if any
    pub fn take_stream_error(&self) -> Option<StreamError> {
        self.engine.take_stream_error()
    }

    /// All devices the host exposes, in selection order
    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        device::list_devices().map_err(Error::Device)
    }

    /// Switch the input device, restarting the stream with `channels`.
    ///
    /// An active recording is finalized first; a validation failure leaves
    /// the running stream untouched.
    pub fn set_input_device(&mut self, index: usize, channels: u16) -> Result<()> {
        check_channels(channels)?;
        if self.is_recording() {
            self.stop_recording()?;
        }
        self.engine.set_input_device(index, channels)
    }

    /// Output-side counterpart of [`set_input_device`](Self::set_input_device)
    pub fn set_output_device(&mut self, index: usize, channels: u16) -> Result<()> {
        check_channels(channels)?;
        if self.is_recording() {
            self.stop_recording()?;
        }
        self.engine.set_output_device(index, channels)
    }

    /// Orderly teardown: finalize any recording, then stop the streams
    pub fn shutdown(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("recording not finalized cleanly on shutdown: {}", e);
            self.engine.close();
        }
    }
}

impl Default for AudioMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn check_channels(channels: u16) -> Result<()> {
    if channels == 0 || channels > 2 {
        return Err(ConfigError::InvalidChannels(channels).into());
    }
    Ok(())
}

/// Smallest free `out_<n>.wav` in `dir`, probing `1..=limit`
pub fn find_free_filename(dir: &Path, limit: u32) -> std::result::Result<PathBuf, FileError> {
    for n in 1..=limit {
        let candidate = dir.join(format!("out_{n}.wav"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(FileError::NoFreeFilename(limit))
}
