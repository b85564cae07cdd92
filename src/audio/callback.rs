//! Real-time callback state and per-buffer processing
//!
//! [`SharedState`] is the cross-thread half of the callback context: every
//! field is a single-writer atomic, written by the control thread and read
//! by the audio thread (the peak meter and fault flag flow the other way).
//! The gain/volume pair is packed into one `AtomicU64` and published with a
//! single store, so the audio thread can never observe a torn pair.
//!
//! [`CallbackState`] is the audio-thread-private half: preallocated scratch
//! buffers, the attached WAV writer, and effect state. It is created once
//! per stream open and moved into the input-stream closure; nothing in it
//! is ever allocated or freed on the audio thread.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender};

use crate::effects::{AudioParams, EffectState, EFFECTS};
use crate::meter::PeakMeter;
use crate::wav::WavWriter;

fn pack_params(gain: f32, volume: f32) -> u64 {
    (u64::from(gain.to_bits()) << 32) | u64::from(volume.to_bits())
}

fn unpack_params(packed: u64) -> (f32, f32) {
    let gain = f32::from_bits((packed >> 32) as u32);
    let volume = f32::from_bits(packed as u32);
    (gain, volume)
}

/// Configuration and telemetry shared between the control and audio threads
#[derive(Debug)]
pub struct SharedState {
    /// Packed (gain, volume), swapped whole by the control thread
    params: AtomicU64,
    /// Channel count; mutated only while the stream is stopped
    channels: AtomicU32,
    /// Index into [`EFFECTS`]; validated before it is stored
    effect: AtomicUsize,
    /// Record flag, toggled only by the control thread
    recording: AtomicBool,
    /// Sticky capture fault, set by the audio thread on a failed WAV append
    capture_fault: AtomicBool,
    /// Peak level of the last captured buffer
    pub meter: PeakMeter,
}

impl SharedState {
    pub fn new(params: AudioParams) -> Self {
        Self {
            params: AtomicU64::new(pack_params(params.gain, params.volume)),
            channels: AtomicU32::new(u32::from(params.channels)),
            effect: AtomicUsize::new(0),
            recording: AtomicBool::new(false),
            capture_fault: AtomicBool::new(false),
            meter: PeakMeter::new(),
        }
    }

    /// Publish a new (gain, volume) pair with one atomic store
    pub fn store_params(&self, gain: f32, volume: f32) {
        self.params.store(pack_params(gain, volume), Ordering::Relaxed);
    }

    /// Snapshot of the current parameters
    pub fn load_params(&self) -> AudioParams {
        let (gain, volume) = unpack_params(self.params.load(Ordering::Relaxed));
        AudioParams {
            channels: self.channels(),
            gain,
            volume,
        }
    }

    /// Only valid while the stream is stopped
    pub fn set_channels(&self, channels: u16) {
        self.channels.store(u32::from(channels), Ordering::Relaxed);
    }

    pub fn channels(&self) -> u16 {
        self.channels.load(Ordering::Relaxed) as u16
    }

    /// Callers must bounds-check against [`EFFECTS`] first
    pub fn set_effect_index(&self, index: usize) {
        self.effect.store(index, Ordering::Relaxed);
    }

    pub fn effect_index(&self) -> usize {
        self.effect.load(Ordering::Relaxed)
    }

    pub fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::Relaxed);
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }

    pub fn set_capture_fault(&self) {
        self.capture_fault.store(true, Ordering::Relaxed);
    }

    pub fn capture_faulted(&self) -> bool {
        self.capture_fault.load(Ordering::Relaxed)
    }

    /// Reads and clears the sticky fault flag
    pub fn take_capture_fault(&self) -> bool {
        self.capture_fault.swap(false, Ordering::Relaxed)
    }
}

/// Audio-thread-private callback state
pub struct CallbackState {
    capture_scratch: Vec<f32>,
    monitor_scratch: Vec<f32>,
    writer: Option<WavWriter>,
    /// Capture and monitor each keep their own filter register; both see the
    /// raw input stream, so sharing one would let the capture pass shift the
    /// monitor pass by a buffer.
    capture_effect: EffectState,
    monitor_effect: EffectState,
    last_effect: usize,
    writer_rx: Receiver<WavWriter>,
    writer_return_tx: Sender<WavWriter>,
}

impl CallbackState {
    /// `max_samples` is the largest interleaved buffer the stream can
    /// deliver (frames-per-buffer x channels); both scratches are sized
    /// once here and never again.
    pub fn new(
        max_samples: usize,
        writer_rx: Receiver<WavWriter>,
        writer_return_tx: Sender<WavWriter>,
    ) -> Self {
        Self {
            capture_scratch: vec![0.0; max_samples],
            monitor_scratch: vec![0.0; max_samples],
            writer: None,
            capture_effect: EffectState::new(),
            monitor_effect: EffectState::new(),
            last_effect: 0,
            writer_rx,
            writer_return_tx,
        }
    }
}

/// Processes one hardware buffer; returns the block to pass through to the
/// output side.
///
/// Fixed order: snapshot shared config, capture (scratch copy -> effect ->
/// WAV append -> meter), then monitor (scratch copy -> effect in place).
/// Recording and monitoring each apply the active effect once. This function
/// never allocates, never locks, and never signals stream stop; the only
/// I/O is the buffered WAV append.
pub fn process_block<'a>(
    state: &'a mut CallbackState,
    shared: &SharedState,
    input: &[f32],
) -> &'a [f32] {
    // Writer hand-off: attach an incoming writer, return it once the
    // record flag is observed clear.
    if let Ok(writer) = state.writer_rx.try_recv() {
        state.writer = Some(writer);
    }
    let recording = shared.is_recording();
    if !recording {
        if let Some(writer) = state.writer.take() {
            let _ = state.writer_return_tx.try_send(writer);
        }
    }

    let effect_index = shared.effect_index();
    if effect_index != state.last_effect {
        state.capture_effect.reset();
        state.monitor_effect.reset();
        state.last_effect = effect_index;
    }
    let effect = &EFFECTS[effect_index];
    let params = shared.load_params();

    // Fixed buffer size is part of the stream contract; clamping here keeps
    // an oversized driver buffer from reaching past the scratches.
    let n = input.len().min(state.monitor_scratch.len());
    let input = &input[..n];

    if recording && !shared.capture_faulted() {
        if let Some(writer) = state.writer.as_mut() {
            let scratch = &mut state.capture_scratch[..n];
            scratch.copy_from_slice(input);
            (effect.apply)(scratch, &params, &mut state.capture_effect);
            match writer.write_samples(scratch) {
                Ok(_) => shared.meter.update(scratch),
                Err(_) => shared.set_capture_fault(),
            }
        }
    }

    let monitor = &mut state.monitor_scratch[..n];
    monitor.copy_from_slice(input);
    (effect.apply)(monitor, &params, &mut state.monitor_effect);

    &state.monitor_scratch[..n]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SAMPLE_RATE;
    use crate::wav::{WavWriter, FORMAT_IEEE_FLOAT, WAV_HEADER_SIZE};
    use crossbeam_channel::bounded;
    use tempfile::tempdir;

    fn harness() -> (CallbackState, SharedState, Sender<WavWriter>, Receiver<WavWriter>) {
        let (attach_tx, attach_rx) = bounded(1);
        let (return_tx, return_rx) = bounded(1);
        let state = CallbackState::new(64, attach_rx, return_tx);
        let shared = SharedState::new(AudioParams::default());
        (state, shared, attach_tx, return_rx)
    }

    #[test]
    fn test_pass_through_without_effect() {
        let (mut state, shared, _tx, _rx) = harness();
        let input = [0.1f32, -0.2, 0.3];
        let out = process_block(&mut state, &shared, &input);
        assert_eq!(out, &input);
    }

    #[test]
    fn test_monitor_applies_active_effect() {
        let (mut state, shared, _tx, _rx) = harness();
        shared.set_effect_index(3); // inversion
        let out = process_block(&mut state, &shared, &[0.25f32, -0.5]);
        assert_eq!(out, &[-0.25f32, 0.5]);
    }

    #[test]
    fn test_params_swap_is_whole() {
        let shared = SharedState::new(AudioParams::default());
        shared.store_params(2.5, 0.7);
        let p = shared.load_params();
        assert_eq!(p.gain, 2.5);
        assert_eq!(p.volume, 0.7);
        assert_eq!(p.channels, 1);
    }

    #[test]
    fn test_effect_switch_resets_filter_state() {
        let (mut state, shared, _tx, _rx) = harness();
        shared.set_effect_index(4); // feed-forward
        let out = process_block(&mut state, &shared, &[1.0f32]);
        assert_eq!(out, &[0.5f32]);

        // leave and re-enter the filter; the register must start at zero
        shared.set_effect_index(0);
        process_block(&mut state, &shared, &[0.0f32]);
        shared.set_effect_index(4);
        let out = process_block(&mut state, &shared, &[0.0f32]);
        assert_eq!(out, &[0.0f32]);
    }

    #[test]
    fn test_capture_writes_processed_samples_and_meters() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cap.wav");

        let (mut state, shared, attach_tx, return_rx) = harness();
        let writer = WavWriter::create(&path, FORMAT_IEEE_FLOAT, SAMPLE_RATE, 1, 32).unwrap();
        attach_tx.send(writer).unwrap();
        shared.set_recording(true);
        shared.set_effect_index(3); // inversion

        process_block(&mut state, &shared, &[0.2f32, -0.9, 0.1]);
        assert_eq!(shared.meter.read(), 0.9);

        shared.set_recording(false);
        process_block(&mut state, &shared, &[0.0f32]);
        let writer = return_rx.try_recv().expect("writer returned on stop");
        assert_eq!(writer.num_samples(), 3);
        writer.finalize().unwrap();

        let data = std::fs::read(&path).unwrap();
        let first = f32::from_le_bytes([
            data[WAV_HEADER_SIZE],
            data[WAV_HEADER_SIZE + 1],
            data[WAV_HEADER_SIZE + 2],
            data[WAV_HEADER_SIZE + 3],
        ]);
        assert_eq!(first, -0.2);
    }

    #[test]
    fn test_no_capture_without_record_flag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idle.wav");

        let (mut state, shared, attach_tx, return_rx) = harness();
        let writer = WavWriter::create(&path, FORMAT_IEEE_FLOAT, SAMPLE_RATE, 1, 32).unwrap();
        attach_tx.send(writer).unwrap();

        // flag never set: the writer is attached and immediately returned
        process_block(&mut state, &shared, &[0.5f32]);
        let writer = return_rx.try_recv().expect("unused writer returned");
        assert_eq!(writer.num_samples(), 0);
    }

    #[test]
    fn test_writer_attached_after_flag_set_is_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("late.wav");
        let (mut state, shared, attach_tx, return_rx) = harness();

        // flag goes up first; the writer arrives a buffer later
        shared.set_recording(true);
        process_block(&mut state, &shared, &[0.1f32]);
        assert!(return_rx.try_recv().is_err());

        let writer = WavWriter::create(&path, FORMAT_IEEE_FLOAT, SAMPLE_RATE, 1, 32).unwrap();
        attach_tx.send(writer).unwrap();
        process_block(&mut state, &shared, &[0.2f32, -0.4]);
        assert!(return_rx.try_recv().is_err(), "writer must stay attached");

        shared.set_recording(false);
        process_block(&mut state, &shared, &[0.0f32]);
        let writer = return_rx.try_recv().expect("writer returned on stop");
        assert_eq!(writer.num_samples(), 2);
    }

    #[test]
    fn test_capture_pass_does_not_shift_monitor_filter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ff.wav");
        let (mut state, shared, attach_tx, return_rx) = harness();

        let writer = WavWriter::create(&path, FORMAT_IEEE_FLOAT, SAMPLE_RATE, 1, 32).unwrap();
        shared.set_recording(true);
        attach_tx.send(writer).unwrap();
        shared.set_effect_index(4); // feed-forward

        // monitor register starts at zero even though the capture pass ran
        let out = process_block(&mut state, &shared, &[1.0f32]);
        assert_eq!(out, &[0.5f32]);

        // and carries the previous buffer's raw input, not this one's tail
        let out = process_block(&mut state, &shared, &[0.0f32]);
        assert_eq!(out, &[0.5f32]);

        shared.set_recording(false);
        process_block(&mut state, &shared, &[0.0f32]);
        let writer = return_rx.try_recv().expect("writer returned on stop");
        assert_eq!(writer.num_samples(), 2);
    }

    #[test]
    fn test_oversized_buffer_is_clamped() {
        let (attach_tx, attach_rx) = bounded::<WavWriter>(1);
        let (return_tx, _return_rx) = bounded(1);
        let mut state = CallbackState::new(2, attach_rx, return_tx);
        let shared = SharedState::new(AudioParams::default());
        drop(attach_tx);

        let out = process_block(&mut state, &shared, &[0.1f32, 0.2, 0.3, 0.4]);
        assert_eq!(out.len(), 2);
    }
}
