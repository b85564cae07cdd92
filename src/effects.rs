//! Fixed catalog of in-place DSP effects
//!
//! Every transform mutates an interleaved f32 buffer in place. Selection is
//! by catalog index; the control thread validates the index and publishes it
//! with a single atomic store, so the audio thread always observes a complete
//! descriptor. Effect-private state ([`EffectState`]) is owned by the audio
//! thread and reset whenever it observes a new active effect.

use crate::constants::{DEFAULT_CHANNELS, DEFAULT_GAIN, DEFAULT_VOLUME};

/// Shared audio parameters, written only by the control thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioParams {
    /// Channel count, fixed for the lifetime of an open stream
    pub channels: u16,
    /// Gain multiplier applied by the clipping effects
    pub gain: f32,
    /// Volume setting (stored, not applied in the DSP path)
    pub volume: f32,
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS,
            gain: DEFAULT_GAIN,
            volume: DEFAULT_VOLUME,
        }
    }
}

/// Per-activation DSP state, private to the audio thread
#[derive(Debug, Default, Clone)]
pub struct EffectState {
    /// One-pole feed-forward filter register, shared across channels
    filter_z1: f32,
}

impl EffectState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all state; called when an effect is activated
    pub fn reset(&mut self) {
        self.filter_z1 = 0.0;
    }
}

/// In-place buffer transform
pub type EffectFn = fn(&mut [f32], &AudioParams, &mut EffectState);

/// A named entry in the effect catalog
pub struct EffectDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub apply: EffectFn,
}

const SOFT_CLIP_BORDER: f32 = 2.0 / 3.0;

fn no_change(_samples: &mut [f32], _params: &AudioParams, _state: &mut EffectState) {}

fn soft_clip(samples: &mut [f32], params: &AudioParams, _state: &mut EffectState) {
    for sample in samples.iter_mut() {
        let s = *sample * params.gain;
        *sample = if s > 1.0 {
            SOFT_CLIP_BORDER
        } else if s < -1.0 {
            -SOFT_CLIP_BORDER
        } else {
            s - s * s * s / 3.0
        };
    }
}

fn hard_clip(samples: &mut [f32], params: &AudioParams, _state: &mut EffectState) {
    for sample in samples.iter_mut() {
        *sample = (*sample * params.gain).clamp(-1.0, 1.0);
    }
}

fn invert(samples: &mut [f32], _params: &AudioParams, _state: &mut EffectState) {
    for sample in samples.iter_mut() {
        *sample = -*sample;
    }
}

/// One-pole feed-forward filter: `y[i] = 0.5*x[i] + 0.5*z; z = x[i]`
///
/// A single register serves all channels.
fn feed_forward_filter(samples: &mut [f32], _params: &AudioParams, state: &mut EffectState) {
    const A0: f32 = 0.5;
    const B0: f32 = 0.5;
    for sample in samples.iter_mut() {
        let y = A0 * *sample + B0 * state.filter_z1;
        state.filter_z1 = *sample;
        *sample = y;
    }
}

/// Ordered, immutable effect catalog; selection is by index
pub static EFFECTS: [EffectDescriptor; 5] = [
    EffectDescriptor {
        name: "none",
        description: "No processing",
        apply: no_change,
    },
    EffectDescriptor {
        name: "soft",
        description: "Soft clipping",
        apply: soft_clip,
    },
    EffectDescriptor {
        name: "hard",
        description: "Hard clipping",
        apply: hard_clip,
    },
    EffectDescriptor {
        name: "inversion",
        description: "Inverted samples",
        apply: invert,
    },
    EffectDescriptor {
        name: "feed-forward",
        description: "One-pole feed-forward filter",
        apply: feed_forward_filter,
    },
];
