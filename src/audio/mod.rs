//! Audio subsystem: hardware streams, real-time callback, pass-through bridge

pub mod bridge;
pub mod callback;
pub mod device;
pub mod engine;

pub use bridge::MonitorBuffer;
pub use callback::{CallbackState, SharedState};
pub use device::{list_devices, validate_input_device, validate_output_device, DeviceInfo};
pub use engine::AudioEngine;
