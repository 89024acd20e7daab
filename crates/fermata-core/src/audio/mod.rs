//! Audio I/O - device enumeration and cpal streams

pub mod backend;
pub mod cpal_backend;
pub mod device;

pub use backend::{CaptureBackend, CaptureStream, DeviceCatalog};
pub use cpal_backend::{start_playback_system, CpalCaptureBackend, PlaybackSystem};
pub use device::{input_devices, CpalDeviceCatalog, InputDeviceDescriptor};
