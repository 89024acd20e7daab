//! Backend seams for the control layer
//!
//! The player controller talks to hardware through these traits so the
//! enable/disable lifecycle, device fallback, and channel clamping can be
//! tested against fakes without opening real streams.

use crate::error::CoreResult;

use super::device::InputDeviceDescriptor;

/// Source of the current input device list.
///
/// Re-queried on demand; the hardware set can change between calls.
pub trait DeviceCatalog: Send {
    fn input_devices(&self) -> Vec<InputDeviceDescriptor>;
}

/// A running capture stream. Dropping it stops capture.
pub trait CaptureStream: Send {}

/// Opens capture streams that feed raw mono samples into an rtrb ring.
pub trait CaptureBackend: Send {
    /// Open a capture stream on one channel of a device.
    ///
    /// The producer half of the engine's capture ring is handed to the
    /// stream callback; the selected channel of every captured frame is
    /// pushed into it.
    fn open(
        &mut self,
        device: &InputDeviceDescriptor,
        channel: u16,
        tx: rtrb::Producer<f32>,
    ) -> CoreResult<Box<dyn CaptureStream>>;
}
