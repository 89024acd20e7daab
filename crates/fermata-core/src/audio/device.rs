//! Input device enumeration
//!
//! Enumerates capture devices from all available cpal hosts. The list is
//! re-queried on demand rather than cached, since devices come and go.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::HostId;

use crate::error::{CoreError, CoreResult};

use super::backend::DeviceCatalog;

/// Human-readable name for a host ID.
fn host_name(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

/// Information about one capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDeviceDescriptor {
    /// Stable identifier used for persistence ("host:name").
    pub id: String,
    /// Human-readable device name.
    pub name: String,
    /// Host backend name (e.g. "ALSA").
    pub host: String,
    /// Maximum capture channels.
    pub channels: u16,
    /// Whether this is the host's default input.
    pub is_default: bool,
}

/// Enumerate capture devices from every available host.
pub fn input_devices() -> Vec<InputDeviceDescriptor> {
    let mut all = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("could not initialize host {:?}: {e}", host_id);
                continue;
            }
        };
        let host_label = host_name(host_id);
        let default_name = host.default_input_device().and_then(|d| d.name().ok());

        let devices = match host.input_devices() {
            Ok(d) => d,
            Err(e) => {
                log::debug!("could not enumerate inputs for {:?}: {e}", host_id);
                continue;
            }
        };

        for device in devices {
            let Ok(name) = device.name() else { continue };
            let configs: Vec<_> = match device.supported_input_configs() {
                Ok(c) => c.collect(),
                Err(_) => continue,
            };
            if configs.is_empty() {
                continue;
            }
            let channels = configs.iter().map(|c| c.channels()).max().unwrap_or(1);

            all.push(InputDeviceDescriptor {
                id: format!("{host_label}:{name}"),
                name: name.clone(),
                host: host_label.clone(),
                channels,
                is_default: default_name.as_ref() == Some(&name),
            });
        }
    }

    // Default devices first, then by host and name
    all.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.host.cmp(&b.host))
            .then_with(|| a.name.cmp(&b.name))
    });

    log::debug!("enumerated {} capture devices", all.len());
    all
}

/// Resolve a descriptor back to a cpal device.
///
/// Fails with [`CoreError::DeviceRemoved`] when the device is no longer
/// present.
pub fn find_input_device(descriptor: &InputDeviceDescriptor) -> CoreResult<cpal::Device> {
    for host_id in cpal::available_hosts() {
        if host_name(host_id) != descriptor.host {
            continue;
        }
        let Ok(host) = cpal::host_from_id(host_id) else {
            continue;
        };
        if let Ok(mut devices) = host.input_devices() {
            if let Some(device) =
                devices.find(|d| d.name().ok().as_deref() == Some(&descriptor.name))
            {
                return Ok(device);
            }
        }
    }
    Err(CoreError::DeviceRemoved(descriptor.id.clone()))
}

/// The real device catalog backed by cpal enumeration.
pub struct CpalDeviceCatalog;

impl DeviceCatalog for CpalDeviceCatalog {
    fn input_devices(&self) -> Vec<InputDeviceDescriptor> {
        input_devices()
    }
}
