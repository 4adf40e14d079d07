//! Discovery of supported Magtek readers on the bus.

use std::sync::Arc;

use tracing::debug;

use magswipe_core::{DeviceDescriptor, Result, constants};

use crate::transport::{AnyTransport, UsbTransport};

/// Enumerates the transport and filters down to supported readers.
///
/// Enumeration is stateless: each call reflects the bus as it is right now,
/// so a freshly attached or detached device shows up on the next call
/// without any cache invalidation.
pub struct DeviceRegistry {
    transport: Arc<AnyTransport>,
}

impl DeviceRegistry {
    pub fn new(transport: Arc<AnyTransport>) -> Self {
        Self { transport }
    }

    /// All supported readers currently attached. A descriptor is flagged
    /// connected when its id matches `active_id`.
    pub async fn devices(&self, active_id: Option<&str>) -> Result<Vec<DeviceDescriptor>> {
        let attached = self.transport.enumerate().await?;
        let devices: Vec<DeviceDescriptor> = attached
            .into_iter()
            .filter(|device| constants::is_magtek_device(device.vendor_id, device.product_id))
            .map(|device| {
                let descriptor = DeviceDescriptor::new(
                    device.vendor_id,
                    device.product_id,
                    device.serial_number,
                    device.path,
                );
                let connected = active_id == Some(descriptor.id.as_str());
                descriptor.with_connected(connected)
            })
            .collect();
        debug!(count = devices.len(), "enumerated supported readers");
        Ok(devices)
    }

    /// Look up one attached reader by its stable device id.
    pub async fn find(&self, device_id: &str) -> Result<Option<DeviceDescriptor>> {
        let devices = self.devices(None).await?;
        Ok(devices.into_iter().find(|device| device.id == device_id))
    }
}
