//! Shared types for device identity and connection lifecycle.

use serde::{Deserialize, Serialize};

use crate::constants::{is_magtek_device, product_name};

/// Description of an attached swipe reader.
///
/// Descriptors are created fresh on every enumeration call and are never
/// persisted. The `id` is stable across enumerations for the same physical
/// device: it is derived from the vendor id, product id, and serial number,
/// falling back to the platform device path when no serial is reported.
///
/// # Examples
///
/// ```
/// use magswipe_core::DeviceDescriptor;
///
/// let desc = DeviceDescriptor::new(0x0801, 0x0002, Some("B123".into()), "/dev/hidraw0".into());
/// assert_eq!(desc.id, "801:2:B123");
/// assert_eq!(desc.name, "Magtek USB Swipe Reader");
/// assert!(!desc.connected);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Unique device id, `vid:pid:serial-or-path` with lowercase hex ids.
    pub id: String,

    /// Human-readable product name.
    pub name: String,

    /// USB vendor id.
    pub vendor_id: u16,

    /// USB product id.
    pub product_id: u16,

    /// Serial number, when the device reports one.
    pub serial_number: Option<String>,

    /// Platform device path used to open the device.
    pub path: String,

    /// Whether this descriptor refers to the currently active connection.
    pub connected: bool,
}

impl DeviceDescriptor {
    /// Create a descriptor for an enumerated device.
    pub fn new(
        vendor_id: u16,
        product_id: u16,
        serial_number: Option<String>,
        path: String,
    ) -> Self {
        let id = Self::derive_id(vendor_id, product_id, serial_number.as_deref(), &path);
        Self {
            id,
            name: product_name(vendor_id, product_id),
            vendor_id,
            product_id,
            serial_number,
            path,
            connected: false,
        }
    }

    /// Derive the unique id for a device, `vid:pid:serial-or-path`.
    pub fn derive_id(
        vendor_id: u16,
        product_id: u16,
        serial_number: Option<&str>,
        path: &str,
    ) -> String {
        match serial_number {
            Some(serial) if !serial.is_empty() => {
                format!("{:x}:{:x}:{}", vendor_id, product_id, serial)
            }
            _ => format!("{:x}:{:x}:{}", vendor_id, product_id, path),
        }
    }

    /// Whether this device is a supported Magtek swipe reader.
    pub fn is_supported(&self) -> bool {
        is_magtek_device(self.vendor_id, self.product_id)
    }

    /// Set the connected flag.
    pub fn with_connected(mut self, connected: bool) -> Self {
        self.connected = connected;
        self
    }
}

/// Lifecycle state of a connection manager.
///
/// Normal path: `Disconnected → Connecting → Connected → Monitoring`.
/// Any state returns to `Disconnected` via disconnect or a detach
/// notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No device handle is held.
    Disconnected,

    /// A connect call is resolving and opening the device.
    Connecting,

    /// The handle is open but the polling loop has not started yet.
    Connected,

    /// The polling loop is running against the open handle.
    Monitoring,
}

impl ConnectionState {
    /// True for `Connected` and `Monitoring`.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Monitoring)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Monitoring => "Monitoring",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_id_with_serial() {
        let desc = DeviceDescriptor::new(0x0801, 0x0010, Some("SN42".into()), "/dev/hidraw3".into());
        assert_eq!(desc.id, "801:10:SN42");
    }

    #[test]
    fn test_descriptor_id_falls_back_to_path() {
        let desc = DeviceDescriptor::new(0x0801, 0x0001, None, "/dev/hidraw1".into());
        assert_eq!(desc.id, "801:1:/dev/hidraw1");

        // Empty serial also falls back.
        let desc = DeviceDescriptor::new(0x0801, 0x0001, Some(String::new()), "/dev/hidraw1".into());
        assert_eq!(desc.id, "801:1:/dev/hidraw1");
    }

    #[test]
    fn test_descriptor_name_and_support() {
        let desc = DeviceDescriptor::new(0x0801, 0x0004, None, "p".into());
        assert_eq!(desc.name, "Magtek uDynamo");
        assert!(desc.is_supported());

        let foreign = DeviceDescriptor::new(0x1234, 0x0004, None, "p".into());
        assert!(!foreign.is_supported());
    }

    #[test]
    fn test_with_connected() {
        let desc = DeviceDescriptor::new(0x0801, 0x0002, None, "p".into());
        assert!(!desc.connected);
        assert!(desc.with_connected(true).connected);
    }

    #[test]
    fn test_connection_state_predicates() {
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(ConnectionState::Connected.is_connected());
        assert!(ConnectionState::Monitoring.is_connected());
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Monitoring.to_string(), "Monitoring");
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
    }

    #[test]
    fn test_descriptor_serialization_round_trip() {
        let desc = DeviceDescriptor::new(0x0801, 0x0003, Some("E1".into()), "/dev/hidraw0".into());
        let json = serde_json::to_string(&desc).unwrap();
        let back: DeviceDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(desc, back);
    }
}
