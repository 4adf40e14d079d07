//! hidapi-backed transport for real hardware.
//!
//! Only compiled with the `hardware-hid` feature. Reads are issued directly
//! on the async task rather than through `spawn_blocking`: every read is
//! bounded by the configured timeout (10ms by default), which is well under
//! anything that would starve the runtime, and `HidDevice` is `Send` but
//! not `Sync`, so the owning poll task is the only caller anyway.

use std::ffi::CString;
use std::sync::Mutex;
use std::time::Duration;

use hidapi::{HidApi, HidDevice};
use tracing::{debug, warn};

use magswipe_core::constants::REPORT_BUFFER_SIZE;
use magswipe_core::{Error, Result};

use crate::transport::{TransportDevice, UsbTransport};

/// USB HID transport over hidapi.
pub struct HidTransport {
    api: Mutex<HidApi>,
    buffer_size: usize,
}

/// An open hidapi device.
pub struct HidDeviceHandle {
    device: HidDevice,
    path: String,
}

impl HidTransport {
    /// Initialize the hidapi backend.
    pub fn new() -> Result<Self> {
        Self::with_buffer_size(REPORT_BUFFER_SIZE)
    }

    /// Initialize with a custom read buffer size.
    pub fn with_buffer_size(buffer_size: usize) -> Result<Self> {
        let api = HidApi::new()
            .map_err(|error| Error::platform_not_supported(format!("hidapi init: {error}")))?;
        Ok(Self {
            api: Mutex::new(api),
            buffer_size,
        })
    }

    fn api(&self) -> Result<std::sync::MutexGuard<'_, HidApi>> {
        self.api
            .lock()
            .map_err(|_| Error::communication("hidapi state poisoned"))
    }
}

/// Classify an open failure from the hidapi error text. hidapi reports
/// platform errors as strings, so this is the best signal available.
fn classify_open_error(path: &str, error: &hidapi::HidError) -> Error {
    let message = error.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("permission") || lowered.contains("access") {
        Error::permission_denied(format!("{path}: {message}"))
    } else if lowered.contains("busy") || lowered.contains("claimed") {
        Error::device_busy(format!("{path}: {message}"))
    } else {
        Error::communication(format!("open {path}: {message}"))
    }
}

impl UsbTransport for HidTransport {
    type Handle = HidDeviceHandle;

    async fn enumerate(&self) -> Result<Vec<TransportDevice>> {
        let mut api = self.api()?;
        if let Err(error) = api.refresh_devices() {
            warn!(%error, "hid device refresh failed");
        }
        Ok(api
            .device_list()
            .map(|info| TransportDevice {
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
                serial_number: info.serial_number().map(str::to_owned),
                path: info.path().to_string_lossy().into_owned(),
            })
            .collect())
    }

    async fn open(&self, path: &str) -> Result<HidDeviceHandle> {
        let c_path = CString::new(path)
            .map_err(|_| Error::communication(format!("invalid device path: {path}")))?;
        let device = self
            .api()?
            .open_path(&c_path)
            .map_err(|error| classify_open_error(path, &error))?;
        debug!(%path, "opened hid device");
        Ok(HidDeviceHandle {
            device,
            path: path.to_owned(),
        })
    }

    async fn read(&self, handle: &mut HidDeviceHandle, timeout: Duration) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; self.buffer_size];
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        match handle.device.read_timeout(&mut buffer, millis) {
            Ok(0) => Ok(Vec::new()),
            Ok(n) => {
                buffer.truncate(n);
                Ok(buffer)
            }
            // hid_read failing almost always means the device was unplugged;
            // the handle is not recoverable.
            Err(error) => Err(Error::disconnected(format!(
                "read {}: {error}",
                handle.path
            ))),
        }
    }

    async fn close(&self, handle: HidDeviceHandle) -> Result<()> {
        debug!(path = %handle.path, "closed hid device");
        drop(handle);
        Ok(())
    }
}
